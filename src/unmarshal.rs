//! Mapping classification and routing for registered structs.
//!
//! Each flattened pair is classified once:
//! - value tagged `!rs:<suffix>`: suffixed (the key must not carry `@` as well)
//! - key equal to a field key: plain
//! - key containing `@`: split at the last `@` into name and suffix
//! - anything else: plain
//!
//! Plain pairs are decoded right away. Suffixed pairs, and plain pairs that must wait (a virtual
//! key is present, or the value is a list with lazily rendered items), are recorded in the owning
//! base. Keys of inline structs are routed to the inline struct's own base.

use std::collections::HashSet;

use crate::error::{Error, Location};
use crate::field::{Fields, VIRTUAL_KEY, init_struct};
use crate::node::{Node, is_empty, key_text, merge_pairs, prepare};
use crate::renderable::Context;
use crate::suffix::Renderers;
use crate::tags::rs_tag_suffix;

/// One classified input pair.
pub(crate) struct Entry {
    /// Logical key, suffix removed.
    pub(crate) name: String,
    pub(crate) raw_key: String,
    pub(crate) suffix: Option<String>,
    pub(crate) value: Node,
    pub(crate) location: Location,
}

impl Entry {
    fn is_virtual(&self) -> bool {
        self.name == VIRTUAL_KEY
    }
}

/// `Renderable::unmarshal_yaml` of registered structs.
pub fn unmarshal_struct(
    this: &mut dyn Fields,
    node: &Node,
    ctx: Context<'_>,
    keep_old: bool,
) -> Result<(), Error> {
    if !this.base().initialized {
        init_struct(this, ctx.options())?;
    }
    unmarshal_fields(this, node, keep_old)
}

/// Decode a mapping into an initialized struct.
pub(crate) fn unmarshal_fields(this: &mut dyn Fields, node: &Node, keep_old: bool) -> Result<(), Error> {
    if !this.base().initialized {
        return Err(Error::NotInitialized {
            type_name: this.type_name(),
        });
    }
    if !keep_old {
        clear_state(this);
    }
    let Some(n) = prepare(node) else {
        return Ok(());
    };
    if is_empty(n) {
        return Ok(());
    }
    if !n.is_mapping() {
        return Err(Error::shape("mapping", n.describe()).with_location(n.location));
    }

    let entries = classify(this, n)?;
    let has_virtual = entries.iter().any(Entry::is_virtual);
    for entry in entries {
        if entry.is_virtual() {
            add_virtual(this, entry)?;
        } else {
            if has_virtual {
                this.base_mut().static_keys.insert(entry.name.clone());
            }
            route(this, entry, has_virtual)?;
        }
    }
    Ok(())
}

/// Merge the mapping a virtual key rendered to. Keys written next to the virtual key are kept,
/// resolved or not, and so are keys with pending entries of their own.
pub(crate) fn merge_virtual(this: &mut dyn Fields, node: &Node) -> Result<(), Error> {
    let Some(n) = prepare(node) else {
        return Ok(());
    };
    if is_empty(n) {
        return Ok(());
    }
    if !n.is_mapping() {
        return Err(Error::shape("mapping rendered from virtual key", n.describe()));
    }
    for entry in classify(this, n)? {
        if entry.is_virtual() {
            add_virtual(this, entry)?;
        } else if this.base().static_keys.contains(&entry.name) || has_pending(this, &entry.name) {
            log::debug!("virtual key: keeping pending `{}`", entry.name);
        } else {
            route(this, entry, false)?;
        }
    }
    Ok(())
}

fn clear_state(this: &mut dyn Fields) {
    let (base, mut slots) = this.split_mut();
    base.clear_unresolved();
    if let Some(r) = base.own_inline_map() {
        if let Some(map) = slots[r.index].as_inline_map_mut() {
            map.clear_items();
        }
    }
    for &i in &base.inline_structs {
        if let Some(child) = slots[i].as_fields_mut() {
            clear_state(child);
        }
    }
}

fn classify(this: &dyn Fields, mapping: &Node) -> Result<Vec<Entry>, Error> {
    let base = this.base();
    let pairs = merge_pairs(mapping)?;
    let mut entries = Vec::with_capacity(pairs.len());
    let mut seen = HashSet::new();

    for (k, v) in pairs {
        let raw_key = key_text(k)
            .ok_or_else(|| Error::shape("string key", k.describe()).with_location(k.location))?;
        let value = prepare(v).unwrap_or(v);

        let (name, suffix, value) = if let Some(tag_suffix) = rs_tag_suffix(&value.tag) {
            if raw_key.contains('@') {
                return Err(Error::InvalidTag {
                    field: raw_key,
                    msg: "rendering suffix given both on the key and as `!rs:` tag".to_string(),
                });
            }
            (raw_key.clone(), Some(tag_suffix.to_string()), value.without_tag())
        } else if base.get_field(&raw_key).is_some() {
            (raw_key.clone(), None, value.clone())
        } else if let Some((name, suffix)) = raw_key.rsplit_once('@') {
            (name.to_string(), Some(suffix.to_string()), value.clone())
        } else {
            (raw_key.clone(), None, value.clone())
        };

        log::trace!("classified key `{raw_key}` as `{name}` suffix {suffix:?}");

        if name != VIRTUAL_KEY {
            // field keys clash by logical name, inline items by the key as written
            let dedup_key = if base.get_field(&name).is_some() {
                name.clone()
            } else {
                raw_key.clone()
            };
            if !seen.insert(dedup_key) {
                return Err(Error::DuplicateField {
                    key: name,
                    location: k.location,
                });
            }
        }

        entries.push(Entry {
            name,
            raw_key,
            suffix,
            value,
            location: k.location,
        });
    }
    Ok(entries)
}

fn add_virtual(this: &mut dyn Fields, entry: Entry) -> Result<(), Error> {
    let suffix = entry.suffix.unwrap_or_default();
    this.base_mut()
        .add_unresolved_field(None, VIRTUAL_KEY, &suffix, entry.value, None)
}

/// True when `name` already waits for the resolver somewhere in this struct.
fn has_pending(this: &dyn Fields, name: &str) -> bool {
    let (base, slots) = this.split();
    let target = match base.get_field(name) {
        Some(r) => Some(r),
        None => base.inline_map.as_ref(),
    };
    match target {
        Some(r) => match r.inline_via {
            Some(i) => slots[i].as_fields().is_some_and(|child| has_pending(child, name)),
            None if r.is_inline_map => base.unresolved_inline_map_items.contains_key(name),
            None => base.unresolved_normal_fields.contains_key(name),
        },
        None => false,
    }
}

/// A one-entry mapping `{__@suffix: raw}` used as a list item; returns the suffix and raw value.
pub(crate) fn lazy_item(item: &Node) -> Option<(String, &Node)> {
    let item = prepare(item)?;
    if !item.is_mapping() || item.children.len() != 2 {
        return None;
    }
    let key = key_text(&item.children[0])?;
    let value = prepare(&item.children[1]).unwrap_or(&item.children[1]);
    if key == VIRTUAL_KEY {
        return rs_tag_suffix(&value.tag).map(|s| (s.to_string(), value));
    }
    match key.rsplit_once('@') {
        Some((VIRTUAL_KEY, suffix)) => Some((suffix.to_string(), value)),
        _ => None,
    }
}

/// True when a lazy item sits in any sequence of the tree, mapping values included.
pub(crate) fn has_lazy_items(node: &Node) -> bool {
    let Some(node) = prepare(node) else {
        return false;
    };
    if node.is_sequence() {
        node.children
            .iter()
            .any(|c| lazy_item(c).is_some() || has_lazy_items(c))
    } else if node.is_mapping() {
        node.pairs().any(|(_, v)| has_lazy_items(v))
    } else {
        false
    }
}

/// Send one entry to its slot, its inline struct, or the inline map.
pub(crate) fn route(this: &mut dyn Fields, entry: Entry, has_virtual: bool) -> Result<(), Error> {
    let options = this.base().options.clone();
    let (base, mut slots) = this.split_mut();

    let (field_ref, inline_item) = match base.get_field(&entry.name) {
        Some(r) => (r.clone(), false),
        None => match &base.inline_map {
            Some(r) => (r.clone(), true),
            None => {
                if options.allow_unknown_fields {
                    log::debug!("skipping unknown field `{}`", entry.raw_key);
                    return Ok(());
                }
                return Err(Error::UnknownField {
                    key: entry.raw_key,
                    location: entry.location,
                });
            }
        },
    };

    if let Some(i) = field_ref.inline_via {
        let child = slots[i].as_fields_mut().ok_or_else(|| Error::InvalidTag {
            field: field_ref.field_name.to_string(),
            msg: "inline slot is not a registered struct".to_string(),
        })?;
        return route(child, entry, has_virtual);
    }

    if let Some(suffix) = &entry.suffix {
        if field_ref.disable_rs {
            return Err(Error::InvalidTag {
                field: field_ref.field_name.to_string(),
                msg: format!("rendering suffix on `{}` which has suffixes disabled", entry.raw_key),
            });
        }
        return base.add_unresolved_field(Some(field_ref), &entry.name, suffix, entry.value, None);
    }

    // registered structs record lazy items of their own fields themselves
    let nested_struct = !inline_item && slots[field_ref.index].as_fields().is_some();
    if has_virtual || (!nested_struct && has_lazy_items(&entry.value)) {
        return base.add_unresolved_field(
            Some(field_ref),
            &entry.name,
            "",
            entry.value,
            Some(Renderers::new()),
        );
    }

    let ctx = Context::new(&options, &entry.name);
    if inline_item {
        let map = slots[field_ref.index]
            .as_inline_map_mut()
            .ok_or_else(|| Error::InvalidTag {
                field: field_ref.field_name.to_string(),
                msg: "inline map slot is not a map".to_string(),
            })?;
        map.put_item(&entry.name, &entry.value, ctx, false)
            .map_err(|e| e.in_field(entry.name.as_str()))
    } else {
        base.unresolved_normal_fields.shift_remove(&entry.name);
        slots[field_ref.index]
            .unmarshal_yaml(&entry.value, ctx, false)
            .map_err(|e| e.in_field(entry.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse;

    #[test]
    fn lazy_items_by_key_or_tag() {
        let doc = parse("- {__@echo: a}\n- __: !rs:tpl b\n- {__: c}\n- plain\n").unwrap();
        let seq = prepare(&doc).unwrap();
        let found: Vec<_> = seq
            .children
            .iter()
            .map(|c| lazy_item(c).map(|(s, v)| (s, v.value.clone())))
            .collect();
        assert_eq!(
            found,
            vec![
                Some(("echo".to_string(), "a".to_string())),
                Some(("tpl".to_string(), "b".to_string())),
                None,
                None,
            ]
        );
        assert!(has_lazy_items(seq));
    }

    #[test]
    fn lazy_items_found_in_nested_containers() {
        let doc = parse("groups:\n  x: [a, {__@echo: b}]\n").unwrap();
        assert!(has_lazy_items(&doc));
        let doc = parse("- [a, [b, {__@echo: c}]]\n").unwrap();
        assert!(has_lazy_items(&doc));
        let doc = parse("groups:\n  x: {__@echo: b}\n").unwrap();
        assert!(!has_lazy_items(&doc));
    }
}
