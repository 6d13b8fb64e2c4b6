//! Per-struct field registry.
//!
//! A registered struct keeps a [`BaseField`] as its first field. `init` fills the registry from the
//! static [`FieldInfo`] table generated by [`crate::impl_fields!`]; unmarshaling then records the
//! entries that carry a rendering suffix so the resolver can finish them later.
//!
//! The base never points back at its owner. Every operation receives the owner as `&mut dyn Fields`
//! and borrows the base and the slots apart with [`Fields::split_mut`].

use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use crate::error::Error;
use crate::node::Node;
use crate::options::Options;
use crate::renderable::Renderable;
use crate::suffix::{Renderers, parse_renderers};

/// Key of the entry whose rendered mapping is merged into the enclosing struct.
pub const VIRTUAL_KEY: &str = "__";

/// Namespace of the field tag that controls suffix handling.
pub const RS_TAG_NAMESPACE: &str = "rs";

type FastMap<K, V> = IndexMap<K, V, ahash::RandomState>;
type FastSet<K> = IndexSet<K, ahash::RandomState>;

/// Static description of one field: its Rust name and its tags as `(namespace, value)` pairs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldInfo {
    pub name: &'static str,
    pub tags: &'static [(&'static str, &'static str)],
}

impl FieldInfo {
    pub fn tag(&self, namespace: &str) -> Option<&'static str> {
        self.tags
            .iter()
            .find(|(ns, _)| *ns == namespace)
            .map(|(_, value)| *value)
    }
}

/// Access to a registered struct. Implemented by [`crate::impl_fields!`].
pub trait Fields {
    fn type_name(&self) -> &'static str;

    /// One entry per slot, in declaration order, base excluded.
    fn field_infos(&self) -> &'static [FieldInfo];

    fn base(&self) -> &BaseField;

    fn base_mut(&mut self) -> &mut BaseField;

    fn split(&self) -> (&BaseField, Vec<&dyn Renderable>);

    fn split_mut(&mut self) -> (&mut BaseField, Vec<&mut dyn Renderable>);
}

/// Handle on a destination slot, by index into the owner's field table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldRef {
    pub field_name: &'static str,
    pub index: usize,
    /// Set when the slot lives in the inline struct at this index; the child base owns it.
    pub inline_via: Option<usize>,
    pub is_inline_map: bool,
    pub disable_rs: bool,
    pub omitempty: bool,
}

/// A value waiting for the resolve pass.
#[derive(Clone, Debug, PartialEq)]
pub struct UnresolvedSpec {
    /// `None` for virtual-key entries.
    pub field_ref: Option<FieldRef>,
    /// Input key with the suffix removed.
    pub yaml_key: String,
    pub raw_data: Node,
    pub renderers: Renderers,
    pub is_inline_map_item: bool,
}

/// Bookkeeping record embedded in every registered struct.
#[derive(Clone, Default)]
pub struct BaseField {
    pub(crate) initialized: bool,
    pub(crate) options: Rc<Options>,
    pub(crate) normal_fields: FastMap<String, FieldRef>,
    pub(crate) inline_map: Option<FieldRef>,
    /// Indices of `inline` struct slots.
    pub(crate) inline_structs: Vec<usize>,
    /// Input key of each slot; `None` for inline, inline-map and skipped slots.
    pub(crate) own_keys: Vec<Option<String>>,
    pub(crate) unresolved_normal_fields: FastMap<String, UnresolvedSpec>,
    pub(crate) unresolved_inline_map_items: FastMap<String, Vec<UnresolvedSpec>>,
    pub(crate) unresolved_virtual_fields: Vec<UnresolvedSpec>,
    /// Keys written next to a virtual key; its rendered mapping never overrides them.
    pub(crate) static_keys: FastSet<String>,
}

impl BaseField {
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn options(&self) -> &Rc<Options> {
        &self.options
    }

    /// Exact-match lookup of an input key.
    pub fn get_field(&self, key: &str) -> Option<&FieldRef> {
        self.normal_fields.get(key)
    }

    /// Record an unresolved entry. `suffix` is parsed unless `renderers` are given.
    ///
    /// A normal field keeps only its latest entry; inline-map items accumulate per key so several
    /// suffix variants of one key all get rendered.
    pub fn add_unresolved_field(
        &mut self,
        field_ref: Option<FieldRef>,
        yaml_key: &str,
        suffix: &str,
        raw_data: Node,
        renderers: Option<Renderers>,
    ) -> Result<(), Error> {
        let renderers = match renderers {
            Some(r) => r,
            None => parse_renderers(suffix)?,
        };
        let is_inline_map_item = field_ref.as_ref().is_some_and(|r| r.is_inline_map);
        let spec = UnresolvedSpec {
            field_ref,
            yaml_key: yaml_key.to_string(),
            raw_data,
            renderers,
            is_inline_map_item,
        };
        if spec.field_ref.is_none() {
            self.unresolved_virtual_fields.push(spec);
        } else if is_inline_map_item {
            self.unresolved_inline_map_items
                .entry(yaml_key.to_string())
                .or_default()
                .push(spec);
        } else {
            self.unresolved_normal_fields.insert(yaml_key.to_string(), spec);
        }
        Ok(())
    }

    pub fn has_unresolved(&self) -> bool {
        !self.unresolved_normal_fields.is_empty()
            || !self.unresolved_inline_map_items.is_empty()
            || !self.unresolved_virtual_fields.is_empty()
    }

    pub(crate) fn clear_unresolved(&mut self) {
        self.unresolved_normal_fields.clear();
        self.unresolved_inline_map_items.clear();
        self.unresolved_virtual_fields.clear();
        self.static_keys.clear();
    }

    pub(crate) fn is_inline_struct(&self, index: usize) -> bool {
        self.inline_structs.contains(&index)
    }

    /// The inline-map slot when this base owns it directly.
    pub(crate) fn own_inline_map(&self) -> Option<&FieldRef> {
        self.inline_map.as_ref().filter(|r| r.inline_via.is_none())
    }
}

impl fmt::Debug for BaseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseField")
            .field("initialized", &self.initialized)
            .field("unresolved_normal_fields", &self.unresolved_normal_fields)
            .field("unresolved_inline_map_items", &self.unresolved_inline_map_items)
            .field("unresolved_virtual_fields", &self.unresolved_virtual_fields)
            .finish_non_exhaustive()
    }
}

/// Two bases are equal when they hold the same pending entries.
impl PartialEq for BaseField {
    fn eq(&self, other: &Self) -> bool {
        self.unresolved_normal_fields == other.unresolved_normal_fields
            && self.unresolved_inline_map_items == other.unresolved_inline_map_items
            && self.unresolved_virtual_fields == other.unresolved_virtual_fields
    }
}

/// Parsed data-namespace tag: `key,flag,flag`.
struct DataTag<'a> {
    key: &'a str,
    inline: bool,
    omitempty: bool,
}

impl<'a> DataTag<'a> {
    fn parse(tag: &'a str) -> Self {
        let mut parts = tag.split(',');
        let key = parts.next().unwrap_or_default().trim();
        let mut out = DataTag {
            key,
            inline: false,
            omitempty: false,
        };
        for flag in parts {
            match flag.trim() {
                "inline" => out.inline = true,
                "omitempty" => out.omitempty = true,
                _ => {}
            }
        }
        out
    }
}

#[derive(Default)]
struct RsTag {
    other: bool,
    disabled: bool,
}

impl RsTag {
    fn parse(field: &str, tag: Option<&str>) -> Result<Self, Error> {
        let mut out = RsTag::default();
        for token in tag.unwrap_or_default().split(',') {
            match token.trim() {
                "" => {}
                "other" => out.other = true,
                "disabled" => out.disabled = true,
                unknown => {
                    return Err(Error::InvalidTag {
                        field: field.to_string(),
                        msg: format!("unknown rs tag `{unknown}`"),
                    });
                }
            }
        }
        Ok(out)
    }
}

fn insert_key(
    normal_fields: &mut FastMap<String, FieldRef>,
    key: String,
    field_ref: FieldRef,
) -> Result<(), Error> {
    if normal_fields.contains_key(&key) {
        return Err(Error::InvalidTag {
            field: field_ref.field_name.to_string(),
            msg: format!("duplicate key `{key}`"),
        });
    }
    normal_fields.insert(key, field_ref);
    Ok(())
}

fn set_inline_map(slot: &mut Option<FieldRef>, field_ref: FieldRef) -> Result<(), Error> {
    if let Some(existing) = slot {
        return Err(Error::InvalidTag {
            field: field_ref.field_name.to_string(),
            msg: format!(
                "more than one inline map, `{}` already catches other keys",
                existing.field_name
            ),
        });
    }
    *slot = Some(field_ref);
    Ok(())
}

/// Build the registry of `this`. Calling it again on an initialized struct does nothing.
///
/// Nested registered structs (and those inside options, boxes and containers that already hold
/// values) are initialized too, with the same options.
pub fn init_struct(this: &mut dyn Fields, options: &Rc<Options>) -> Result<(), Error> {
    if this.base().initialized {
        return Ok(());
    }
    let infos = this.field_infos();
    let namespace = options.data_tag_namespace.as_str();
    let (base, mut slots) = this.split_mut();

    let mut registry = BaseField {
        options: options.clone(),
        ..BaseField::default()
    };

    for (index, (info, slot)) in infos.iter().zip(slots.iter_mut()).enumerate() {
        let data = DataTag::parse(info.tag(namespace).unwrap_or_default());
        let rs = RsTag::parse(info.name, info.tag(RS_TAG_NAMESPACE))?;
        slot.init_fields(options)?;

        if data.key == "-" {
            registry.own_keys.push(None);
            continue;
        }

        let field_ref = FieldRef {
            field_name: info.name,
            index,
            inline_via: None,
            is_inline_map: false,
            disable_rs: rs.disabled,
            omitempty: data.omitempty,
        };

        if data.inline && !rs.other {
            if let Some(child) = slot.as_fields() {
                let child_base = child.base();
                for (key, child_ref) in &child_base.normal_fields {
                    insert_key(
                        &mut registry.normal_fields,
                        key.clone(),
                        FieldRef {
                            inline_via: Some(index),
                            ..child_ref.clone()
                        },
                    )?;
                }
                if let Some(child_map) = &child_base.inline_map {
                    set_inline_map(
                        &mut registry.inline_map,
                        FieldRef {
                            inline_via: Some(index),
                            ..child_map.clone()
                        },
                    )?;
                }
                registry.inline_structs.push(index);
                registry.own_keys.push(None);
                continue;
            }
            if slot.as_inline_map().is_none() {
                return Err(Error::InvalidTag {
                    field: info.name.to_string(),
                    msg: "inline field is neither a registered struct nor a map".to_string(),
                });
            }
        }

        if rs.other || data.inline {
            if slot.as_inline_map().is_none() {
                return Err(Error::InvalidTag {
                    field: info.name.to_string(),
                    msg: "rs:\"other\" requires a string-keyed map or a vector".to_string(),
                });
            }
            set_inline_map(
                &mut registry.inline_map,
                FieldRef {
                    is_inline_map: true,
                    ..field_ref
                },
            )?;
            registry.own_keys.push(None);
            continue;
        }

        let key = if data.key.is_empty() {
            info.name.to_lowercase()
        } else {
            data.key.to_string()
        };
        insert_key(&mut registry.normal_fields, key.clone(), field_ref)?;
        registry.own_keys.push(Some(key));
    }

    registry.initialized = true;
    *base = registry;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_tags() {
        let t = DataTag::parse("name,omitempty");
        assert_eq!(t.key, "name");
        assert!(t.omitempty && !t.inline);
        let t = DataTag::parse(",inline");
        assert_eq!(t.key, "");
        assert!(t.inline);
    }

    #[test]
    fn rs_tags() {
        assert!(RsTag::parse("f", Some("other")).unwrap().other);
        assert!(RsTag::parse("f", Some("disabled")).unwrap().disabled);
        assert!(RsTag::parse("f", None).is_ok());
        let err = RsTag::parse("f", Some("others")).err().unwrap();
        assert!(matches!(err, Error::InvalidTag { .. }), "{err}");
    }

    #[test]
    fn normal_entries_replace_inline_entries_accumulate() {
        let mut base = BaseField::default();
        let normal = FieldRef {
            field_name: "a",
            index: 0,
            inline_via: None,
            is_inline_map: false,
            disable_rs: false,
            omitempty: false,
        };
        let inline = FieldRef {
            field_name: "data",
            index: 1,
            is_inline_map: true,
            ..normal.clone()
        };
        base.add_unresolved_field(Some(normal.clone()), "a", "x", Node::scalar("1"), None)
            .unwrap();
        base.add_unresolved_field(Some(normal), "a", "y", Node::scalar("2"), None)
            .unwrap();
        base.add_unresolved_field(Some(inline.clone()), "b", "x", Node::scalar("1"), None)
            .unwrap();
        base.add_unresolved_field(Some(inline), "b", "y", Node::scalar("2"), None)
            .unwrap();
        base.add_unresolved_field(None, VIRTUAL_KEY, "x", Node::scalar("3"), None)
            .unwrap();

        assert_eq!(base.unresolved_normal_fields.len(), 1);
        assert_eq!(base.unresolved_normal_fields["a"].renderers[0].name, "y");
        assert_eq!(base.unresolved_inline_map_items["b"].len(), 2);
        assert!(base.unresolved_inline_map_items["b"][0].is_inline_map_item);
        assert_eq!(base.unresolved_virtual_fields.len(), 1);
        assert!(base.has_unresolved());
    }

    #[test]
    fn bad_suffix_is_reported() {
        let mut base = BaseField::default();
        let err = base
            .add_unresolved_field(None, "k", "r?nope", Node::scalar("1"), None)
            .unwrap_err();
        assert!(matches!(err, Error::SuffixParse { .. }), "{err}");
    }
}
