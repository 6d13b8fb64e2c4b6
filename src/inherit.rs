//! Copy unresolved state from one instance into another of the same type.
//!
//! Typical use is layered configuration: a base document and an override document are loaded into
//! two instances, the override inherits the base's pending entries, then only the override is
//! resolved.

use crate::error::Error;
use crate::field::{Fields, UnresolvedSpec};

/// Pull the unresolved entries of `other` into `this`.
///
/// A normal entry present on both sides keeps `this`'s renderers and takes `other`'s raw data.
/// Inline-map and virtual entries are appended.
pub fn inherit_fields(this: &mut dyn Fields, other: &dyn Fields) -> Result<(), Error> {
    if !this.base().initialized {
        return Err(Error::NotInitialized {
            type_name: this.type_name(),
        });
    }
    if !other.base().initialized {
        return Err(Error::NotInitialized {
            type_name: other.type_name(),
        });
    }
    if this.type_name() != other.type_name() {
        return Err(Error::InheritMismatch {
            key: String::new(),
            msg: format!(
                "cannot inherit `{}` from `{}`",
                this.type_name(),
                other.type_name()
            ),
        });
    }

    let (base, mut slots) = this.split_mut();
    let (other_base, other_slots) = other.split();

    for (key, spec) in &other_base.unresolved_normal_fields {
        match base.unresolved_normal_fields.get_mut(key) {
            Some(mine) => {
                let same_slot = match (&mine.field_ref, &spec.field_ref) {
                    (Some(a), Some(b)) => a.index == b.index && a.is_inline_map == b.is_inline_map,
                    (None, None) => true,
                    _ => false,
                };
                if !same_slot || mine.is_inline_map_item != spec.is_inline_map_item {
                    return Err(Error::InheritMismatch {
                        key: key.clone(),
                        msg: "entries point at different fields".to_string(),
                    });
                }
                mine.raw_data = spec.raw_data.clone();
            }
            None => {
                let field_ref = base.get_field(key).cloned().ok_or_else(|| Error::InheritMismatch {
                    key: key.clone(),
                    msg: "no such field".to_string(),
                })?;
                base.unresolved_normal_fields.insert(
                    key.clone(),
                    UnresolvedSpec {
                        field_ref: Some(field_ref),
                        ..spec.clone()
                    },
                );
            }
        }
    }

    for (key, list) in &other_base.unresolved_inline_map_items {
        base.unresolved_inline_map_items
            .entry(key.clone())
            .or_default()
            .extend(list.iter().cloned());
    }
    base.unresolved_virtual_fields
        .extend(other_base.unresolved_virtual_fields.iter().cloned());
    base.static_keys.extend(other_base.static_keys.iter().cloned());

    for &i in &base.inline_structs {
        if let (Some(child), Some(other_child)) = (slots[i].as_fields_mut(), other_slots[i].as_fields()) {
            inherit_fields(child, other_child)?;
        }
    }
    Ok(())
}
