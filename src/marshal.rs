//! Struct marshaling.
//!
//! Keys are collected in one ordered map so a later writer replaces an earlier one: the inline map
//! goes first, then fields in declaration order. Entries still waiting for the resolver are written
//! back with their suffix, so an unresolved document survives a round trip.

use indexmap::IndexMap;

use crate::error::Error;
use crate::field::{Fields, UnresolvedSpec, VIRTUAL_KEY};
use crate::node::Node;
use crate::suffix::format_renderers;

/// `Renderable::marshal_yaml` of registered structs.
pub fn marshal_fields(this: &dyn Fields) -> Result<Node, Error> {
    let mut out = IndexMap::new();
    collect(this, &mut out)?;
    Ok(Node::mapping(
        out.into_iter().map(|(k, v)| (Node::scalar(k), v)),
    ))
}

/// `Renderable::is_zero` of registered structs.
pub fn is_zero_struct(this: &dyn Fields) -> bool {
    let (base, slots) = this.split();
    !base.has_unresolved() && slots.iter().all(|s| s.is_zero())
}

/// Key an unresolved entry is written under: `key@canonical-suffix`, or `key` for postponed plain values.
pub(crate) fn pending_key(key: &str, spec: &UnresolvedSpec) -> String {
    if spec.renderers.is_empty() {
        key.to_string()
    } else {
        format!("{key}@{}", format_renderers(&spec.renderers))
    }
}

fn collect(this: &dyn Fields, out: &mut IndexMap<String, Node>) -> Result<(), Error> {
    let (base, slots) = this.split();
    if !base.initialized {
        return Err(Error::NotInitialized {
            type_name: this.type_name(),
        });
    }

    if let Some(r) = base.own_inline_map() {
        if let Some(map) = slots[r.index].as_inline_map() {
            for (key, node) in map.marshal_items()? {
                out.insert(key, node);
            }
        }
        for (key, list) in &base.unresolved_inline_map_items {
            for spec in list {
                out.insert(pending_key(key, spec), spec.raw_data.clone());
            }
        }
    }

    for (index, slot) in slots.iter().enumerate() {
        if base.is_inline_struct(index) {
            if let Some(child) = slot.as_fields() {
                collect(child, out)?;
            }
            continue;
        }
        let Some(Some(key)) = base.own_keys.get(index) else {
            continue;
        };
        if let Some(spec) = base.unresolved_normal_fields.get(key) {
            out.insert(pending_key(key, spec), spec.raw_data.clone());
            continue;
        }
        let omitempty = base.get_field(key).is_some_and(|r| r.omitempty);
        if omitempty && slot.is_zero() {
            continue;
        }
        out.insert(key.clone(), slot.marshal_yaml()?);
    }

    for spec in &base.unresolved_virtual_fields {
        out.insert(pending_key(VIRTUAL_KEY, spec), spec.raw_data.clone());
    }
    Ok(())
}
