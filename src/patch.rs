//! Patch specs: the input of a renderer spec that ends in `!`.
//!
//! ```yaml
//! value: [a, b]          # data handed to the renderer
//! merge:
//! - value: [c]           # merged into the rendered value
//! patch:
//! - { op: add, path: /0, value: z }
//! select: '.[1:]'
//! unique: true
//! ```
//!
//! Merging and patching work on JSON values; the result goes back to the pipeline as a plain
//! [`Value`].

use std::rc::Rc;

use serde_json::json;

use crate::any_object::AnyObject;
use crate::error::Error;
use crate::field::BaseField;
use crate::handler::RenderingHandler;
use crate::jq;
use crate::node::Node;
use crate::options::Options;
use crate::renderable::{Context, Renderable};
use crate::value::Value;

/// Input of a patch directive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchSpec {
    base: BaseField,
    /// Data the renderer receives.
    pub value: Option<Node>,
    /// Resolve suffixes nested in `value`. Default: true.
    pub resolve: Option<bool>,
    pub merge: Vec<MergeSource>,
    pub patch: Vec<JsonPatchSpec>,
    /// Query applied to the final value.
    pub select: String,
    /// Deduplicate the merged list.
    pub unique: bool,
    /// Deduplicate lists merged inside maps.
    pub map_list_item_unique: bool,
    /// Append lists merged inside maps instead of replacing them.
    pub map_list_append: bool,
}

crate::impl_fields!(PatchSpec {
    base,
    value,
    resolve,
    merge,
    patch,
    select,
    unique,
    map_list_item_unique,
    map_list_append,
});

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MergeSource {
    base: BaseField,
    pub value: Option<Node>,
    pub resolve: Option<bool>,
    pub select: String,
}

crate::impl_fields!(MergeSource { base, value, resolve, select });

/// One RFC 6902 operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JsonPatchSpec {
    base: BaseField,
    pub op: String,
    pub path: String,
    /// Source path of `move` and `copy`.
    pub from: String,
    pub value: Option<Node>,
    pub resolve: Option<bool>,
    pub select: String,
}

crate::impl_fields!(JsonPatchSpec { base, op, path, from, value, resolve, select });

/// Value of an optional node, with nested suffixes resolved unless `resolve` is false.
fn resolve_node(
    node: Option<&Node>,
    resolve: Option<bool>,
    rc: &dyn RenderingHandler,
    options: &Rc<Options>,
) -> Result<Value, Error> {
    let Some(node) = node else {
        return Ok(Value::Null);
    };
    if resolve == Some(false) {
        return Ok(Value::Node(node.clone()));
    }
    let mut obj = AnyObject::default();
    obj.unmarshal_yaml(node, Context::new(options, "value"), false)?;
    obj.resolve(rc, -1)?;
    Ok(Value::Node(obj.marshal_yaml()?))
}

fn select_json(query: &str, doc: serde_json::Value) -> Result<serde_json::Value, Error> {
    if query.is_empty() {
        Ok(doc)
    } else {
        jq::select(query, doc)
    }
}

impl PatchSpec {
    /// Render the spec: its value, then merges, patches and the final selection.
    pub fn apply(&self, rc: &dyn RenderingHandler) -> Result<Value, Error> {
        let value = self.resolved_value(rc)?;
        self.apply_to(value, rc)
    }

    pub(crate) fn resolved_value(&self, rc: &dyn RenderingHandler) -> Result<Value, Error> {
        resolve_node(self.value.as_ref(), self.resolve, rc, &self.base.options)
    }

    /// Apply merges, patches and the selection to an already rendered value.
    pub(crate) fn apply_to(&self, value: Value, rc: &dyn RenderingHandler) -> Result<Value, Error> {
        if self.merge.is_empty() && self.patch.is_empty() && self.select.is_empty() && !self.unique {
            return Ok(value);
        }
        let options = &self.base.options;
        let mut doc = value.to_json()?;

        let mut sources = Vec::with_capacity(self.merge.len());
        for m in &self.merge {
            let v = resolve_node(m.value.as_ref(), m.resolve, rc, options)?.to_json()?;
            sources.push(select_json(&m.select, v)?);
        }
        doc = self.merge_all(doc, sources)?;

        for p in &self.patch {
            let v = resolve_node(p.value.as_ref(), p.resolve, rc, options)?.to_json()?;
            let v = select_json(&p.select, v)?;
            apply_patch_op(&mut doc, &p.op, &p.path, &p.from, v)?;
        }

        Ok(Value::from_json(select_json(&self.select, doc)?))
    }

    fn merge_all(
        &self,
        doc: serde_json::Value,
        sources: Vec<serde_json::Value>,
    ) -> Result<serde_json::Value, Error> {
        use serde_json::Value as J;
        match doc {
            J::Null => {
                let mut it = sources.into_iter();
                match it.next() {
                    Some(first) => self.merge_all(first, it.collect()),
                    None => Ok(J::Null),
                }
            }
            J::Array(mut list) => {
                for source in sources {
                    match source {
                        J::Array(items) => list.extend(items),
                        other => {
                            return Err(Error::patch(format!(
                                "cannot merge {} into a list",
                                json_kind(&other)
                            )));
                        }
                    }
                }
                if self.unique {
                    list = unique_list(list);
                }
                Ok(J::Array(list))
            }
            J::Object(mut map) => {
                for source in sources {
                    match source {
                        J::Object(additional) => merge_map(
                            &mut map,
                            additional,
                            self.map_list_append,
                            self.map_list_item_unique,
                        ),
                        other => {
                            return Err(Error::patch(format!(
                                "cannot merge {} into a map",
                                json_kind(&other)
                            )));
                        }
                    }
                }
                Ok(J::Object(map))
            }
            scalar => {
                if sources.is_empty() {
                    Ok(scalar)
                } else {
                    Err(Error::patch(format!(
                        "cannot merge into {}",
                        json_kind(&scalar)
                    )))
                }
            }
        }
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "list",
        serde_json::Value::Object(_) => "map",
    }
}

/// Merge `additional` into `original`: maps recursively, lists replaced or appended, anything else
/// overwritten.
pub fn merge_map(
    original: &mut serde_json::Map<String, serde_json::Value>,
    additional: serde_json::Map<String, serde_json::Value>,
    append_lists: bool,
    unique_in_list_items: bool,
) {
    use serde_json::Value as J;
    for (key, value) in additional {
        match (original.get_mut(&key), value) {
            (Some(J::Object(existing)), J::Object(more)) => {
                merge_map(existing, more, append_lists, unique_in_list_items);
            }
            (Some(J::Array(existing)), J::Array(more)) => {
                if append_lists {
                    existing.extend(more);
                } else {
                    *existing = more;
                }
                if unique_in_list_items {
                    *existing = unique_list(std::mem::take(existing));
                }
            }
            (_, value) => {
                original.insert(key, value);
            }
        }
    }
}

/// Remove later duplicates, keeping the first occurrence of each item.
pub fn unique_list<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// Apply one operation. Negative array indices count from the end; removing a missing path does
/// nothing.
fn apply_patch_op(
    doc: &mut serde_json::Value,
    op: &str,
    path: &str,
    from: &str,
    value: serde_json::Value,
) -> Result<(), Error> {
    let path = normalize_pointer(doc, path, op == "add")?;
    if op == "remove" && doc.pointer(&path).is_none() {
        log::debug!("patch: nothing to remove at `{path}`");
        return Ok(());
    }
    let mut operation = json!({ "op": op, "path": path });
    match op {
        "add" | "replace" | "test" => {
            operation["value"] = value;
        }
        "move" | "copy" => {
            operation["from"] = serde_json::Value::String(normalize_pointer(doc, from, false)?);
        }
        _ => {}
    }
    let operation: json_patch::PatchOperation = serde_json::from_value(operation)
        .map_err(|e| Error::patch(format!("invalid operation `{op}` at `{path}`: {e}")))?;
    json_patch::patch(doc, &[operation]).map_err(|e| Error::patch(e.to_string()))
}

/// Rewrite negative indices of a JSON pointer against the arrays they address.
///
/// For `add`, the last segment `-1` means "after the last element".
fn normalize_pointer(doc: &serde_json::Value, path: &str, inserting: bool) -> Result<String, Error> {
    if path.is_empty() {
        return Ok(String::new());
    }
    let Some(rest) = path.strip_prefix('/') else {
        return Err(Error::patch(format!("JSON pointer `{path}` must start with `/`")));
    };
    let segments: Vec<&str> = rest.split('/').collect();
    let mut out = String::with_capacity(path.len());
    let mut cursor = Some(doc);
    for (i, segment) in segments.iter().enumerate() {
        let mut segment = segment.to_string();
        if let (Some(serde_json::Value::Array(items)), Ok(idx)) = (cursor, segment.parse::<i64>()) {
            if idx < 0 {
                let last = i + 1 == segments.len();
                let len = items.len() as i64 + i64::from(inserting && last);
                let resolved = len + idx;
                if resolved < 0 {
                    return Err(Error::patch(format!("index {idx} out of range in `{path}`")));
                }
                segment = resolved.to_string();
            }
        }
        cursor = cursor.and_then(|c| match c {
            serde_json::Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            serde_json::Value::Object(map) => map.get(&segment.replace("~1", "/").replace("~0", "~")),
            _ => None,
        });
        out.push('/');
        out.push_str(&segment);
    }
    Ok(out)
}
