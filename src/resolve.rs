//! Depth-bounded resolver and the renderer pipeline.
//!
//! For one unresolved entry the pipeline starts from the raw node and runs each renderer spec in
//! order: read a [`PatchSpec`] when the spec ends in `!`, call the handler (skipped for the empty
//! name), apply the patch, coerce with the type hint. The final value is decoded into the slot.

use std::rc::Rc;

use crate::error::Error;
use crate::field::{Fields, UnresolvedSpec, VIRTUAL_KEY, init_struct};
use crate::handler::RenderingHandler;
use crate::node::{Node, prepare};
use crate::options::Options;
use crate::patch::PatchSpec;
use crate::renderable::{Context, Renderable};
use crate::suffix::{RendererSpec, parse_renderers};
use crate::unmarshal::{has_lazy_items, lazy_item, merge_virtual};
use crate::value::Value;

/// `Renderable::resolve` of registered structs; structs never initialized have nothing to do.
pub fn resolve_struct(this: &mut dyn Fields, rc: &dyn RenderingHandler, depth: i32) -> Result<(), Error> {
    if !this.base().initialized {
        return Ok(());
    }
    resolve_fields(this, rc, depth, &[])
}

/// Resolve the pending entries of `this`.
///
/// `depth` 0 does nothing, a positive depth resolves that many struct levels, a negative depth has
/// no bound. `names` limits the pass to the listed fields (Rust names or input keys); empty means
/// all of them.
pub fn resolve_fields(
    this: &mut dyn Fields,
    rc: &dyn RenderingHandler,
    depth: i32,
    names: &[&str],
) -> Result<(), Error> {
    if !this.base().initialized {
        return Err(Error::NotInitialized {
            type_name: this.type_name(),
        });
    }
    if depth == 0 {
        return Ok(());
    }
    let next = if depth > 0 { depth - 1 } else { depth };
    let options = this.base().options.clone();

    if names.is_empty() {
        while let Some(spec) = this.base().unresolved_virtual_fields.first().cloned() {
            let rendered =
                render_entry(&spec, rc, &options).map_err(|e| e.in_field(VIRTUAL_KEY))?;
            this.base_mut().unresolved_virtual_fields.remove(0);
            log::debug!("merging virtual key into `{}`", this.type_name());
            merge_virtual(this, &rendered).map_err(|e| e.in_field(VIRTUAL_KEY))?;
        }
    }

    let infos = this.field_infos();
    for (index, info) in infos.iter().enumerate() {
        let (base, mut slots) = this.split_mut();
        let slot = &mut slots[index];

        if base.is_inline_struct(index) {
            if let Some(child) = slot.as_fields_mut() {
                resolve_fields(child, rc, depth, names)?;
            }
            continue;
        }

        let key = base.own_keys.get(index).cloned().flatten();
        let selected = names.is_empty()
            || names
                .iter()
                .any(|n| *n == info.name || key.as_deref() == Some(*n));
        if !selected {
            continue;
        }

        if base.own_inline_map().is_some_and(|r| r.index == index) {
            // an item leaves the pending set only once all of its entries are stored
            let item_keys: Vec<String> = base.unresolved_inline_map_items.keys().cloned().collect();
            if let Some(map) = slot.as_inline_map_mut() {
                for item_key in item_keys {
                    let Some(list) = base.unresolved_inline_map_items.get(&item_key) else {
                        continue;
                    };
                    for (j, spec) in list.iter().enumerate() {
                        let node = render_entry(spec, rc, &options)
                            .map_err(|e| e.in_field(item_key.as_str()))?;
                        map.put_item(&item_key, &node, Context::new(&options, &item_key), j != 0)
                            .map_err(|cause| Error::Assignability {
                                key: item_key.clone(),
                                cause: Box::new(cause),
                            })?;
                    }
                    base.unresolved_inline_map_items.shift_remove(&item_key);
                }
            }
            slot.resolve(rc, next).map_err(|e| e.in_field(info.name))?;
            continue;
        }

        let Some(key) = key else {
            continue;
        };
        if let Some(spec) = base.unresolved_normal_fields.get(&key) {
            let node = render_entry(spec, rc, &options).map_err(|e| e.in_field(key.as_str()))?;
            slot.unmarshal_yaml(&node, Context::new(&options, &key), false)
                .map_err(|cause| Error::Assignability {
                    key: key.clone(),
                    cause: Box::new(cause),
                })?;
            base.unresolved_normal_fields.shift_remove(&key);
        }
        slot.resolve(rc, next).map_err(|e| e.in_field(key.as_str()))?;
    }
    Ok(())
}

/// Run the pipeline of one entry and expand lazy list items in the result.
pub(crate) fn render_entry(
    spec: &UnresolvedSpec,
    rc: &dyn RenderingHandler,
    options: &Rc<Options>,
) -> Result<Node, Error> {
    let node = run_pipeline(spec.raw_data.clone(), &spec.renderers, rc, options)?;
    expand_lazy_items(node, rc, options)
}

pub(crate) fn run_pipeline(
    raw: Node,
    renderers: &[RendererSpec],
    rc: &dyn RenderingHandler,
    options: &Rc<Options>,
) -> Result<Node, Error> {
    let mut value = Value::Node(raw);
    for spec in renderers {
        let mut patch = None;
        if spec.patch {
            let mut patch_spec = PatchSpec::default();
            init_struct(&mut patch_spec, options)?;
            let input = std::mem::take(&mut value).into_node();
            patch_spec.unmarshal_yaml(&input, Context::new(options, ""), false)?;
            resolve_fields(&mut patch_spec, rc, -1, &[])?;
            value = patch_spec.resolved_value(rc)?;
            patch = Some(patch_spec);
        }

        if !spec.name.is_empty() {
            if !options.is_renderer_allowed(&spec.name) {
                return Err(Error::RendererNotAllowed {
                    renderer: spec.name.clone(),
                });
            }
            log::trace!("rendering with `{}`", spec.name);
            value = rc
                .render_yaml(&spec.name, value)
                .map_err(|source| Error::Renderer {
                    renderer: spec.name.clone(),
                    source,
                })?;
        }

        if let Some(patch_spec) = patch {
            value = patch_spec.apply_to(value, rc)?;
        }
        value = spec.type_hint.apply(value)?;
    }
    Ok(value.into_node())
}

/// Replace every `{__@suffix: raw}` item of every sequence in the tree by what its own pipeline
/// renders. Rendered items are not expanded again.
fn expand_lazy_items(node: Node, rc: &dyn RenderingHandler, options: &Rc<Options>) -> Result<Node, Error> {
    if !has_lazy_items(&node) {
        return Ok(node);
    }
    let Some(n) = prepare(&node) else {
        return Ok(node);
    };
    let mut out = n.clone();
    let is_seq = out.is_sequence();
    for (i, item) in out.children.iter_mut().enumerate() {
        if is_seq {
            if let Some((suffix, raw)) = lazy_item(item) {
                let renderers = parse_renderers(&suffix)?;
                let rendered = run_pipeline(raw.clone(), &renderers, rc, options)?;
                *item = rendered;
                continue;
            }
        } else if i % 2 == 0 {
            // mapping key
            continue;
        }
        *item = expand_lazy_items(std::mem::take(item), rc, options)?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse;
    use crate::error::BoxError;
    use crate::suffix::Renderers;

    fn echo(_: &str, v: Value) -> Result<Value, BoxError> {
        Ok(v)
    }

    fn upper(name: &str, v: Value) -> Result<Value, BoxError> {
        match name {
            "upper" => Ok(Value::Str(v.decoded()?.to_string().to_uppercase())),
            "fail" => Err("boom".into()),
            _ => Ok(v),
        }
    }

    fn spec(raw: &str, suffix: &str) -> UnresolvedSpec {
        UnresolvedSpec {
            field_ref: None,
            yaml_key: "k".to_string(),
            raw_data: parse(raw).unwrap(),
            renderers: parse_renderers(suffix).unwrap(),
            is_inline_map_item: false,
        }
    }

    #[test]
    fn chain_runs_left_to_right() {
        let options = Rc::new(Options::default());
        let node = render_entry(&spec("'42'", "echo|echo?int"), &echo, &options).unwrap();
        assert_eq!(Value::from_node(&node).unwrap(), Value::Int(42));

        let node = render_entry(&spec("abc", "upper?str"), &upper, &options).unwrap();
        assert_eq!(Value::from_node(&node).unwrap(), Value::Str("ABC".into()));
    }

    #[test]
    fn handler_errors_name_the_renderer() {
        let options = Rc::new(Options::default());
        let err = render_entry(&spec("x", "fail"), &upper, &options).unwrap_err();
        assert!(matches!(err, Error::Renderer { ref renderer, .. } if renderer == "fail"), "{err}");
    }

    #[test]
    fn whitelist_is_enforced() {
        let options = Rc::new(crate::options! {
            allowed_renderers: Some(["echo".to_string()].into_iter().collect()),
        });
        assert!(render_entry(&spec("x", "echo"), &echo, &options).is_ok());
        let err = render_entry(&spec("x", "upper"), &upper, &options).unwrap_err();
        assert!(matches!(err, Error::RendererNotAllowed { .. }), "{err}");
        // the identity renderer is never checked
        assert!(render_entry(&spec("1", "?int"), &echo, &options).is_ok());
    }

    #[test]
    fn empty_chain_passes_raw_data() {
        let options = Rc::new(Options::default());
        let s = UnresolvedSpec {
            renderers: Renderers::new(),
            ..spec("[1, {__@upper: b}]", "")
        };
        let node = render_entry(&s, &upper, &options).unwrap();
        assert_eq!(
            Value::from_node(&node).unwrap(),
            Value::Seq(vec![Value::Int(1), Value::Str("B".into())])
        );
    }
}
