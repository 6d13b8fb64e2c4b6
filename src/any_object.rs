//! Dynamically typed values that still take part in suffix resolution.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::Error;
use crate::field::{BaseField, init_struct};
use crate::handler::RenderingHandler;
use crate::node::{Node, NodeKind, prepare};
use crate::options::Options;
use crate::renderable::{Context, Renderable};
use crate::resolve::render_entry;
use crate::value::Value;

/// A scalar, a list, or a mapping whose keys may carry suffixes.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyObject {
    Scalar(Value),
    Seq(Vec<AnyObject>),
    Map(Box<AnyObjectMap>),
}

impl Default for AnyObject {
    fn default() -> Self {
        AnyObject::Scalar(Value::Null)
    }
}

/// Mapping variant of [`AnyObject`]; every key lands in `data`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnyObjectMap {
    base: BaseField,
    pub data: IndexMap<String, AnyObject>,
}

crate::impl_fields!(AnyObjectMap {
    base,
    #[rs = "other"] data,
});

impl AnyObjectMap {
    /// A mapping that holds nothing but one virtual entry stands for a lazily rendered list item.
    fn take_lazy(&mut self, rc: &dyn RenderingHandler) -> Result<Option<Node>, Error> {
        let base = &mut self.base;
        if !self.data.is_empty()
            || !base.unresolved_normal_fields.is_empty()
            || !base.unresolved_inline_map_items.is_empty()
            || base.unresolved_virtual_fields.len() != 1
        {
            return Ok(None);
        }
        let rendered = render_entry(&base.unresolved_virtual_fields[0], rc, &base.options)?;
        base.unresolved_virtual_fields.clear();
        Ok(Some(rendered))
    }
}

impl AnyObject {
    /// Plain data view; pending entries are not included.
    pub fn to_value(&self) -> Result<Value, Error> {
        Ok(match self {
            AnyObject::Scalar(v) => v.clone().decoded()?,
            AnyObject::Seq(items) => {
                Value::Seq(items.iter().map(AnyObject::to_value).collect::<Result<_, _>>()?)
            }
            AnyObject::Map(m) => {
                let mut out = IndexMap::with_capacity(m.data.len());
                for (k, v) in &m.data {
                    out.insert(k.clone(), v.to_value()?);
                }
                Value::Map(out)
            }
        })
    }

    /// Entry of a mapping.
    pub fn get(&self, key: &str) -> Option<&AnyObject> {
        match self {
            AnyObject::Map(m) => m.data.get(key),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&AnyObjectMap> {
        match self {
            AnyObject::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_seq(&self) -> Option<&[AnyObject]> {
        match self {
            AnyObject::Seq(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            AnyObject::Scalar(v) => Some(v),
            _ => None,
        }
    }
}

impl Renderable for AnyObject {
    fn unmarshal_yaml(&mut self, node: &Node, ctx: Context<'_>, keep_old: bool) -> Result<(), Error> {
        let Some(n) = prepare(node) else {
            *self = AnyObject::default();
            return Ok(());
        };
        match n.kind {
            NodeKind::Mapping => {
                if let (true, AnyObject::Map(m)) = (keep_old, &mut *self) {
                    return m.unmarshal_yaml(n, ctx, true);
                }
                let mut m = AnyObjectMap::default();
                init_struct(&mut m, ctx.options())?;
                m.unmarshal_yaml(n, ctx, false)?;
                *self = AnyObject::Map(Box::new(m));
            }
            NodeKind::Sequence => {
                let mut items = match std::mem::take(self) {
                    AnyObject::Seq(items) if keep_old => items,
                    _ => Vec::with_capacity(n.children.len()),
                };
                for child in &n.children {
                    let mut item = AnyObject::default();
                    item.unmarshal_yaml(child, ctx, false)?;
                    items.push(item);
                }
                *self = AnyObject::Seq(items);
            }
            _ => *self = AnyObject::Scalar(Value::from_node(n)?),
        }
        Ok(())
    }

    fn marshal_yaml(&self) -> Result<Node, Error> {
        match self {
            AnyObject::Scalar(v) => Ok(v.clone().into_node()),
            AnyObject::Seq(items) => Ok(Node::sequence(
                items.iter().map(|i| i.marshal_yaml()).collect::<Result<_, _>>()?,
            )),
            AnyObject::Map(m) => m.marshal_yaml(),
        }
    }

    fn resolve(&mut self, rc: &dyn RenderingHandler, depth: i32) -> Result<(), Error> {
        match self {
            AnyObject::Scalar(_) => Ok(()),
            AnyObject::Map(m) => m.resolve(rc, depth),
            AnyObject::Seq(items) => {
                for item in items.iter_mut() {
                    if let AnyObject::Map(m) = item {
                        if let Some(rendered) = m.take_lazy(rc)? {
                            let options = m.base.options.clone();
                            let mut replacement = AnyObject::default();
                            replacement.unmarshal_yaml(&rendered, Context::new(&options, ""), false)?;
                            *item = replacement;
                        }
                    }
                    item.resolve(rc, depth)?;
                }
                Ok(())
            }
        }
    }

    fn is_zero(&self) -> bool {
        match self {
            AnyObject::Scalar(v) => v.is_null(),
            AnyObject::Seq(items) => items.is_empty(),
            AnyObject::Map(m) => m.is_zero(),
        }
    }

    fn init_fields(&mut self, options: &Rc<Options>) -> Result<(), Error> {
        match self {
            AnyObject::Map(m) => m.init_fields(options),
            AnyObject::Seq(items) => {
                for item in items.iter_mut() {
                    item.init_fields(options)?;
                }
                Ok(())
            }
            AnyObject::Scalar(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse;
    use crate::error::BoxError;

    fn echo(_: &str, v: Value) -> Result<Value, BoxError> {
        Ok(v)
    }

    fn load(yaml: &str) -> AnyObject {
        let options = Rc::new(Options::default());
        let mut obj = AnyObject::default();
        obj.unmarshal_yaml(&parse(yaml).unwrap(), Context::new(&options, ""), false)
            .unwrap();
        obj
    }

    #[test]
    fn dispatches_on_node_kind() {
        assert_eq!(load("3"), AnyObject::Scalar(Value::Int(3)));
        assert!(matches!(load("[1, 2]"), AnyObject::Seq(ref v) if v.len() == 2));
        assert!(load("a: b").get("a").is_some());
        assert_eq!(load(""), AnyObject::default());
    }

    #[test]
    fn nested_suffixes_resolve() {
        let mut obj = load("outer:\n  inner@echo: 1\n  list:\n  - k@echo: v\n");
        obj.resolve(&echo, -1).unwrap();
        let v = obj.to_value().unwrap().to_json().unwrap();
        assert_eq!(v, serde_json::json!({"outer": {"inner": 1, "list": [{"k": "v"}]}}));
    }

    #[test]
    fn lazy_items_are_rendered_in_place() {
        let mut obj = load("- a\n- __@echo: [b, c]\n");
        obj.resolve(&echo, -1).unwrap();
        let v = obj.to_value().unwrap().to_json().unwrap();
        assert_eq!(v, serde_json::json!(["a", ["b", "c"]]));
    }

    #[test]
    fn pending_entries_marshal_with_suffix() {
        let obj = load("k@echo: v\nplain: 1\n");
        let text = crate::emit::emit(&obj.marshal_yaml().unwrap());
        assert!(text.contains("k@echo: v"), "{text}");
        assert!(text.contains("plain: 1"), "{text}");
    }
}
