//! Destination slots.
//!
//! Every field of a registered struct is a [`Renderable`]: it knows how to take a YAML node,
//! how to give one back, and how to walk into itself when resolving. Registered structs get their
//! impl from [`crate::impl_fields!`]; this module covers the std types, raw [`Node`]/[`Value`]
//! holders and the serde bridge [`Plain`].

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::ops::{Deref, DerefMut};
use std::rc::Rc;

use indexmap::IndexMap;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::base64::decode_base64_yaml;
use crate::de::decode;
use crate::error::Error;
use crate::field::Fields;
use crate::handler::RenderingHandler;
use crate::node::{Node, NodeKind, is_empty, key_text, merge_pairs, prepare};
use crate::options::Options;
use crate::ser::encode;
use crate::tags::is_binary_tag;
use crate::typehint::TypeHint;
use crate::value::Value;

/// What a slot sees of its surroundings while decoding.
#[derive(Clone, Copy, Debug)]
pub struct Context<'a> {
    options: &'a Rc<Options>,
    key: &'a str,
}

impl<'a> Context<'a> {
    pub fn new(options: &'a Rc<Options>, key: &'a str) -> Self {
        Self { options, key }
    }

    /// Options of the struct that owns the slot.
    pub fn options(&self) -> &'a Rc<Options> {
        self.options
    }

    /// Input key the node was found under (logical name, suffix removed).
    pub fn key(&self) -> &'a str {
        self.key
    }

    pub fn with_key<'b>(&self, key: &'b str) -> Context<'b>
    where
        'a: 'b,
    {
        Context {
            options: self.options,
            key,
        }
    }
}

/// Upcast helper so trait objects can be downcast to their concrete slot type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A slot that takes part in unmarshaling, resolving and marshaling.
pub trait Renderable: AsAny {
    /// Decode `node` into `self`. With `keep_old`, containers extend their current content
    /// instead of replacing it.
    fn unmarshal_yaml(&mut self, node: &Node, ctx: Context<'_>, keep_old: bool) -> Result<(), Error>;

    fn marshal_yaml(&self) -> Result<Node, Error>;

    /// Resolve pending entries below this slot. Containers hand `depth` through unchanged;
    /// registered structs consume one level.
    fn resolve(&mut self, _rc: &dyn RenderingHandler, _depth: i32) -> Result<(), Error> {
        Ok(())
    }

    /// True for values `omitempty` leaves out.
    fn is_zero(&self) -> bool;

    /// Initialize registered structs reachable from this slot.
    fn init_fields(&mut self, _options: &Rc<Options>) -> Result<(), Error> {
        Ok(())
    }

    fn as_fields(&self) -> Option<&dyn Fields> {
        None
    }

    fn as_fields_mut(&mut self) -> Option<&mut dyn Fields> {
        None
    }

    fn as_inline_map(&self) -> Option<&dyn InlineMap> {
        None
    }

    fn as_inline_map_mut(&mut self) -> Option<&mut dyn InlineMap> {
        None
    }
}

/// Slots that can collect the keys no other field claims (`rs:"other"`).
pub trait InlineMap {
    /// Store one item. With `keep_old` an existing item under `key` is extended.
    fn put_item(&mut self, key: &str, node: &Node, ctx: Context<'_>, keep_old: bool) -> Result<(), Error>;

    fn clear_items(&mut self);

    /// Items as `(key, node)` pairs in output order.
    fn marshal_items(&self) -> Result<Vec<(String, Node)>, Error>;
}

macro_rules! impl_renderable_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl Renderable for $ty {
            fn unmarshal_yaml(&mut self, node: &Node, _ctx: Context<'_>, _keep_old: bool) -> Result<(), Error> {
                *self = if is_empty(node) { <$ty>::default() } else { decode(node)? };
                Ok(())
            }

            fn marshal_yaml(&self) -> Result<Node, Error> {
                encode(self)
            }

            fn is_zero(&self) -> bool {
                *self == <$ty>::default()
            }
        }
    )*};
}

impl_renderable_scalar!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool, char);

impl Renderable for String {
    fn unmarshal_yaml(&mut self, node: &Node, _ctx: Context<'_>, _keep_old: bool) -> Result<(), Error> {
        self.clear();
        let Some(n) = prepare(node) else {
            return Ok(());
        };
        if is_empty(n) {
            return Ok(());
        }
        if n.kind != NodeKind::Scalar {
            return Err(Error::shape("string", n.describe()).with_location(n.location));
        }
        if is_binary_tag(&n.tag) {
            let bytes = decode_base64_yaml(&n.value).map_err(|e| e.with_location(n.location))?;
            *self = String::from_utf8(bytes)
                .map_err(|e| Error::msg(format!("binary value is not UTF-8: {e}")).with_location(n.location))?;
        } else {
            self.push_str(&n.value);
        }
        Ok(())
    }

    fn marshal_yaml(&self) -> Result<Node, Error> {
        Ok(Node::string(self.as_str()))
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl<T: Renderable + Default> Renderable for Option<T> {
    fn unmarshal_yaml(&mut self, node: &Node, ctx: Context<'_>, keep_old: bool) -> Result<(), Error> {
        if is_empty(node) {
            *self = None;
            return Ok(());
        }
        if !keep_old {
            *self = None;
        }
        self.get_or_insert_with(T::default).unmarshal_yaml(node, ctx, keep_old)
    }

    fn marshal_yaml(&self) -> Result<Node, Error> {
        match self {
            Some(v) => v.marshal_yaml(),
            None => Ok(Node::null()),
        }
    }

    fn resolve(&mut self, rc: &dyn RenderingHandler, depth: i32) -> Result<(), Error> {
        match self {
            Some(v) => v.resolve(rc, depth),
            None => Ok(()),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }

    fn init_fields(&mut self, options: &Rc<Options>) -> Result<(), Error> {
        match self {
            Some(v) => v.init_fields(options),
            None => Ok(()),
        }
    }
}

impl<T: Renderable> Renderable for Box<T> {
    fn unmarshal_yaml(&mut self, node: &Node, ctx: Context<'_>, keep_old: bool) -> Result<(), Error> {
        (**self).unmarshal_yaml(node, ctx, keep_old)
    }

    fn marshal_yaml(&self) -> Result<Node, Error> {
        (**self).marshal_yaml()
    }

    fn resolve(&mut self, rc: &dyn RenderingHandler, depth: i32) -> Result<(), Error> {
        (**self).resolve(rc, depth)
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }

    fn init_fields(&mut self, options: &Rc<Options>) -> Result<(), Error> {
        (**self).init_fields(options)
    }

    fn as_fields(&self) -> Option<&dyn Fields> {
        (**self).as_fields()
    }

    fn as_fields_mut(&mut self) -> Option<&mut dyn Fields> {
        (**self).as_fields_mut()
    }

    fn as_inline_map(&self) -> Option<&dyn InlineMap> {
        (**self).as_inline_map()
    }

    fn as_inline_map_mut(&mut self) -> Option<&mut dyn InlineMap> {
        (**self).as_inline_map_mut()
    }
}

/// Peel `node` to a container of `kind`, reparsing scalars that hold serialized YAML.
fn coerce_container<'n>(
    node: &'n Node,
    hint: TypeHint,
    kind: NodeKind,
    expected: &'static str,
) -> Result<std::borrow::Cow<'n, Node>, Error> {
    let Some(n) = prepare(node) else {
        return Err(Error::shape(expected, "empty document"));
    };
    if n.kind == kind {
        return Ok(std::borrow::Cow::Borrowed(n));
    }
    if n.kind == NodeKind::Scalar {
        let coerced = hint
            .apply(Value::Node(n.clone()))
            .map_err(|e| Error::shape(expected, e.to_string()).with_location(n.location))?
            .into_node();
        if let Some(c) = prepare(&coerced) {
            if c.kind == kind {
                return Ok(std::borrow::Cow::Owned(c.clone()));
            }
        }
    }
    Err(Error::shape(expected, n.describe()).with_location(n.location))
}

fn decode_item<T: Renderable + Default>(node: &Node, ctx: Context<'_>) -> Result<T, Error> {
    let mut item = T::default();
    item.init_fields(ctx.options())?;
    item.unmarshal_yaml(node, ctx, false)?;
    Ok(item)
}

impl<T: Renderable + Default> Renderable for Vec<T> {
    fn unmarshal_yaml(&mut self, node: &Node, ctx: Context<'_>, keep_old: bool) -> Result<(), Error> {
        if is_empty(node) {
            self.clear();
            return Ok(());
        }
        let seq = coerce_container(node, TypeHint::ObjectList, NodeKind::Sequence, "sequence")?;
        if !keep_old {
            self.clear();
        }
        self.reserve(seq.children.len());
        for item in &seq.children {
            self.push(decode_item(item, ctx)?);
        }
        Ok(())
    }

    fn marshal_yaml(&self) -> Result<Node, Error> {
        Ok(Node::sequence(
            self.iter().map(|v| v.marshal_yaml()).collect::<Result<_, _>>()?,
        ))
    }

    fn resolve(&mut self, rc: &dyn RenderingHandler, depth: i32) -> Result<(), Error> {
        for item in self.iter_mut() {
            item.resolve(rc, depth)?;
        }
        Ok(())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn init_fields(&mut self, options: &Rc<Options>) -> Result<(), Error> {
        for item in self.iter_mut() {
            item.init_fields(options)?;
        }
        Ok(())
    }

    fn as_inline_map(&self) -> Option<&dyn InlineMap> {
        Some(self)
    }

    fn as_inline_map_mut(&mut self) -> Option<&mut dyn InlineMap> {
        Some(self)
    }
}

/// Each item becomes one element decoded from the one-entry mapping `{key: node}`.
impl<T: Renderable + Default> InlineMap for Vec<T> {
    fn put_item(&mut self, key: &str, node: &Node, ctx: Context<'_>, _keep_old: bool) -> Result<(), Error> {
        let entry = Node::single_entry(key, node.clone());
        self.push(decode_item(&entry, ctx)?);
        Ok(())
    }

    fn clear_items(&mut self) {
        self.clear();
    }

    fn marshal_items(&self) -> Result<Vec<(String, Node)>, Error> {
        let mut out = Vec::new();
        for item in self {
            let node = item.marshal_yaml()?;
            if !node.is_mapping() {
                return Err(Error::shape("mapping as inline item", node.describe()));
            }
            for (k, v) in node.pairs() {
                let key = key_text(k).ok_or_else(|| Error::shape("string key", k.describe()))?;
                out.push((key, v.clone()));
            }
        }
        Ok(out)
    }
}

impl<T: Renderable + Default, const N: usize> Renderable for [T; N] {
    fn unmarshal_yaml(&mut self, node: &Node, ctx: Context<'_>, keep_old: bool) -> Result<(), Error> {
        if is_empty(node) {
            self.iter_mut().for_each(|v| *v = T::default());
            return Ok(());
        }
        let seq = coerce_container(node, TypeHint::ObjectList, NodeKind::Sequence, "sequence")?;
        if seq.children.len() != N {
            return Err(Error::shape(
                "sequence of matching length",
                format!("{} items for an array of {N}", seq.children.len()),
            )
            .with_location(seq.location));
        }
        for (slot, item) in self.iter_mut().zip(&seq.children) {
            slot.init_fields(ctx.options())?;
            slot.unmarshal_yaml(item, ctx, keep_old)?;
        }
        Ok(())
    }

    fn marshal_yaml(&self) -> Result<Node, Error> {
        Ok(Node::sequence(
            self.iter().map(|v| v.marshal_yaml()).collect::<Result<_, _>>()?,
        ))
    }

    fn resolve(&mut self, rc: &dyn RenderingHandler, depth: i32) -> Result<(), Error> {
        for item in self.iter_mut() {
            item.resolve(rc, depth)?;
        }
        Ok(())
    }

    fn is_zero(&self) -> bool {
        self.iter().all(|v| v.is_zero())
    }

    fn init_fields(&mut self, options: &Rc<Options>) -> Result<(), Error> {
        for item in self.iter_mut() {
            item.init_fields(options)?;
        }
        Ok(())
    }
}

/// String-keyed maps. Keys are taken literally: a `k@renderer` key inside a map stays `k@renderer`.
macro_rules! impl_renderable_map {
    ([$($gen:tt)*] $map:ty, sorted = $sorted:expr) => {
        impl<T: Renderable + Default, $($gen)*> Renderable for $map {
            fn unmarshal_yaml(&mut self, node: &Node, ctx: Context<'_>, keep_old: bool) -> Result<(), Error> {
                if is_empty(node) {
                    self.clear();
                    return Ok(());
                }
                let map = coerce_container(node, TypeHint::Object, NodeKind::Mapping, "mapping")?;
                if !keep_old {
                    self.clear();
                }
                let mut seen = std::collections::HashSet::new();
                for (k, v) in merge_pairs(&map)? {
                    let key = key_text(k)
                        .ok_or_else(|| Error::shape("string key", k.describe()).with_location(k.location))?;
                    if !seen.insert(key.clone()) {
                        return Err(Error::DuplicateField { key, location: k.location });
                    }
                    self.put_item(&key, v, ctx.with_key(&key), false)?;
                }
                Ok(())
            }

            fn marshal_yaml(&self) -> Result<Node, Error> {
                Ok(Node::mapping(
                    self.marshal_items()?
                        .into_iter()
                        .map(|(k, v)| (Node::scalar(k), v)),
                ))
            }

            fn resolve(&mut self, rc: &dyn RenderingHandler, depth: i32) -> Result<(), Error> {
                for item in self.values_mut() {
                    item.resolve(rc, depth)?;
                }
                Ok(())
            }

            fn is_zero(&self) -> bool {
                self.is_empty()
            }

            fn init_fields(&mut self, options: &Rc<Options>) -> Result<(), Error> {
                for item in self.values_mut() {
                    item.init_fields(options)?;
                }
                Ok(())
            }

            fn as_inline_map(&self) -> Option<&dyn InlineMap> {
                Some(self)
            }

            fn as_inline_map_mut(&mut self) -> Option<&mut dyn InlineMap> {
                Some(self)
            }
        }

        impl<T: Renderable + Default, $($gen)*> InlineMap for $map {
            fn put_item(&mut self, key: &str, node: &Node, ctx: Context<'_>, keep_old: bool) -> Result<(), Error> {
                if keep_old {
                    if let Some(existing) = self.get_mut(key) {
                        return existing.unmarshal_yaml(node, ctx, true);
                    }
                }
                let item = decode_item(node, ctx)?;
                self.insert(key.to_string(), item);
                Ok(())
            }

            fn clear_items(&mut self) {
                self.clear();
            }

            fn marshal_items(&self) -> Result<Vec<(String, Node)>, Error> {
                let mut out = self
                    .iter()
                    .map(|(k, v)| Ok((k.clone(), v.marshal_yaml()?)))
                    .collect::<Result<Vec<_>, Error>>()?;
                if $sorted {
                    out.sort_by(|a, b| a.0.cmp(&b.0));
                }
                Ok(out)
            }
        }
    };
}

impl_renderable_map!([S: BuildHasher + Default + 'static] HashMap<String, T, S>, sorted = true);
impl_renderable_map!([] BTreeMap<String, T>, sorted = false);
impl_renderable_map!([S: BuildHasher + Default + 'static] IndexMap<String, T, S>, sorted = false);

/// Raw holder: keeps the node exactly as written.
impl Renderable for Node {
    fn unmarshal_yaml(&mut self, node: &Node, _ctx: Context<'_>, _keep_old: bool) -> Result<(), Error> {
        *self = match prepare(node) {
            Some(n) => n.clone(),
            None => Node::null(),
        };
        Ok(())
    }

    fn marshal_yaml(&self) -> Result<Node, Error> {
        Ok(self.clone())
    }

    fn is_zero(&self) -> bool {
        is_empty(self)
    }
}

impl Renderable for Value {
    fn unmarshal_yaml(&mut self, node: &Node, _ctx: Context<'_>, _keep_old: bool) -> Result<(), Error> {
        *self = Value::from_node(node)?;
        Ok(())
    }

    fn marshal_yaml(&self) -> Result<Node, Error> {
        Ok(self.clone().into_node())
    }

    fn is_zero(&self) -> bool {
        self.is_null()
    }
}

/// Serde bridge: any `Serialize + DeserializeOwned` type as a slot.
///
/// The value is decoded in one go; suffixes inside it are not looked at.
///
/// ```rust
/// use rendering_suffix::{Node, Plain, Renderable};
///
/// #[derive(serde::Serialize, serde::Deserialize, Default, PartialEq, Debug)]
/// struct Point { x: i32, y: i32 }
///
/// let doc = rendering_suffix::parse("{x: 1, y: 2}").unwrap();
/// let options = std::rc::Rc::new(rendering_suffix::Options::default());
/// let mut slot = Plain::<Point>::default();
/// slot.unmarshal_yaml(&doc, rendering_suffix::Context::new(&options, "p"), false).unwrap();
/// assert_eq!(*slot, Point { x: 1, y: 2 });
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plain<T>(pub T);

impl<T> Deref for Plain<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T> DerefMut for Plain<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> From<T> for Plain<T> {
    fn from(v: T) -> Self {
        Plain(v)
    }
}

impl<T> Renderable for Plain<T>
where
    T: Serialize + DeserializeOwned + Default + PartialEq + 'static,
{
    fn unmarshal_yaml(&mut self, node: &Node, _ctx: Context<'_>, _keep_old: bool) -> Result<(), Error> {
        self.0 = if is_empty(node) { T::default() } else { decode(node)? };
        Ok(())
    }

    fn marshal_yaml(&self) -> Result<Node, Error> {
        encode(&self.0)
    }

    fn is_zero(&self) -> bool {
        self.0 == T::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse;

    fn ctx_options() -> Rc<Options> {
        Rc::new(Options::default())
    }

    fn load<T: Renderable + Default>(yaml: &str) -> Result<T, Error> {
        let options = ctx_options();
        let mut v = T::default();
        v.unmarshal_yaml(&parse(yaml)?, Context::new(&options, "test"), false)?;
        Ok(v)
    }

    #[test]
    fn scalars() {
        assert_eq!(load::<i32>("-12").unwrap(), -12);
        assert_eq!(load::<u8>("0x1f").unwrap(), 31);
        assert!(load::<bool>("yes").unwrap());
        assert_eq!(load::<f64>("~").unwrap(), 0.0);
        assert!(load::<u8>("300").is_err());
    }

    #[test]
    fn strings_take_any_scalar_text() {
        assert_eq!(load::<String>("123").unwrap(), "123");
        assert_eq!(load::<String>("'quoted'").unwrap(), "quoted");
        assert_eq!(load::<String>("!!binary aGVsbG8=").unwrap(), "hello");
        assert_eq!(load::<String>("null").unwrap(), "");
        let err = load::<String>("[a]").unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }), "{err}");
    }

    #[test]
    fn serialized_sequences_are_coerced() {
        let v = load::<Vec<i64>>("'[1, 2, 3]'").unwrap();
        assert_eq!(v, vec![1, 2, 3]);
        let m = load::<BTreeMap<String, String>>("'{a: b}'").unwrap();
        assert_eq!(m["a"], "b");
    }

    #[test]
    fn arrays_check_their_length() {
        assert_eq!(load::<[u8; 2]>("[1, 2]").unwrap(), [1, 2]);
        let err = load::<[u8; 2]>("[1, 2, 3]").unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }), "{err}");
    }

    #[test]
    fn map_keys_are_not_split() {
        let m = load::<HashMap<String, String>>("k@renderer: v").unwrap();
        assert_eq!(m.get("k@renderer").map(String::as_str), Some("v"));
    }

    #[test]
    fn duplicate_map_keys_are_rejected() {
        let err = load::<IndexMap<String, i32>>("a: 1\na: 2\n").unwrap_err();
        assert!(matches!(err, Error::DuplicateField { ref key, .. } if key == "a"), "{err}");
    }

    #[test]
    fn keep_old_extends_containers() {
        let options = ctx_options();
        let ctx = Context::new(&options, "v");
        let mut v: Vec<i32> = vec![1];
        v.unmarshal_yaml(&parse("[2]").unwrap(), ctx, true).unwrap();
        assert_eq!(v, vec![1, 2]);
        v.unmarshal_yaml(&parse("[3]").unwrap(), ctx, false).unwrap();
        assert_eq!(v, vec![3]);
    }

    #[test]
    fn hash_maps_marshal_sorted() {
        let m = load::<HashMap<String, i32>>("b: 2\na: 1\nc: 3\n").unwrap();
        let node = m.marshal_yaml().unwrap();
        let keys: Vec<_> = node.pairs().filter_map(|(k, _)| key_text(k)).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn vec_inline_items_are_single_entry_maps() {
        let options = ctx_options();
        let ctx = Context::new(&options, "x");
        let mut v: Vec<BTreeMap<String, String>> = Vec::new();
        v.put_item("x", &Node::scalar("1"), ctx, false).unwrap();
        v.put_item("y", &Node::scalar("2"), ctx, false).unwrap();
        let items = v.marshal_items().unwrap();
        let keys: Vec<_> = items.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["x", "y"]);
    }
}
