//! Rendering suffixes for YAML mapping keys.
//!
//! A key written as `name@renderer1|renderer2?hint!` is not decoded right away. Its raw value is
//! kept in the owning struct's [`BaseField`] and rendered later, on an explicit [`resolve`] pass,
//! by a host-supplied [`RenderingHandler`]. Plain keys are decoded as usual.
//!
//! ```rust
//! use rendering_suffix::{BaseField, BoxError, Value, impl_fields};
//!
//! #[derive(Default, Debug)]
//! struct Config {
//!     base: BaseField,
//!     name: String,
//!     port: u16,
//! }
//! impl_fields!(Config { base, name, port });
//!
//! let mut cfg = Config::default();
//! rendering_suffix::init(&mut cfg, Default::default()).unwrap();
//! rendering_suffix::from_str("name: web\nport@env?int: PORT\n", &mut cfg).unwrap();
//! assert_eq!(cfg.port, 0);
//!
//! let env = |_: &str, raw: Value| -> Result<Value, BoxError> {
//!     assert_eq!(raw.decoded()?.as_str(), Some("PORT"));
//!     Ok(Value::Str("8080".into()))
//! };
//! rendering_suffix::resolve(&mut cfg, &env, -1).unwrap();
//! assert_eq!(cfg.port, 8080);
//! ```

pub use crate::any_object::{AnyObject, AnyObjectMap};
pub use crate::budget::{Budget, BudgetBreach};
pub use crate::compose::{parse_all, parse_with_budget};
pub use crate::de::decode;
pub use crate::dynamic::{AnyKind, Dynamic, InterfaceKind};
pub use crate::emit::emit;
pub use crate::error::{BoxError, Error, Location};
pub use crate::field::{
    BaseField, FieldInfo, FieldRef, Fields, RS_TAG_NAMESPACE, UnresolvedSpec, VIRTUAL_KEY,
};
pub use crate::handler::{Identity, InterfaceTypeHandler, RenderingHandler};
pub use crate::node::{Node, NodeKind, ScalarStyle};
pub use crate::options::{DEFAULT_DATA_TAG_NAMESPACE, Options};
pub use crate::patch::{JsonPatchSpec, MergeSource, PatchSpec, merge_map, unique_list};
pub use crate::renderable::{AsAny, Context, InlineMap, Plain, Renderable};
pub use crate::ser::encode;
pub use crate::suffix::{RendererSpec, Renderers, format_renderers, parse_renderers};
pub use crate::typehint::TypeHint;
pub use crate::value::Value;

mod any_object;
mod base64;
mod budget;
mod compose;
mod de;
mod dynamic;
mod emit;
mod error;
mod field;
mod handler;
mod inherit;
pub mod jq;
mod macros;
mod marshal;
pub mod node;
mod options;
pub mod parse_scalars;
mod patch;
mod renderable;
mod resolve;
mod ser;
mod suffix;
mod tags;
mod typehint;
mod unmarshal;
mod value;

use std::rc::Rc;

#[doc(hidden)]
pub mod __private {
    pub use crate::field::init_struct;
    pub use crate::marshal::{is_zero_struct, marshal_fields};
    pub use crate::resolve::resolve_struct;
    pub use crate::unmarshal::unmarshal_struct;
}

/// Initialize a registered struct. Must run before any other operation; repeating it is a no-op.
pub fn init<T: Fields>(value: &mut T, options: Options) -> Result<(), Error> {
    field::init_struct(value, &Rc::new(options))
}

/// Parse a single YAML document into a node tree.
pub fn parse(input: &str) -> Result<Node, Error> {
    compose::parse(input)
}

/// Decode a YAML document into an initialized struct. The input is parsed under the struct's
/// [`Options::budget`].
pub fn from_str<T: Fields + Renderable>(input: &str, value: &mut T) -> Result<(), Error> {
    if !value.base().is_initialized() {
        return Err(Error::NotInitialized {
            type_name: value.type_name(),
        });
    }
    let doc = compose::parse_with_budget(input, &value.base().options().budget)?;
    from_node(&doc, value)
}

/// Like [`from_str`], for UTF-8 bytes.
pub fn from_slice<T: Fields + Renderable>(input: &[u8], value: &mut T) -> Result<(), Error> {
    let input = std::str::from_utf8(input)
        .map_err(|e| Error::msg(format!("input is not valid UTF-8: {e}")))?;
    from_str(input, value)
}

/// Decode a node tree into an initialized struct.
pub fn from_node<T: Fields + Renderable>(node: &Node, value: &mut T) -> Result<(), Error> {
    if !value.base().is_initialized() {
        return Err(Error::NotInitialized {
            type_name: value.type_name(),
        });
    }
    let options = value.base().options().clone();
    value.unmarshal_yaml(node, Context::new(&options, ""), false)
}

/// Resolve every pending entry up to `depth` struct levels (negative: no limit).
pub fn resolve<T: Fields>(value: &mut T, rc: &dyn RenderingHandler, depth: i32) -> Result<(), Error> {
    resolve::resolve_fields(value, rc, depth, &[])
}

/// Marshal a struct to a node tree; pending entries keep their suffixed keys.
pub fn to_node<T: Fields>(value: &T) -> Result<Node, Error> {
    marshal::marshal_fields(value)
}

/// Marshal a struct to YAML text.
pub fn to_string<T: Fields>(value: &T) -> Result<String, Error> {
    Ok(emit::emit(&to_node(value)?))
}

/// Copy the unresolved state of `other` into `value`.
pub fn inherit<T: Fields>(value: &mut T, other: &T) -> Result<(), Error> {
    inherit::inherit_fields(value, other)
}

/// Method forms of the free functions, for any registered struct.
pub trait FieldsExt: Fields {
    /// Resolve pending entries; `names` limits the pass to the given fields.
    fn resolve_fields(&mut self, rc: &dyn RenderingHandler, depth: i32, names: &[&str]) -> Result<(), Error>;

    fn inherit(&mut self, other: &Self) -> Result<(), Error>;

    /// Input keys still waiting for the resolver, with their suffixes, inline structs included.
    fn unresolved_keys(&self) -> Vec<String>;
}

impl<T: Fields> FieldsExt for T {
    fn resolve_fields(&mut self, rc: &dyn RenderingHandler, depth: i32, names: &[&str]) -> Result<(), Error> {
        resolve::resolve_fields(self, rc, depth, names)
    }

    fn inherit(&mut self, other: &Self) -> Result<(), Error> {
        inherit::inherit_fields(self, other)
    }

    fn unresolved_keys(&self) -> Vec<String> {
        fn collect(this: &dyn Fields, out: &mut Vec<String>) {
            let (base, slots) = this.split();
            for (key, spec) in &base.unresolved_normal_fields {
                out.push(marshal::pending_key(key, spec));
            }
            for (key, list) in &base.unresolved_inline_map_items {
                out.extend(list.iter().map(|spec| marshal::pending_key(key, spec)));
            }
            out.extend(
                base.unresolved_virtual_fields
                    .iter()
                    .map(|spec| marshal::pending_key(VIRTUAL_KEY, spec)),
            );
            for &i in &base.inline_structs {
                if let Some(child) = slots[i].as_fields() {
                    collect(child, out);
                }
            }
        }
        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }
}
