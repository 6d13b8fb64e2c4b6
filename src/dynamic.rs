//! Interface slots: the concrete type is chosen while decoding.

use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use crate::any_object::AnyObject;
use crate::error::Error;
use crate::field::Fields;
use crate::handler::RenderingHandler;
use crate::node::{Node, is_empty};
use crate::options::Options;
use crate::renderable::{Context, Renderable};

/// Names the interface a [`Dynamic`] slot stands for; the name is what the
/// [`crate::InterfaceTypeHandler`] receives.
pub trait InterfaceKind: 'static {
    const NAME: &'static str;
}

/// The unconstrained interface. Falls back to [`AnyObject`] when no handler claims it.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyKind;

impl InterfaceKind for AnyKind {
    const NAME: &'static str = "any";
}

/// Slot holding a value created by the configured interface type handler.
///
/// ```rust
/// use rendering_suffix::{AnyObject, Dynamic, Renderable};
///
/// let options = std::rc::Rc::new(rendering_suffix::Options::default());
/// let mut slot: Dynamic = Dynamic::default();
/// let doc = rendering_suffix::parse("[1, 2]").unwrap();
/// slot.unmarshal_yaml(&doc, rendering_suffix::Context::new(&options, "x"), false).unwrap();
/// assert!(slot.downcast_ref::<AnyObject>().is_some());
/// ```
pub struct Dynamic<K: InterfaceKind = AnyKind> {
    value: Option<Box<dyn Renderable>>,
    _kind: PhantomData<K>,
}

impl<K: InterfaceKind> Default for Dynamic<K> {
    fn default() -> Self {
        Self {
            value: None,
            _kind: PhantomData,
        }
    }
}

impl<K: InterfaceKind> fmt::Debug for Dynamic<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marshaled = self.value.as_ref().map(|v| v.marshal_yaml());
        f.debug_struct("Dynamic")
            .field("kind", &K::NAME)
            .field("value", &marshaled)
            .finish()
    }
}

impl<K: InterfaceKind> Dynamic<K> {
    pub fn get(&self) -> Option<&dyn Renderable> {
        self.value.as_deref()
    }

    pub fn get_mut(&mut self) -> Option<&mut dyn Renderable> {
        match &mut self.value {
            Some(v) => Some(v.as_mut()),
            None => None,
        }
    }

    pub fn set(&mut self, value: Box<dyn Renderable>) {
        self.value = Some(value);
    }

    pub fn downcast_ref<T: Renderable>(&self) -> Option<&T> {
        self.value.as_deref().and_then(|v| v.as_any().downcast_ref::<T>())
    }

    pub fn downcast_mut<T: Renderable>(&mut self) -> Option<&mut T> {
        match &mut self.value {
            Some(v) => (**v).as_any_mut().downcast_mut::<T>(),
            None => None,
        }
    }

    fn create(ctx: Context<'_>) -> Result<Box<dyn Renderable>, Error> {
        let created = match &ctx.options().interface_type_handler {
            Some(handler) => handler.create(K::NAME, ctx.key()),
            None => Err(Error::InterfaceTypeNotHandled),
        };
        match created {
            Err(Error::InterfaceTypeNotHandled) if K::NAME == AnyKind::NAME => {
                Ok(Box::new(AnyObject::default()))
            }
            Err(Error::InterfaceTypeNotHandled) => Err(Error::msg(format!(
                "no concrete type for interface `{}` at `{}`",
                K::NAME,
                ctx.key()
            ))),
            other => other,
        }
    }
}

impl<K: InterfaceKind> Renderable for Dynamic<K> {
    fn unmarshal_yaml(&mut self, node: &Node, ctx: Context<'_>, keep_old: bool) -> Result<(), Error> {
        if is_empty(node) {
            self.value = None;
            return Ok(());
        }
        if keep_old {
            if let Some(v) = &mut self.value {
                return v.unmarshal_yaml(node, ctx, true);
            }
        }
        let mut value = Self::create(ctx)?;
        value.init_fields(ctx.options())?;
        value.unmarshal_yaml(node, ctx, false)?;
        self.value = Some(value);
        Ok(())
    }

    fn marshal_yaml(&self) -> Result<Node, Error> {
        match &self.value {
            Some(v) => v.marshal_yaml(),
            None => Ok(Node::null()),
        }
    }

    fn resolve(&mut self, rc: &dyn RenderingHandler, depth: i32) -> Result<(), Error> {
        match &mut self.value {
            Some(v) => v.resolve(rc, depth),
            None => Ok(()),
        }
    }

    fn is_zero(&self) -> bool {
        self.value.as_ref().is_none_or(|v| v.is_zero())
    }

    fn init_fields(&mut self, options: &Rc<Options>) -> Result<(), Error> {
        match &mut self.value {
            Some(v) => v.init_fields(options),
            None => Ok(()),
        }
    }

    fn as_fields(&self) -> Option<&dyn Fields> {
        self.value.as_ref().and_then(|v| v.as_fields())
    }

    fn as_fields_mut(&mut self) -> Option<&mut dyn Fields> {
        match &mut self.value {
            Some(v) => v.as_fields_mut(),
            None => None,
        }
    }
}
