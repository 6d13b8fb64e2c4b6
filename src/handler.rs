//! Host-supplied handlers.
//!
//! Both traits have a blanket impl for closures so callers can pass a `|name, value| ...` directly.

use crate::error::{BoxError, Error};
use crate::renderable::Renderable;
use crate::value::Value;

/// Executes a named renderer over a value.
///
/// The first renderer of a chain receives the raw YAML as [`Value::Node`]; later renderers get
/// whatever the previous step returned.
pub trait RenderingHandler {
    fn render_yaml(&self, renderer: &str, raw: Value) -> Result<Value, BoxError>;
}

impl<F> RenderingHandler for F
where
    F: Fn(&str, Value) -> Result<Value, BoxError>,
{
    fn render_yaml(&self, renderer: &str, raw: Value) -> Result<Value, BoxError> {
        self(renderer, raw)
    }
}

/// Creates concrete values for interface slots.
///
/// `kind` is the interface name of the slot (`any` for a bare dynamic slot), `yaml_key` the input
/// key being decoded. Return [`Error::InterfaceTypeNotHandled`] to fall back to default decoding.
pub trait InterfaceTypeHandler {
    fn create(&self, kind: &str, yaml_key: &str) -> Result<Box<dyn Renderable>, Error>;
}

impl<F> InterfaceTypeHandler for F
where
    F: Fn(&str, &str) -> Result<Box<dyn Renderable>, Error>,
{
    fn create(&self, kind: &str, yaml_key: &str) -> Result<Box<dyn Renderable>, Error> {
        self(kind, yaml_key)
    }
}

/// Handler that returns every input unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl RenderingHandler for Identity {
    fn render_yaml(&self, _renderer: &str, raw: Value) -> Result<Value, BoxError> {
        Ok(raw)
    }
}
