use std::fmt;
use std::rc::Rc;

use indexmap::IndexSet;

use crate::budget::Budget;
use crate::handler::InterfaceTypeHandler;

/// Struct-tag namespace read when no other is configured.
pub const DEFAULT_DATA_TAG_NAMESPACE: &str = "yaml";

/// Configuration stored in every initialized `BaseField`.
///
/// Options are fixed at `init` time and shared (`Rc`) with nested bases.
///
/// ```rust
/// use rendering_suffix::Options;
///
/// let options = rendering_suffix::options! {
///     allow_unknown_fields: true,
///     allowed_renderers: Some(["echo", "env"].into_iter().map(String::from).collect()),
/// };
/// assert!(options.is_renderer_allowed("echo"));
/// assert!(!options.is_renderer_allowed("shell"));
/// assert_eq!(options.data_tag_namespace, "yaml");
/// ```
#[derive(Clone)]
pub struct Options {
    /// Creates concrete values for interface slots (`Dynamic<K>`).
    pub interface_type_handler: Option<Rc<dyn InterfaceTypeHandler>>,
    /// Namespace of the field tag that names input keys. Default: `yaml`.
    pub data_tag_namespace: String,
    /// Silently skip input keys that match no field and no inline map. Default: false.
    pub allow_unknown_fields: bool,
    /// When set, only these renderer names may be invoked.
    pub allowed_renderers: Option<IndexSet<String>>,
    /// Limits applied when `from_str`/`from_slice` parse input for this struct.
    pub budget: Budget,
}

impl Options {
    /// True when no whitelist is configured or `name` is on it.
    pub fn is_renderer_allowed(&self, name: &str) -> bool {
        match &self.allowed_renderers {
            None => true,
            Some(allowed) => allowed.contains(name),
        }
    }

    /// Builder-style setter for the interface type handler.
    pub fn with_interface_type_handler<H>(mut self, handler: H) -> Self
    where
        H: InterfaceTypeHandler + 'static,
    {
        self.interface_type_handler = Some(Rc::new(handler));
        self
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interface_type_handler: None,
            data_tag_namespace: DEFAULT_DATA_TAG_NAMESPACE.to_string(),
            allow_unknown_fields: false,
            allowed_renderers: None,
            budget: Budget::default(),
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field(
                "interface_type_handler",
                &if self.interface_type_handler.is_some() { "set" } else { "none" },
            )
            .field("data_tag_namespace", &self.data_tag_namespace)
            .field("allow_unknown_fields", &self.allow_unknown_fields)
            .field("allowed_renderers", &self.allowed_renderers)
            .field("budget", &self.budget)
            .finish()
    }
}
