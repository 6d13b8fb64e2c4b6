//! Public macros: option construction without struct literal syntax, and struct registration.

/// Construct [`crate::Options`] from `Default` and a list of field assignments.
///
/// Example:
///
/// ```rust
/// let options = rendering_suffix::options! {
///     allow_unknown_fields: true,
///     data_tag_namespace: "json".to_string(),
/// };
/// assert!(options.allow_unknown_fields);
/// ```
#[macro_export]
macro_rules! options {
    ( $( $field:ident : $value:expr ),* $(,)? ) => {{
        let mut opt = $crate::Options::default();
        $(
            #[allow(deprecated)]
            {
                opt.$field = $value;
            }
        )*
        opt
    }};
}

/// Register a struct so its keys may carry rendering suffixes.
///
/// The first name is the [`crate::BaseField`] member; the remaining names are the slots, each
/// optionally preceded by tags as `#[namespace = "value"]`. The data namespace (`yaml` unless
/// configured otherwise) takes `key,omitempty,inline`; `rs` takes `other` (catch-all slot) and
/// `disabled` (no suffixes for this slot).
///
/// ```rust
/// use std::collections::BTreeMap;
/// use rendering_suffix::{BaseField, impl_fields};
///
/// #[derive(Default, Debug)]
/// struct Service {
///     base: BaseField,
///     name: String,
///     replicas: i64,
///     labels: BTreeMap<String, String>,
///     extra: BTreeMap<String, String>,
/// }
///
/// impl_fields!(Service {
///     base,
///     name,
///     #[yaml = "replicas,omitempty"] replicas,
///     labels,
///     #[rs = "other"] extra,
/// });
///
/// let mut svc = Service::default();
/// rendering_suffix::init(&mut svc, Default::default()).unwrap();
/// rendering_suffix::from_str("name: web\nreplicas@echo: 3\nzone: a\n", &mut svc).unwrap();
/// assert_eq!(svc.name, "web");
/// assert_eq!(svc.extra["zone"], "a");
/// ```
#[macro_export]
macro_rules! impl_fields {
    ( $ty:ident { $base:ident $( , $( #[$ns:ident = $tag:literal] )* $field:ident )* $(,)? } ) => {
        impl $crate::Fields for $ty {
            fn type_name(&self) -> &'static str {
                ::std::any::type_name::<$ty>()
            }

            fn field_infos(&self) -> &'static [$crate::FieldInfo] {
                const INFOS: &[$crate::FieldInfo] = &[
                    $(
                        $crate::FieldInfo {
                            name: stringify!($field),
                            tags: &[ $( (stringify!($ns), $tag) ),* ],
                        }
                    ),*
                ];
                INFOS
            }

            fn base(&self) -> &$crate::BaseField {
                &self.$base
            }

            fn base_mut(&mut self) -> &mut $crate::BaseField {
                &mut self.$base
            }

            fn split(&self) -> (&$crate::BaseField, ::std::vec::Vec<&dyn $crate::Renderable>) {
                (&self.$base, ::std::vec![ $( &self.$field as &dyn $crate::Renderable ),* ])
            }

            fn split_mut(
                &mut self,
            ) -> (&mut $crate::BaseField, ::std::vec::Vec<&mut dyn $crate::Renderable>) {
                (&mut self.$base, ::std::vec![ $( &mut self.$field as &mut dyn $crate::Renderable ),* ])
            }
        }

        impl $crate::Renderable for $ty {
            fn unmarshal_yaml(
                &mut self,
                node: &$crate::Node,
                ctx: $crate::Context<'_>,
                keep_old: bool,
            ) -> ::std::result::Result<(), $crate::Error> {
                $crate::__private::unmarshal_struct(self, node, ctx, keep_old)
            }

            fn marshal_yaml(&self) -> ::std::result::Result<$crate::Node, $crate::Error> {
                $crate::__private::marshal_fields(self)
            }

            fn resolve(
                &mut self,
                rc: &dyn $crate::RenderingHandler,
                depth: i32,
            ) -> ::std::result::Result<(), $crate::Error> {
                $crate::__private::resolve_struct(self, rc, depth)
            }

            fn is_zero(&self) -> bool {
                $crate::__private::is_zero_struct(self)
            }

            fn init_fields(
                &mut self,
                options: &::std::rc::Rc<$crate::Options>,
            ) -> ::std::result::Result<(), $crate::Error> {
                $crate::__private::init_struct(self, options)
            }

            fn as_fields(&self) -> ::std::option::Option<&dyn $crate::Fields> {
                ::std::option::Option::Some(self)
            }

            fn as_fields_mut(&mut self) -> ::std::option::Option<&mut dyn $crate::Fields> {
                ::std::option::Option::Some(self)
            }
        }
    };
}
