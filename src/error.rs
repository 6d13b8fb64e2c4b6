//! Defines error and its location
use std::fmt;

use saphyr_parser::{ScanError, Span};
use serde::{de, ser};

use crate::budget::BudgetBreach;

/// Boxed error returned by rendering handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Row/column location within the source YAML document (1-indexed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Location {
    /// 1-indexed row number in the input stream.
    pub(crate) row: u32,
    /// 1-indexed column number in the input stream.
    pub(crate) column: u32,
}

impl Location {
    /// Sentinel value meaning "location unknown".
    ///
    /// Nodes built from rendered values (rather than parsed text) carry this location.
    pub const UNKNOWN: Self = Self { row: 0, column: 0 };

    pub(crate) const fn new(row: usize, column: usize) -> Self {
        // error reporting only, 4G lines is plenty
        Self {
            row: row as u32,
            column: column as u32,
        }
    }

    /// 1-indexed line.
    pub fn line(&self) -> u64 {
        self.row as u64
    }

    /// 1-indexed column.
    pub fn column(&self) -> u64 {
        self.column as u64
    }

    pub(crate) fn is_known(&self) -> bool {
        self.row != 0
    }
}

/// Convert a `saphyr_parser::Span` to a 1-indexed `Location`.
pub(crate) fn location_from_span(span: &Span) -> Location {
    let start = &span.start;
    Location::new(start.line(), start.col() + 1)
}

/// Errors raised while parsing, unmarshaling, resolving, marshaling or inheriting.
///
/// Every error is fatal for the operation in flight; nothing is retried and no value is silently
/// dropped.
#[derive(Debug)]
pub enum Error {
    /// Free-form error with optional source location (scanner errors, serde custom messages).
    Message { msg: String, location: Location },
    /// An operation was invoked on a struct whose `BaseField` was never initialized.
    NotInitialized { type_name: &'static str },
    /// Something else than the expected node shape was found.
    ShapeMismatch {
        expected: &'static str,
        found: String,
        location: Location,
    },
    /// Input key matched no field and the struct has no inline-map slot.
    UnknownField { key: String, location: Location },
    /// The same logical key appeared twice in one mapping.
    DuplicateField { key: String, location: Location },
    /// Malformed `rs` tag, duplicate `rs:"other"`, or a directive on a slot that disables it.
    InvalidTag { field: String, msg: String },
    /// The rendering suffix could not be parsed.
    SuffixParse { suffix: String, msg: String },
    /// A type hint could not be applied to a rendered value.
    TypeHint { hint: &'static str, cause: String },
    /// The rendering handler failed.
    Renderer { renderer: String, source: BoxError },
    /// The renderer is not in the configured whitelist.
    RendererNotAllowed { renderer: String },
    /// Merge, JSON-Patch or query failure.
    Patch { msg: String },
    /// A rendered value could not be assigned to its destination slot.
    Assignability { key: String, cause: Box<Error> },
    /// Conflicting field identity while inheriting unresolved state.
    InheritMismatch { key: String, msg: String },
    /// Sentinel returned by an `InterfaceTypeHandler` that does not know the requested type.
    InterfaceTypeNotHandled,
    /// Alias references a non-existent anchor id.
    UnknownAnchor { id: usize, location: Location },
    /// A YAML budget limit was exceeded.
    Budget { breach: BudgetBreach, location: Location },
    /// Context wrapper naming the field whose resolution failed.
    Field { key: String, cause: Box<Error> },
}

impl Error {
    /// Construct a `Message` error with no known location.
    pub(crate) fn msg<S: Into<String>>(s: S) -> Self {
        Error::Message {
            msg: s.into(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn shape(expected: &'static str, found: impl Into<String>) -> Self {
        Error::ShapeMismatch {
            expected,
            found: found.into(),
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn patch<S: Into<String>>(s: S) -> Self {
        Error::Patch { msg: s.into() }
    }

    pub(crate) fn type_hint(hint: &'static str, cause: impl fmt::Display) -> Self {
        Error::TypeHint {
            hint,
            cause: cause.to_string(),
        }
    }

    pub(crate) fn unknown_anchor(id: usize) -> Self {
        Error::UnknownAnchor {
            id,
            location: Location::UNKNOWN,
        }
    }

    pub(crate) fn in_field(self, key: impl Into<String>) -> Self {
        Error::Field {
            key: key.into(),
            cause: Box::new(self),
        }
    }

    /// Attach/override a concrete location to this error and return it.
    ///
    /// Variants that carry no location are returned unchanged.
    pub(crate) fn with_location(mut self, set_location: Location) -> Self {
        match &mut self {
            Error::Message { location, .. }
            | Error::ShapeMismatch { location, .. }
            | Error::UnknownField { location, .. }
            | Error::DuplicateField { location, .. }
            | Error::UnknownAnchor { location, .. }
            | Error::Budget { location, .. } => {
                if !location.is_known() {
                    *location = set_location;
                }
            }
            _ => {}
        }
        self
    }

    /// If the error has a known location, return it.
    pub fn location(&self) -> Option<Location> {
        match self {
            Error::Message { location, .. }
            | Error::ShapeMismatch { location, .. }
            | Error::UnknownField { location, .. }
            | Error::DuplicateField { location, .. }
            | Error::UnknownAnchor { location, .. }
            | Error::Budget { location, .. } => {
                if location.is_known() {
                    Some(*location)
                } else {
                    None
                }
            }
            Error::Field { cause, .. } | Error::Assignability { cause, .. } => cause.location(),
            _ => None,
        }
    }

    /// Innermost error, skipping `Field` and `Assignability` context wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Field { cause, .. } | Error::Assignability { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Map a `saphyr_parser::ScanError` into our error type with location.
    pub(crate) fn from_scan_error(err: ScanError) -> Self {
        let mark = err.marker();
        Error::Message {
            msg: err.info().to_owned(),
            location: Location::new(mark.line(), mark.col() + 1),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Message { msg, location } => fmt_with_location(f, msg, location),
            Error::NotInitialized { type_name } => {
                write!(f, "rs: struct `{type_name}` not initialized before use")
            }
            Error::ShapeMismatch {
                expected,
                found,
                location,
            } => fmt_with_location(f, &format!("expected {expected}, found {found}"), location),
            Error::UnknownField { key, location } => {
                fmt_with_location(f, &format!("unknown field `{key}`"), location)
            }
            Error::DuplicateField { key, location } => {
                fmt_with_location(f, &format!("duplicate field `{key}`"), location)
            }
            Error::InvalidTag { field, msg } => write!(f, "invalid tag on field `{field}`: {msg}"),
            Error::SuffixParse { suffix, msg } => {
                write!(f, "invalid rendering suffix `{suffix}`: {msg}")
            }
            Error::TypeHint { hint, cause } => write!(f, "typehint.{hint}: {cause}"),
            Error::Renderer { renderer, source } => write!(f, "renderer `{renderer}`: {source}"),
            Error::RendererNotAllowed { renderer } => {
                write!(f, "renderer `{renderer}` is not allowed")
            }
            Error::Patch { msg } => write!(f, "patch: {msg}"),
            Error::Assignability { key, cause } => {
                write!(f, "rendered value not assignable to `{key}`: {cause}")
            }
            Error::InheritMismatch { key, msg } => write!(f, "inherit `{key}`: {msg}"),
            Error::InterfaceTypeNotHandled => write!(f, "interface type not handled"),
            Error::UnknownAnchor { id, location } => fmt_with_location(
                f,
                &format!("alias references unknown anchor id {id}"),
                location,
            ),
            Error::Budget { breach, location } => {
                fmt_with_location(f, &format!("YAML budget breached: {breach:?}"), location)
            }
            Error::Field { key, cause } => write!(f, "field `{key}`: {cause}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Renderer { source, .. } => Some(source.as_ref()),
            Error::Field { cause, .. } | Error::Assignability { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl de::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::msg(msg.to_string())
    }
}

impl ser::Error for Error {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        Error::msg(msg.to_string())
    }
}

/// Print a message optionally suffixed with "at line X, column Y".
fn fmt_with_location(f: &mut fmt::Formatter<'_>, msg: &str, location: &Location) -> fmt::Result {
    if location.is_known() {
        write!(
            f,
            "{msg} at line {}, column {}",
            location.row, location.column
        )
    } else {
        write!(f, "{msg}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_is_printed_when_known() {
        let err = Error::msg("boom").with_location(Location::new(3, 7));
        assert_eq!(err.to_string(), "boom at line 3, column 7");
        assert_eq!(err.location(), Some(Location::new(3, 7)));
    }

    #[test]
    fn type_hint_errors_name_the_hint() {
        let err = Error::type_hint("int", "invalid digit");
        assert_eq!(err.to_string(), "typehint.int: invalid digit");
    }

    #[test]
    fn root_cause_skips_context() {
        let err = Error::patch("bad").in_field("spec").in_field("outer");
        assert!(matches!(err.root_cause(), Error::Patch { .. }));
        assert_eq!(err.to_string(), "field `outer`: field `spec`: patch: bad");
    }

    #[test]
    fn with_location_keeps_first_known_location() {
        let err = Error::shape("mapping", "sequence")
            .with_location(Location::new(1, 1))
            .with_location(Location::new(9, 9));
        assert_eq!(err.location(), Some(Location::new(1, 1)));
    }
}
