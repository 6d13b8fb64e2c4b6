//! Rendering suffix grammar.
//!
//! ```text
//! chain := spec ( '|' spec )*
//! spec  := name ( '?' hint )? ( '!' )?
//! ```
//!
//! Empty segments (`|a||b`) are skipped. The canonical text of a chain joins the specs with `|`
//! and writes each as `name?hint!`, so parsing the canonical text gives back the same chain.

use std::fmt;

use smallvec::SmallVec;

use crate::error::Error;
use crate::typehint::TypeHint;

/// One step of a renderer chain.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RendererSpec {
    /// Renderer name; empty for the identity renderer.
    pub name: String,
    /// Interpret the input as a patch spec before rendering.
    pub patch: bool,
    pub type_hint: TypeHint,
}

/// Renderer chain attached to one key; most keys carry one or two renderers.
pub type Renderers = SmallVec<[RendererSpec; 2]>;

impl fmt::Display for RendererSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.type_hint != TypeHint::None {
            write!(f, "?{}", self.type_hint)?;
        }
        if self.patch {
            f.write_str("!")?;
        }
        Ok(())
    }
}

/// Parse the part of a key after its last `@`.
pub fn parse_renderers(suffix: &str) -> Result<Renderers, Error> {
    let mut out = Renderers::new();
    for segment in suffix.split('|') {
        if segment.is_empty() {
            continue;
        }
        let (rest, patch) = match segment.strip_suffix('!') {
            Some(rest) => (rest, true),
            None => (segment, false),
        };
        let (name, hint) = match rest.split_once('?') {
            Some((name, hint)) => (name, hint),
            None => (rest, ""),
        };
        let type_hint = TypeHint::parse(hint).map_err(|e| match e {
            Error::SuffixParse { msg, .. } => Error::SuffixParse {
                suffix: suffix.to_string(),
                msg,
            },
            other => other,
        })?;
        out.push(RendererSpec {
            name: name.to_string(),
            patch,
            type_hint,
        });
    }
    Ok(out)
}

/// Canonical text of a chain.
pub fn format_renderers(renderers: &[RendererSpec]) -> String {
    renderers
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("|")
}
