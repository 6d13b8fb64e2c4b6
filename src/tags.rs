//! YAML core-schema tags in their short (`!!int`) form, plus the `!rs:` directive tags.

pub(crate) const TAG_PREFIX_CORE: &str = "tag:yaml.org,2002:";

pub const TAG_STR: &str = "!!str";
pub const TAG_INT: &str = "!!int";
pub const TAG_FLOAT: &str = "!!float";
pub const TAG_BOOL: &str = "!!bool";
pub const TAG_NULL: &str = "!!null";
pub const TAG_BINARY: &str = "!!binary";
pub const TAG_MERGE: &str = "!!merge";
pub const TAG_SEQ: &str = "!!seq";
pub const TAG_MAP: &str = "!!map";
pub const TAG_TIMESTAMP: &str = "!!timestamp";

/// Tag prefixes that carry a rendering suffix instead of a type.
pub(crate) const RS_TAG_PREFIXES: &[&str] = &["!rs:", "!tag:arhat.dev/rs:", "tag:arhat.dev/rs:"];

/// Normalize a parser tag (handle + suffix) into the short form stored on nodes.
///
/// `tag:yaml.org,2002:int` and the shorthand `!int` style aliases all collapse to `!!int`;
/// application tags are kept as written.
pub(crate) fn normalize_tag(handle: &str, suffix: &str) -> String {
    if handle == TAG_PREFIX_CORE || handle == "!!" {
        let suffix = suffix.strip_prefix('!').unwrap_or(suffix);
        return format!("!!{suffix}");
    }
    if handle.is_empty() {
        if let Some(rest) = suffix.strip_prefix(TAG_PREFIX_CORE) {
            let rest = rest.strip_prefix('!').unwrap_or(rest);
            return format!("!!{rest}");
        }
    }
    format!("{handle}{suffix}")
}

/// Return the rendering suffix carried by an `!rs:<suffix>` style tag.
pub(crate) fn rs_tag_suffix(tag: &str) -> Option<&str> {
    RS_TAG_PREFIXES
        .iter()
        .find_map(|prefix| tag.strip_prefix(prefix))
}

/// Tags that prevent a scalar from being read as a string.
pub(crate) fn can_parse_into_string(tag: &str) -> bool {
    !matches!(
        tag,
        TAG_INT | TAG_FLOAT | TAG_BOOL | TAG_NULL | TAG_SEQ | TAG_MAP | TAG_TIMESTAMP
    )
}

pub(crate) fn is_null_tag(tag: &str) -> bool {
    tag == TAG_NULL
}

pub(crate) fn is_binary_tag(tag: &str) -> bool {
    tag == TAG_BINARY
}
