//! YAML node tree.
//!
//! A `Node` is what the composer builds from parser events and what every other part of the crate
//! consumes: unresolved entries keep their raw `Node`, the resolver feeds rendered values back as
//! `Node`s, and the marshaler produces a `Node` before emitting text.
//!
//! Mapping children are stored flat as `[k0, v0, k1, v1, ...]`; use [`Node::pairs`] to walk them.

use std::collections::HashSet;

use crate::error::{Error, Location};
use crate::parse_scalars::resolve_plain_tag;
use crate::tags::{TAG_MAP, TAG_MERGE, TAG_NULL, TAG_SEQ, TAG_STR};

/// Kind of a YAML node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum NodeKind {
    /// Document wrapper; holds zero (empty document) or one child.
    Document,
    Sequence,
    Mapping,
    #[default]
    Scalar,
    /// Alias; `alias` points at a copy of the anchored node.
    Alias,
}

/// Presentation style of a scalar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScalarStyle {
    #[default]
    Plain,
    SingleQuoted,
    DoubleQuoted,
    Literal,
    Folded,
}

impl From<saphyr_parser::ScalarStyle> for ScalarStyle {
    fn from(style: saphyr_parser::ScalarStyle) -> Self {
        match style {
            saphyr_parser::ScalarStyle::Plain => ScalarStyle::Plain,
            saphyr_parser::ScalarStyle::SingleQuoted => ScalarStyle::SingleQuoted,
            saphyr_parser::ScalarStyle::DoubleQuoted => ScalarStyle::DoubleQuoted,
            saphyr_parser::ScalarStyle::Literal => ScalarStyle::Literal,
            saphyr_parser::ScalarStyle::Folded => ScalarStyle::Folded,
        }
    }
}

/// A node of the YAML tree.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    /// Explicit tag in short form (`!!int`, `!rs:echo`), empty when the tag is implicit.
    pub tag: String,
    /// Scalar text; empty for containers.
    pub value: String,
    pub style: ScalarStyle,
    /// Parser anchor id, 0 when not anchored.
    pub anchor: usize,
    pub children: Vec<Node>,
    pub alias: Option<Box<Node>>,
    pub location: Location,
}

impl Node {
    /// Plain scalar with implicit tag.
    pub fn scalar(value: impl Into<String>) -> Self {
        Node {
            kind: NodeKind::Scalar,
            value: value.into(),
            ..Node::default()
        }
    }

    /// Scalar with an explicit tag.
    pub fn tagged_scalar(tag: &str, value: impl Into<String>) -> Self {
        Node {
            kind: NodeKind::Scalar,
            tag: tag.to_string(),
            value: value.into(),
            ..Node::default()
        }
    }

    /// String scalar; the value stays a string whatever it looks like.
    pub fn string(value: impl Into<String>) -> Self {
        Node::tagged_scalar(TAG_STR, value)
    }

    /// Explicit null.
    pub fn null() -> Self {
        Node::tagged_scalar(TAG_NULL, "null")
    }

    pub fn sequence(items: Vec<Node>) -> Self {
        Node {
            kind: NodeKind::Sequence,
            children: items,
            ..Node::default()
        }
    }

    /// Mapping from ordered `(key, value)` pairs.
    pub fn mapping(pairs: impl IntoIterator<Item = (Node, Node)>) -> Self {
        let mut children = Vec::new();
        for (k, v) in pairs {
            children.push(k);
            children.push(v);
        }
        Node {
            kind: NodeKind::Mapping,
            children,
            ..Node::default()
        }
    }

    /// One-entry mapping `{key: value}`.
    pub fn single_entry(key: &str, value: Node) -> Self {
        Node::mapping([(Node::scalar(key), value)])
    }

    pub fn document(root: Option<Node>) -> Self {
        Node {
            kind: NodeKind::Document,
            children: root.into_iter().collect(),
            ..Node::default()
        }
    }

    pub fn is_scalar(&self) -> bool {
        self.kind == NodeKind::Scalar
    }

    pub fn is_mapping(&self) -> bool {
        self.kind == NodeKind::Mapping
    }

    pub fn is_sequence(&self) -> bool {
        self.kind == NodeKind::Sequence
    }

    /// Iterate `(key, value)` pairs of a mapping node as written (no merge expansion).
    pub fn pairs(&self) -> impl Iterator<Item = (&Node, &Node)> {
        self.children.chunks_exact(2).map(|kv| (&kv[0], &kv[1]))
    }

    /// Push a pair onto a mapping node.
    pub fn push_pair(&mut self, key: Node, value: Node) {
        self.children.push(key);
        self.children.push(value);
    }

    /// Resolved short tag: the explicit tag, or the implicit one for untagged nodes.
    pub fn short_tag(&self) -> String {
        if !self.tag.is_empty() {
            return self.tag.clone();
        }
        match self.kind {
            NodeKind::Mapping => TAG_MAP.to_string(),
            NodeKind::Sequence => TAG_SEQ.to_string(),
            NodeKind::Alias => match &self.alias {
                Some(target) => target.short_tag(),
                None => TAG_NULL.to_string(),
            },
            NodeKind::Document => match self.children.first() {
                Some(root) if self.children.len() == 1 => root.short_tag(),
                _ => TAG_NULL.to_string(),
            },
            NodeKind::Scalar => {
                if self.style == ScalarStyle::Plain {
                    resolve_plain_tag(&self.value).to_string()
                } else {
                    TAG_STR.to_string()
                }
            }
        }
    }

    /// Short human description used in shape errors.
    pub(crate) fn describe(&self) -> String {
        match self.kind {
            NodeKind::Document => "document".to_string(),
            NodeKind::Sequence => "sequence".to_string(),
            NodeKind::Mapping => "mapping".to_string(),
            NodeKind::Alias => "alias".to_string(),
            NodeKind::Scalar => format!("scalar `{}`", self.value),
        }
    }

    /// Copy of this node without its explicit tag.
    pub(crate) fn without_tag(&self) -> Node {
        Node {
            tag: String::new(),
            ..self.clone()
        }
    }
}

/// Peel document and alias wrappers down to the first data node.
///
/// Returns `None` for empty documents and documents holding more than one node.
pub fn prepare(node: &Node) -> Option<&Node> {
    match node.kind {
        NodeKind::Document => {
            if node.children.len() != 1 {
                return None;
            }
            prepare(&node.children[0])
        }
        NodeKind::Alias => node.alias.as_deref().and_then(prepare),
        _ => Some(node),
    }
}

/// True for null scalars, untyped empty scalars, and empty (or overlarge) documents.
pub fn is_empty(node: &Node) -> bool {
    match prepare(node) {
        None => true,
        Some(n) => {
            n.kind == NodeKind::Scalar
                && ((n.tag.is_empty() && n.style == ScalarStyle::Plain && n.short_tag() == TAG_NULL)
                    || n.tag == TAG_NULL)
        }
    }
}

/// True when `key` is the YAML merge key `<<`.
pub fn is_merge(key: &Node) -> bool {
    let Some(key) = prepare(key) else {
        return false;
    };
    key.kind == NodeKind::Scalar
        && ((key.tag.is_empty() && key.style == ScalarStyle::Plain && key.value == "<<")
            || key.tag == TAG_MERGE)
}

/// Flatten a mapping into one level of `(key, value)` pairs.
///
/// Explicit pairs come first in document order; pairs brought in by `<<` follow, skipping keys that
/// an explicit pair or an earlier merge source already defined. A sequence of merge sources is
/// applied first-to-last, so the first source wins.
pub fn merge_pairs(mapping: &Node) -> Result<Vec<(&Node, &Node)>, Error> {
    let mapping = prepare(mapping).ok_or_else(|| Error::shape("mapping", "empty document"))?;
    if mapping.kind != NodeKind::Mapping {
        return Err(Error::shape("mapping", mapping.describe()).with_location(mapping.location));
    }

    let mut explicit = Vec::new();
    let mut merges = Vec::new();
    for (k, v) in mapping.pairs() {
        if is_merge(k) {
            merges.push(v);
        } else {
            explicit.push((k, v));
        }
    }
    if merges.is_empty() {
        return Ok(explicit);
    }

    let mut seen: HashSet<String> = explicit.iter().filter_map(|(k, _)| key_text(k)).collect();
    let mut out = explicit;
    for merge in merges {
        let Some(source) = prepare(merge) else {
            continue;
        };
        match source.kind {
            NodeKind::Mapping => append_merged(&mut out, &mut seen, merge_pairs(source)?),
            NodeKind::Sequence => {
                for item in &source.children {
                    let item = prepare(item)
                        .ok_or_else(|| Error::shape("mapping in merge list", "empty node"))?;
                    if item.kind != NodeKind::Mapping {
                        return Err(Error::shape("mapping in merge list", item.describe())
                            .with_location(item.location));
                    }
                    append_merged(&mut out, &mut seen, merge_pairs(item)?);
                }
            }
            NodeKind::Scalar if is_empty(source) => {}
            _ => {
                return Err(Error::shape(
                    "mapping or sequence of mappings as merge value",
                    source.describe(),
                )
                .with_location(source.location));
            }
        }
    }
    Ok(out)
}

fn append_merged<'a>(
    out: &mut Vec<(&'a Node, &'a Node)>,
    seen: &mut HashSet<String>,
    pairs: Vec<(&'a Node, &'a Node)>,
) {
    for (k, v) in pairs {
        match key_text(k) {
            Some(text) => {
                if seen.insert(text) {
                    out.push((k, v));
                }
            }
            None => out.push((k, v)),
        }
    }
}

/// Text of a scalar key (after alias resolution).
pub(crate) fn key_text(key: &Node) -> Option<String> {
    let key = prepare(key)?;
    if key.kind == NodeKind::Scalar {
        Some(key.value.clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::parse;

    #[test]
    fn prepare_peels_documents_and_aliases() {
        let doc = parse("a: &x 1\nb: *x\n").unwrap();
        let root = prepare(&doc).unwrap();
        assert!(root.is_mapping());
        let b = &root.children[3];
        assert_eq!(b.kind, NodeKind::Alias);
        assert_eq!(prepare(b).unwrap().value, "1");
    }

    #[test]
    fn empty_documents_and_nulls() {
        assert!(is_empty(&parse("").unwrap()));
        assert!(is_empty(&parse("# only a comment\n").unwrap()));
        assert!(is_empty(&Node::scalar("~")));
        assert!(is_empty(&Node::null()));
        assert!(!is_empty(&Node::string("")));
        assert!(!is_empty(&Node::scalar("0")));
    }

    #[test]
    fn merge_key_detection() {
        assert!(is_merge(&Node::scalar("<<")));
        assert!(is_merge(&Node::tagged_scalar(TAG_MERGE, "x")));
        assert!(!is_merge(&Node::string("<<")));
    }

    #[test]
    fn explicit_keys_win_over_merged_ones() {
        let doc = parse("base: &b { a: 1, b: 2 }\nt:\n  <<: *b\n  b: 3\n").unwrap();
        let root = prepare(&doc).unwrap();
        let t = &root.children[3];
        let pairs = merge_pairs(t).unwrap();
        let flat: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.value.clone(), prepare(v).unwrap().value.clone()))
            .collect();
        assert_eq!(
            flat,
            vec![("b".into(), "3".into()), ("a".into(), "1".into())]
        );
    }

    #[test]
    fn first_merge_source_wins() {
        let doc = parse("x: &x { k: 1 }\ny: &y { k: 2, j: 3 }\nt:\n  <<: [*x, *y]\n").unwrap();
        let root = prepare(&doc).unwrap();
        let pairs = merge_pairs(&root.children[5]).unwrap();
        let k = pairs.iter().find(|(k, _)| k.value == "k").unwrap();
        assert_eq!(prepare(k.1).unwrap().value, "1");
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn scalar_merge_value_is_rejected() {
        let doc = parse("t:\n  <<: 5\n").unwrap();
        let root = prepare(&doc).unwrap();
        assert!(merge_pairs(&root.children[1]).is_err());
    }

    #[test]
    fn implicit_tags_follow_style() {
        assert_eq!(Node::scalar("12").short_tag(), "!!int");
        let quoted = Node {
            style: ScalarStyle::DoubleQuoted,
            ..Node::scalar("12")
        };
        assert_eq!(quoted.short_tag(), "!!str");
    }
}
