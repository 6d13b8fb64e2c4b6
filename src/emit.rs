//! Block-style YAML emitter for `Node` trees.
//!
//! Output is meant to be read back by [`crate::compose::parse`]: strings that would otherwise be
//! resolved as another type are quoted, non-core tags are written out, aliases are expanded.

use std::fmt::Write;

use crate::node::{Node, NodeKind, ScalarStyle, prepare};
use crate::parse_scalars::resolve_plain_tag;
use crate::tags::{TAG_BOOL, TAG_FLOAT, TAG_INT, TAG_NULL, TAG_STR};

const INDENT: usize = 2;

/// Render a node as YAML text terminated by a newline.
pub fn emit(node: &Node) -> String {
    let mut out = String::new();
    match prepare(node) {
        None => out.push_str("null\n"),
        Some(n) => {
            if is_block_container(n) {
                write_block(&mut out, n, 0);
            } else {
                out.push_str(&inline_form(n));
                out.push('\n');
            }
        }
    }
    out
}

fn is_block_container(n: &Node) -> bool {
    matches!(n.kind, NodeKind::Mapping | NodeKind::Sequence) && !n.children.is_empty()
}

/// Write a non-empty mapping or sequence at `indent`, each entry on its own line.
fn write_block(out: &mut String, n: &Node, indent: usize) {
    let pad = " ".repeat(indent);
    match n.kind {
        NodeKind::Mapping => {
            for (k, v) in n.pairs() {
                let v = prepare(v).cloned().unwrap_or_else(Node::null);
                let _ = write!(out, "{pad}{}:", key_form(k));
                write_value(out, &v, indent, false);
            }
        }
        NodeKind::Sequence => {
            for item in &n.children {
                let item = prepare(item).cloned().unwrap_or_else(Node::null);
                let _ = write!(out, "{pad}-");
                write_value(out, &item, indent, true);
            }
        }
        _ => {
            let _ = writeln!(out, "{pad}{}", inline_form(n));
        }
    }
}

/// Write the value part after `key:` or `-`.
fn write_value(out: &mut String, v: &Node, indent: usize, in_sequence: bool) {
    let tag = explicit_tag(v);
    if is_block_container(v) {
        if let Some(tag) = &tag {
            let _ = write!(out, " {tag}");
        }
        if in_sequence && v.kind == NodeKind::Mapping && tag.is_none() {
            // `- key: value` compact form: first pair on the dash line
            let mut nested = String::new();
            write_block(&mut nested, v, indent + INDENT);
            out.push(' ');
            out.push_str(nested.trim_start());
        } else {
            out.push('\n');
            let child_indent = if v.kind == NodeKind::Sequence && !in_sequence {
                indent
            } else {
                indent + INDENT
            };
            write_block(out, v, child_indent);
        }
        return;
    }
    if v.kind == NodeKind::Scalar && v.value.contains('\n') && can_be_literal(v) {
        let head = match &tag {
            Some(tag) => format!(" {tag} |"),
            None => " |".to_string(),
        };
        out.push_str(&head);
        if v.value.ends_with('\n') {
            if v.value.ends_with("\n\n") {
                out.push('+');
            }
        } else {
            out.push('-');
        }
        out.push('\n');
        let pad = " ".repeat(indent + INDENT);
        for line in v.value.trim_end_matches('\n').split('\n') {
            if line.is_empty() {
                out.push('\n');
            } else {
                let _ = writeln!(out, "{pad}{line}");
            }
        }
        for _ in 1..v.value.len() - v.value.trim_end_matches('\n').len() {
            out.push('\n');
        }
        return;
    }
    let _ = writeln!(out, " {}", inline_form(v));
}

/// Literal blocks cannot carry leading spaces on the first line or trailing spaces/control chars.
fn can_be_literal(v: &Node) -> bool {
    let first = v.value.split('\n').next().unwrap_or_default();
    !first.starts_with(' ')
        && !v
            .value
            .chars()
            .any(|c| (c.is_control() && c != '\n') || c == '\u{feff}')
        && !v.value.lines().any(|l| l.ends_with(' '))
}

/// Tag to write in front of a node, `None` when the tag is implied by the text.
fn explicit_tag(n: &Node) -> Option<String> {
    if n.tag.is_empty() {
        return None;
    }
    match n.tag.as_str() {
        TAG_STR | TAG_INT | TAG_FLOAT | TAG_BOOL | TAG_NULL => None,
        "!!map" | "!!seq" => None,
        other => Some(other.to_string()),
    }
}

/// Single-line rendering of scalars and empty containers.
fn inline_form(n: &Node) -> String {
    match n.kind {
        NodeKind::Mapping => "{}".to_string(),
        NodeKind::Sequence => "[]".to_string(),
        NodeKind::Scalar => {
            let text = scalar_text(n);
            match explicit_tag(n) {
                Some(tag) => format!("{tag} {text}"),
                None => text,
            }
        }
        NodeKind::Alias | NodeKind::Document => match prepare(n) {
            Some(inner) => inline_form(inner),
            None => "null".to_string(),
        },
    }
}

fn scalar_text(n: &Node) -> String {
    let tag = n.short_tag();
    match tag.as_str() {
        TAG_NULL => {
            if n.style == ScalarStyle::Plain && n.tag.is_empty() && !n.value.is_empty() {
                n.value.clone()
            } else {
                "null".to_string()
            }
        }
        TAG_INT | TAG_FLOAT | TAG_BOOL => {
            if resolve_plain_tag(&n.value) == tag.as_str() {
                n.value.clone()
            } else {
                // explicit numeric tag on text that would not resolve implicitly
                quote_if_needed(&n.value)
            }
        }
        _ => {
            if n.style == ScalarStyle::Plain
                && n.tag.is_empty()
                && resolve_plain_tag(&n.value) == TAG_STR
                && is_plain_value_safe(&n.value)
            {
                n.value.clone()
            } else {
                quote_if_needed(&n.value)
            }
        }
    }
}

fn quote_if_needed(s: &str) -> String {
    if is_plain_value_safe(s) && resolve_plain_tag(s) == TAG_STR {
        s.to_string()
    } else {
        double_quoted(s)
    }
}

fn key_form(k: &Node) -> String {
    let k = prepare(k).cloned().unwrap_or_else(Node::null);
    if k.kind != NodeKind::Scalar {
        return double_quoted(&emit(&k).trim_end().replace('\n', " "));
    }
    if is_plain_safe(&k.value) && (resolve_plain_tag(&k.value) == TAG_STR || k.short_tag() != TAG_STR) {
        k.value.clone()
    } else {
        double_quoted(&k.value)
    }
}

pub(crate) fn double_quoted(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{:04X}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Returns true if `s` can be emitted as a plain key without quoting.
fn is_plain_safe(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    if s == "~"
        || s.eq_ignore_ascii_case("null")
        || s.eq_ignore_ascii_case("true")
        || s.eq_ignore_ascii_case("false")
        || s == "<<"
    {
        return false;
    }
    let bytes = s.as_bytes();
    if bytes[0].is_ascii_whitespace()
        || bytes[bytes.len() - 1].is_ascii_whitespace()
        || matches!(
            bytes[0],
            b'-' | b'?'
                | b':'
                | b'['
                | b']'
                | b'{'
                | b'}'
                | b'#'
                | b'&'
                | b'*'
                | b'!'
                | b'|'
                | b'>'
                | b'\''
                | b'"'
                | b'%'
                | b'@'
                | b'`'
                | b','
        )
    {
        return false;
    }
    if s.chars().any(|c| c.is_control()) {
        return false;
    }
    !(s.contains(": ") || s.ends_with(':') || s.contains(" #"))
}

/// Returns true if `s` can be emitted as a plain scalar in value position.
///
/// Stricter than keys: YAML 1.1 boolean spellings and anything flow-structural are quoted.
fn is_plain_value_safe(s: &str) -> bool {
    if !is_plain_safe(s) {
        return false;
    }
    if s.eq_ignore_ascii_case("y")
        || s.eq_ignore_ascii_case("yes")
        || s.eq_ignore_ascii_case("n")
        || s.eq_ignore_ascii_case("no")
        || s.eq_ignore_ascii_case("on")
        || s.eq_ignore_ascii_case("off")
    {
        return false;
    }
    !s.chars().any(|c| matches!(c, ',' | '[' | ']' | '{' | '}' | '#'))
}
