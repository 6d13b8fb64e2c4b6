//! Type hints (`?int`, `?[]obj`, ...) coerce a rendered value into one of a fixed set of shapes.

use std::fmt;

use indexmap::IndexMap;
use num_traits::ToPrimitive;

use crate::compose::parse;
use crate::emit::emit;
use crate::error::{Error, Location};
use crate::node::{NodeKind, prepare};
use crate::parse_scalars::{parse_int_signed, parse_int_unsigned, parse_yaml12_f64};
use crate::tags::is_binary_tag;
use crate::value::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TypeHint {
    /// No hint: strings holding a YAML container become that container.
    #[default]
    None,
    Str,
    Bytes,
    Object,
    ObjectList,
    Int,
    Uint,
    Float,
}

impl TypeHint {
    /// Parse a hint name as written after `?`; the empty name means no hint.
    pub fn parse(name: &str) -> Result<TypeHint, Error> {
        Ok(match name {
            "" => TypeHint::None,
            "str" => TypeHint::Str,
            "[]byte" => TypeHint::Bytes,
            "obj" => TypeHint::Object,
            "[]obj" => TypeHint::ObjectList,
            "int" => TypeHint::Int,
            "uint" => TypeHint::Uint,
            "float" => TypeHint::Float,
            other => {
                return Err(Error::SuffixParse {
                    suffix: format!("?{other}"),
                    msg: format!("unknown type hint `{other}`"),
                });
            }
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            TypeHint::None => "none",
            TypeHint::Str => "str",
            TypeHint::Bytes => "[]byte",
            TypeHint::Object => "obj",
            TypeHint::ObjectList => "[]obj",
            TypeHint::Int => "int",
            TypeHint::Uint => "uint",
            TypeHint::Float => "float",
        }
    }

    /// Coerce `value`; failures read `typehint.<name>: <cause>`.
    pub fn apply(&self, value: Value) -> Result<Value, Error> {
        let hint = self.name();
        match self {
            TypeHint::None => Ok(to_container_if_yaml(value)),
            TypeHint::Str => Ok(Value::Str(to_text(value, hint)?)),
            TypeHint::Bytes => match value {
                Value::Bytes(b) => Ok(Value::Bytes(b)),
                Value::Node(n) if n.is_scalar() && is_binary_tag(&n.tag) => {
                    Value::from_node(&n).map_err(|e| Error::type_hint(hint, e))
                }
                other => Ok(Value::Bytes(to_text(other, hint)?.into_bytes())),
            },
            TypeHint::Object => to_shape(value, NodeKind::Mapping, hint),
            TypeHint::ObjectList => to_shape(value, NodeKind::Sequence, hint),
            TypeHint::Int => to_int(value).map(Value::Int).map_err(|e| Error::type_hint(hint, e)),
            TypeHint::Uint => to_uint(value).map(Value::Uint).map_err(|e| Error::type_hint(hint, e)),
            TypeHint::Float => to_float(value).map(Value::Float).map_err(|e| Error::type_hint(hint, e)),
        }
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHint::None => Ok(()),
            other => f.write_str(other.name()),
        }
    }
}

/// Keep plain user strings as strings unless they hold a YAML mapping or sequence.
fn to_container_if_yaml(value: Value) -> Value {
    let text = match &value {
        Value::Str(s) => s.clone(),
        Value::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => s.to_string(),
            Err(_) => return value,
        },
        _ => return value,
    };
    match parse(&text) {
        Ok(doc) => match prepare(&doc) {
            Some(root) if matches!(root.kind, NodeKind::Mapping | NodeKind::Sequence) => {
                Value::Node(root.clone())
            }
            _ => value,
        },
        Err(_) => value,
    }
}

/// Canonical text: the raw lexeme of a source scalar, YAML text for containers.
fn to_text(value: Value, hint: &'static str) -> Result<String, Error> {
    Ok(match value {
        Value::Null => String::new(),
        Value::Str(s) => s,
        Value::Bytes(b) => String::from_utf8(b).map_err(|e| Error::type_hint(hint, e))?,
        Value::Node(n) => match prepare(&n) {
            None => String::new(),
            Some(s) if s.is_scalar() && is_binary_tag(&s.tag) => {
                return to_text(Value::from_node(s)?, hint);
            }
            Some(s) if s.is_scalar() => s.value.clone(),
            Some(_) => emit(&n),
        },
        Value::Seq(_) | Value::Map(_) => emit(&value.into_node()),
        scalar => scalar.to_string(),
    })
}

fn to_shape(value: Value, kind: NodeKind, hint: &'static str) -> Result<Value, Error> {
    let expected = if kind == NodeKind::Mapping { "mapping" } else { "sequence" };
    match value {
        Value::Null => Ok(Value::Null),
        Value::Map(_) if kind == NodeKind::Mapping => Ok(value),
        Value::Seq(_) if kind == NodeKind::Sequence => Ok(value),
        Value::Str(_) | Value::Bytes(_) => {
            let text = to_text(value, hint)?;
            let doc = parse(&text).map_err(|e| Error::type_hint(hint, e))?;
            match prepare(&doc) {
                None => Ok(empty_of(kind)),
                Some(root) if root.kind == kind => Ok(Value::Node(root.clone())),
                Some(root) => Err(Error::type_hint(
                    hint,
                    format!("expected {expected}, found {}", root.describe()),
                )),
            }
        }
        Value::Node(n) => match prepare(&n) {
            None => Ok(Value::Null),
            Some(root) if root.kind == kind => Ok(Value::Node(root.clone())),
            Some(root) if root.is_scalar() => to_shape(Value::Str(root.value.clone()), kind, hint),
            Some(root) => Err(Error::type_hint(
                hint,
                format!("expected {expected}, found {}", root.describe()),
            )),
        },
        other => Err(Error::type_hint(
            hint,
            format!("expected {expected}, found {}", other.kind_name()),
        )),
    }
}

fn empty_of(kind: NodeKind) -> Value {
    if kind == NodeKind::Mapping {
        Value::Map(IndexMap::new())
    } else {
        Value::Seq(Vec::new())
    }
}

/// Text of a scalar value, with one level of matching quotes removed.
fn numeric_text(value: Value) -> Result<String, String> {
    let text = match value {
        Value::Str(s) => s,
        Value::Bytes(b) => String::from_utf8(b).map_err(|e| e.to_string())?,
        Value::Node(n) => match prepare(&n) {
            Some(s) if s.is_scalar() => s.value.clone(),
            Some(s) => return Err(format!("cannot convert {} to a number", s.describe())),
            None => return Err("cannot convert null to a number".to_string()),
        },
        other => return Err(format!("cannot convert {} to a number", other.kind_name())),
    };
    let t = text.trim();
    for q in ['"', '\''] {
        if t.len() >= 2 && t.starts_with(q) && t.ends_with(q) {
            return Ok(t[1..t.len() - 1].to_string());
        }
    }
    Ok(t.to_string())
}

fn float_to_integral(f: f64) -> Result<f64, String> {
    if f.fract() != 0.0 || !f.is_finite() {
        return Err(format!("{f} is not an integer"));
    }
    Ok(f)
}

fn to_int(value: Value) -> Result<i64, String> {
    match value {
        Value::Int(i) => Ok(i),
        Value::Uint(u) => u.to_i64().ok_or_else(|| format!("{u} overflows int")),
        Value::Float(f) => float_to_integral(f)?
            .to_i64()
            .ok_or_else(|| format!("{f} overflows int")),
        other => {
            let text = numeric_text(other)?;
            match parse_int_signed::<i64>(&text, "int", Location::UNKNOWN) {
                Ok(i) => Ok(i),
                Err(e) => match parse_yaml12_f64(&text, Location::UNKNOWN) {
                    Ok(f) => float_to_integral(f)?
                        .to_i64()
                        .ok_or_else(|| format!("{text} overflows int")),
                    Err(_) => Err(e.to_string()),
                },
            }
        }
    }
}

fn to_uint(value: Value) -> Result<u64, String> {
    match value {
        Value::Uint(u) => Ok(u),
        Value::Int(i) => i.to_u64().ok_or_else(|| format!("{i} is negative")),
        Value::Float(f) => float_to_integral(f)?
            .to_u64()
            .ok_or_else(|| format!("{f} overflows uint")),
        other => {
            let text = numeric_text(other)?;
            match parse_int_unsigned::<u64>(&text, "uint", Location::UNKNOWN) {
                Ok(u) => Ok(u),
                Err(e) => match parse_yaml12_f64(&text, Location::UNKNOWN) {
                    Ok(f) => float_to_integral(f)?
                        .to_u64()
                        .ok_or_else(|| format!("{text} overflows uint")),
                    Err(_) => Err(e.to_string()),
                },
            }
        }
    }
}

fn to_float(value: Value) -> Result<f64, String> {
    match value {
        Value::Float(f) => Ok(f),
        Value::Int(i) => i.to_f64().ok_or_else(|| format!("{i} overflows float")),
        Value::Uint(u) => u.to_f64().ok_or_else(|| format!("{u} overflows float")),
        other => {
            let text = numeric_text(other)?;
            parse_yaml12_f64(&text, Location::UNKNOWN).map_err(|e| e.to_string())
        }
    }
}
