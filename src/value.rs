//! Dynamic values exchanged with rendering handlers.
//!
//! The raw data of an unresolved entry reaches the first renderer as [`Value::Node`], so handlers
//! see the original lexeme and tags. Handlers may answer with any variant; the pipeline turns the
//! final value back into a `Node` for assignment.

use std::fmt;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

use crate::base64::{decode_base64_yaml, encode_base64};
use crate::emit::emit;
use crate::error::Error;
use crate::node::{Node, NodeKind, ScalarStyle, key_text, merge_pairs, prepare};
use crate::parse_scalars::{
    format_float, parse_int_signed, parse_int_unsigned, parse_yaml12_bool, parse_yaml12_f64,
    resolve_plain_tag,
};
use crate::tags::{TAG_BOOL, TAG_FLOAT, TAG_INT, TAG_NULL, is_binary_tag};

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    Map(IndexMap<String, Value>),
    /// Untouched YAML node, typically the raw data of an unresolved entry.
    Node(Node),
}

impl Value {
    /// Decode a node per the YAML 1.2 core schema; merge keys are flattened.
    pub fn from_node(node: &Node) -> Result<Value, Error> {
        let Some(n) = prepare(node) else {
            return Ok(Value::Null);
        };
        match n.kind {
            NodeKind::Sequence => n
                .children
                .iter()
                .map(Value::from_node)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Seq),
            NodeKind::Mapping => {
                let mut map = IndexMap::new();
                for (k, v) in merge_pairs(n)? {
                    let key = match key_text(k) {
                        Some(text) => text,
                        None => emit(k).trim_end().to_string(),
                    };
                    map.insert(key, Value::from_node(v)?);
                }
                Ok(Value::Map(map))
            }
            _ => scalar_value(n),
        }
    }

    /// Build a node; strings are tagged `!!str` so they never change type on the way back.
    pub fn into_node(self) -> Node {
        match self {
            Value::Null => Node::null(),
            Value::Bool(b) => Node::tagged_scalar(TAG_BOOL, if b { "true" } else { "false" }),
            Value::Int(i) => Node::tagged_scalar(TAG_INT, i.to_string()),
            Value::Uint(u) => Node::tagged_scalar(TAG_INT, u.to_string()),
            Value::Float(f) => Node::tagged_scalar(TAG_FLOAT, format_float(f)),
            Value::Str(s) => Node::string(s),
            Value::Bytes(b) => Node::tagged_scalar(crate::tags::TAG_BINARY, encode_base64(&b)),
            Value::Seq(items) => Node::sequence(items.into_iter().map(Value::into_node).collect()),
            Value::Map(map) => {
                Node::mapping(map.into_iter().map(|(k, v)| (Node::scalar(k), v.into_node())))
            }
            Value::Node(n) => n,
        }
    }

    /// Expand a `Value::Node` into plain data; other variants are returned as they are.
    pub fn decoded(self) -> Result<Value, Error> {
        match self {
            Value::Node(n) => Value::from_node(&n),
            other => Ok(other),
        }
    }

    /// Convert to JSON. Bytes become base64 strings and non-finite floats their YAML spelling.
    pub fn to_json(&self) -> Result<serde_json::Value, Error> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Uint(u) => serde_json::Value::from(*u),
            Value::Float(f) => match serde_json::Number::from_f64(*f) {
                Some(n) => serde_json::Value::Number(n),
                None => serde_json::Value::String(format_float(*f)),
            },
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => serde_json::Value::String(encode_base64(b)),
            Value::Seq(items) => serde_json::Value::Array(
                items.iter().map(Value::to_json).collect::<Result<_, _>>()?,
            ),
            Value::Map(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json()?);
                }
                serde_json::Value::Object(out)
            }
            Value::Node(n) => Value::from_node(n)?.to_json()?,
        })
    }

    pub fn from_json(json: serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Value::Uint(u)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Seq(items.into_iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Node(n) => crate::node::is_empty(n),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Short name of the variant for error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) | Value::Uint(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Seq(_) => "sequence",
            Value::Map(_) => "mapping",
            Value::Node(_) => "node",
        }
    }
}

fn scalar_value(n: &Node) -> Result<Value, Error> {
    if is_binary_tag(&n.tag) {
        let data = decode_base64_yaml(&n.value).map_err(|e| e.with_location(n.location))?;
        return Ok(Value::Bytes(data));
    }
    let tag = if n.tag.is_empty() {
        if n.style != ScalarStyle::Plain {
            return Ok(Value::Str(n.value.clone()));
        }
        resolve_plain_tag(&n.value)
    } else {
        n.tag.as_str()
    };
    Ok(match tag {
        TAG_NULL => Value::Null,
        TAG_BOOL => match parse_yaml12_bool(n.value.trim()) {
            Some(b) => Value::Bool(b),
            None => Value::Bool(
                crate::parse_scalars::parse_yaml11_bool(&n.value)
                    .map_err(|msg| Error::msg(msg).with_location(n.location))?,
            ),
        },
        TAG_INT => {
            let t = n.value.trim();
            match parse_int_signed::<i64>(t, "int", n.location) {
                Ok(i) => Value::Int(i),
                Err(_) => Value::Uint(parse_int_unsigned::<u64>(t, "int", n.location)?),
            }
        }
        TAG_FLOAT => Value::Float(parse_yaml12_f64(&n.value, n.location)?),
        _ => Value::Str(n.value.clone()),
    })
}

impl fmt::Display for Value {
    /// Scalars print their canonical text; containers print as YAML.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Uint(u) => write!(f, "{u}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Str(s) => f.write_str(s),
            Value::Bytes(b) => f.write_str(&String::from_utf8_lossy(b)),
            Value::Node(n) if n.is_scalar() => f.write_str(&n.value),
            other => f.write_str(emit(&other.clone().into_node()).trim_end()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => s.serialize_unit(),
            Value::Bool(b) => s.serialize_bool(*b),
            Value::Int(i) => s.serialize_i64(*i),
            Value::Uint(u) => s.serialize_u64(*u),
            Value::Float(v) => s.serialize_f64(*v),
            Value::Str(v) => s.serialize_str(v),
            Value::Bytes(b) => s.serialize_bytes(b),
            Value::Seq(items) => {
                let mut seq = s.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut m = s.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    m.serialize_entry(k, v)?;
                }
                m.end()
            }
            Value::Node(n) => Value::from_node(n)
                .map_err(serde::ser::Error::custom)?
                .serialize(s),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Uint(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Seq(v)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(v: IndexMap<String, Value>) -> Self {
        Value::Map(v)
    }
}

impl From<Node> for Value {
    fn from(v: Node) -> Self {
        Value::Node(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::from_json(v)
    }
}
