//! Serde `Deserializer` over a composed `Node` tree.
//!
//! This is the decode path for slots that do not take part in suffix handling: plain
//! `Deserialize` types wrapped in [`crate::Plain`], and the leaves of registered structs. Merge
//! keys are flattened, aliases followed, and duplicate keys rejected.

use std::collections::HashSet;

use serde::de::{self, DeserializeOwned, IntoDeserializer, Visitor};

use crate::base64::decode_base64_yaml;
use crate::error::{Error, Location};
use crate::node::{Node, NodeKind, ScalarStyle, key_text, merge_pairs, prepare};
use crate::parse_scalars::{
    parse_int_signed, parse_int_unsigned, parse_yaml11_bool, parse_yaml12_bool, parse_yaml12_f64,
    resolve_plain_tag, scalar_is_nullish,
};
use crate::tags::{
    TAG_BOOL, TAG_FLOAT, TAG_INT, can_parse_into_string, is_binary_tag, is_null_tag,
};

/// Decode a node into any owned `Deserialize` type.
pub fn decode<T: DeserializeOwned>(node: &Node) -> Result<T, Error> {
    T::deserialize(NodeDeserializer::new(node))
}

/// Deserializer borrowing one node; document and alias wrappers are peeled on construction.
pub(crate) struct NodeDeserializer<'a> {
    /// `None` stands for an empty document.
    node: Option<&'a Node>,
    location: Location,
}

impl<'a> NodeDeserializer<'a> {
    pub(crate) fn new(node: &'a Node) -> Self {
        Self {
            node: prepare(node),
            location: node.location,
        }
    }

    fn is_null(&self) -> bool {
        match self.node {
            None => true,
            Some(n) => {
                n.kind == NodeKind::Scalar
                    && (is_null_tag(&n.tag)
                        || (n.tag.is_empty() && scalar_is_nullish(&n.value, n.style)))
            }
        }
    }

    fn scalar(&self, expected: &'static str) -> Result<&'a Node, Error> {
        match self.node {
            Some(n) if n.kind == NodeKind::Scalar => Ok(n),
            Some(n) => Err(Error::shape(expected, n.describe()).with_location(n.location)),
            None => Err(Error::shape(expected, "empty document").with_location(self.location)),
        }
    }

    /// Scalar text as a string, decoding `!!binary` into UTF-8 text.
    fn string_value(&self) -> Result<String, Error> {
        let n = self.scalar("string scalar")?;
        if is_binary_tag(&n.tag) {
            let data = decode_base64_yaml(&n.value).map_err(|e| e.with_location(n.location))?;
            return String::from_utf8(data).map_err(|_| {
                Error::msg("!!binary scalar is not valid UTF-8").with_location(n.location)
            });
        }
        if !n.tag.is_empty() && !can_parse_into_string(&n.tag) {
            return Err(Error::msg(format!(
                "cannot deserialize scalar tagged {} into string",
                n.tag
            ))
            .with_location(n.location));
        }
        Ok(n.value.clone())
    }
}

macro_rules! deserialize_signed {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            let n = self.scalar(stringify!($ty))?;
            let v: $ty = parse_int_signed(&n.value, stringify!($ty), n.location)?;
            visitor.$visit(v)
        }
    };
}

macro_rules! deserialize_unsigned {
    ($method:ident, $visit:ident, $ty:ty) => {
        fn $method<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
            let n = self.scalar(stringify!($ty))?;
            let v: $ty = parse_int_unsigned(&n.value, stringify!($ty), n.location)?;
            visitor.$visit(v)
        }
    };
}

impl<'de, 'a> de::Deserializer<'de> for NodeDeserializer<'a> {
    type Error = Error;

    /// Typeless entry point (`serde_json::Value`, untagged enums, `IgnoredAny`).
    ///
    /// Plain untagged scalars resolve per the YAML 1.2 core schema (null, bool, int, float, then
    /// string). Quoted scalars are strings. Explicit core tags force their type; application tags
    /// such as `!rs:...` leave the text as a string.
    fn deserialize_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let Some(n) = self.node else {
            // typeless positions treat an empty document as null
            return visitor.visit_unit();
        };
        match n.kind {
            NodeKind::Sequence => return self.deserialize_seq(visitor),
            NodeKind::Mapping => return self.deserialize_map(visitor),
            _ => {}
        }
        if self.is_null() {
            return visitor.visit_unit();
        }
        if is_binary_tag(&n.tag) {
            let data = decode_base64_yaml(&n.value).map_err(|e| e.with_location(n.location))?;
            return match String::from_utf8(data) {
                Ok(text) => visitor.visit_string(text),
                Err(e) => visitor.visit_byte_buf(e.into_bytes()),
            };
        }
        let tag = if n.tag.is_empty() {
            if n.style != ScalarStyle::Plain {
                return visitor.visit_string(n.value.clone());
            }
            resolve_plain_tag(&n.value)
        } else {
            n.tag.as_str()
        };
        match tag {
            TAG_BOOL => {
                let b = match parse_yaml12_bool(n.value.trim()) {
                    Some(b) => b,
                    None => parse_yaml11_bool(&n.value)
                        .map_err(|msg| Error::msg(msg).with_location(n.location))?,
                };
                visitor.visit_bool(b)
            }
            TAG_INT => {
                let t = n.value.trim();
                if !t.starts_with('-') {
                    if let Ok(v) = parse_int_unsigned::<u64>(t, "u64", n.location) {
                        return visitor.visit_u64(v);
                    }
                }
                let v = parse_int_signed::<i64>(t, "i64", n.location)?;
                visitor.visit_i64(v)
            }
            TAG_FLOAT => {
                let v = parse_yaml12_f64(&n.value, n.location)?;
                // typeless consumers such as serde_json::Value cannot hold non-finite floats
                if v.is_finite() {
                    visitor.visit_f64(v)
                } else {
                    visitor.visit_string(crate::parse_scalars::format_float(v))
                }
            }
            _ => visitor.visit_string(n.value.clone()),
        }
    }

    /// Booleans accept the YAML 1.1 spellings (`yes`, `on`, `n`, ...) when a bool is requested.
    fn deserialize_bool<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let n = self.scalar("bool")?;
        let b = parse_yaml11_bool(&n.value).map_err(|msg| Error::msg(msg).with_location(n.location))?;
        visitor.visit_bool(b)
    }

    deserialize_signed!(deserialize_i8, visit_i8, i8);
    deserialize_signed!(deserialize_i16, visit_i16, i16);
    deserialize_signed!(deserialize_i32, visit_i32, i32);
    deserialize_signed!(deserialize_i64, visit_i64, i64);
    deserialize_signed!(deserialize_i128, visit_i128, i128);
    deserialize_unsigned!(deserialize_u8, visit_u8, u8);
    deserialize_unsigned!(deserialize_u16, visit_u16, u16);
    deserialize_unsigned!(deserialize_u32, visit_u32, u32);
    deserialize_unsigned!(deserialize_u64, visit_u64, u64);
    deserialize_unsigned!(deserialize_u128, visit_u128, u128);

    fn deserialize_f32<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let n = self.scalar("f32")?;
        let v = parse_yaml12_f64(&n.value, n.location)?;
        if v.is_finite() && (v > f32::MAX as f64 || v < f32::MIN as f64) {
            return Err(Error::msg(format!("f32 overflow: `{}`", n.value)).with_location(n.location));
        }
        visitor.visit_f32(v as f32)
    }

    fn deserialize_f64<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let n = self.scalar("f64")?;
        visitor.visit_f64(parse_yaml12_f64(&n.value, n.location)?)
    }

    /// YAML null forms are rejected for `char`.
    fn deserialize_char<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        let n = self.scalar("char")?;
        if self.is_null() {
            return Err(Error::msg("invalid char: null not allowed").with_location(n.location));
        }
        let mut it = n.value.chars();
        match (it.next(), it.next()) {
            (Some(c), None) => visitor.visit_char(c),
            _ => Err(Error::msg("invalid char: expected a single Unicode scalar value")
                .with_location(n.location)),
        }
    }

    fn deserialize_str<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_string(visitor)
    }

    fn deserialize_string<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_string(self.string_value()?)
    }

    /// Bytes come from a `!!binary` scalar or a sequence of integers 0..=255.
    fn deserialize_bytes<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        match self.node {
            Some(n) if n.kind == NodeKind::Scalar && is_binary_tag(&n.tag) => {
                let data = decode_base64_yaml(&n.value).map_err(|e| e.with_location(n.location))?;
                visitor.visit_byte_buf(data)
            }
            Some(n) if n.kind == NodeKind::Sequence => {
                let mut out = Vec::with_capacity(n.children.len());
                for item in &n.children {
                    out.push(decode::<u8>(item)?);
                }
                visitor.visit_byte_buf(out)
            }
            Some(n) if n.kind == NodeKind::Scalar => {
                // untagged text is taken as its UTF-8 bytes
                visitor.visit_byte_buf(self.string_value()?.into_bytes())
            }
            Some(n) => Err(Error::shape("scalar (!!binary) or sequence of 0..=255", n.describe())
                .with_location(n.location)),
            None => Err(Error::shape("bytes", "empty document").with_location(self.location)),
        }
    }

    fn deserialize_byte_buf<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_bytes(visitor)
    }

    fn deserialize_option<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.is_null() {
            visitor.visit_none()
        } else {
            visitor.visit_some(self)
        }
    }

    fn deserialize_unit<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.is_null() {
            return visitor.visit_unit();
        }
        let n = self.scalar("unit")?;
        Err(Error::msg("unexpected value for unit").with_location(n.location))
    }

    /// An empty mapping `{}` is accepted as a unit struct too.
    fn deserialize_unit_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.node {
            Some(n) if n.kind == NodeKind::Mapping => {
                if n.children.is_empty() {
                    visitor.visit_unit()
                } else {
                    Err(Error::msg("expected empty mapping for unit struct").with_location(n.location))
                }
            }
            _ => self.deserialize_unit(visitor),
        }
    }

    fn deserialize_newtype_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        visitor.visit_newtype_struct(self)
    }

    /// Null-like scalars read as an empty sequence; `!!binary` reads as a sequence of bytes.
    fn deserialize_seq<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.is_null() {
            return visitor.visit_seq(NodeSeq { items: [].iter() });
        }
        match self.node {
            Some(n) if n.kind == NodeKind::Sequence => visitor.visit_seq(NodeSeq {
                items: n.children.iter(),
            }),
            Some(n) if n.kind == NodeKind::Scalar && is_binary_tag(&n.tag) => {
                let data = decode_base64_yaml(&n.value).map_err(|e| e.with_location(n.location))?;
                visitor.visit_seq(de::value::SeqDeserializer::<_, Error>::new(data.into_iter()))
            }
            Some(n) => Err(Error::shape("sequence", n.describe()).with_location(n.location)),
            None => Err(Error::shape("sequence", "empty document").with_location(self.location)),
        }
    }

    fn deserialize_tuple<V: Visitor<'de>>(
        self,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_seq(visitor)
    }

    /// Mappings are flattened with merge keys first; a repeated key is an error.
    fn deserialize_map<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        if self.is_null() {
            return visitor.visit_map(NodeMap {
                pairs: Vec::new().into_iter(),
                value: None,
            });
        }
        let n = match self.node {
            Some(n) if n.kind == NodeKind::Mapping => n,
            Some(n) => return Err(Error::shape("mapping", n.describe()).with_location(n.location)),
            None => {
                return Err(Error::shape("mapping", "empty document").with_location(self.location));
            }
        };
        let pairs = merge_pairs(n)?;
        let mut seen = HashSet::with_capacity(pairs.len());
        for (k, _) in &pairs {
            if let Some(text) = key_text(k) {
                if !seen.insert(text.clone()) {
                    return Err(Error::DuplicateField {
                        key: text,
                        location: k.location,
                    });
                }
            }
        }
        visitor.visit_map(NodeMap {
            pairs: pairs.into_iter(),
            value: None,
        })
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        self.deserialize_map(visitor)
    }

    /// Externally tagged enums: `Variant` or `{ Variant: payload }`.
    fn deserialize_enum<V: Visitor<'de>>(
        self,
        _name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Self::Error> {
        match self.node {
            Some(n) if n.kind == NodeKind::Scalar => visitor.visit_enum(NodeEnum {
                variant: n.value.clone(),
                payload: None,
            }),
            Some(n) if n.kind == NodeKind::Mapping => {
                let pairs = merge_pairs(n)?;
                if pairs.len() != 1 {
                    return Err(Error::msg("externally tagged enum expects a single-key mapping")
                        .with_location(n.location));
                }
                let (k, v) = pairs[0];
                let variant = key_text(k).ok_or_else(|| {
                    Error::msg("expected string key for externally tagged enum")
                        .with_location(k.location)
                })?;
                visitor.visit_enum(NodeEnum {
                    variant,
                    payload: Some(v),
                })
            }
            Some(n) => Err(Error::msg("externally tagged enum expected scalar or mapping")
                .with_location(n.location)),
            None => Err(Error::shape("enum", "empty document").with_location(self.location)),
        }
    }

    fn deserialize_identifier<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        self.deserialize_str(visitor)
    }

    fn deserialize_ignored_any<V: Visitor<'de>>(self, visitor: V) -> Result<V::Value, Self::Error> {
        visitor.visit_unit()
    }
}

struct NodeSeq<'a> {
    items: std::slice::Iter<'a, Node>,
}

impl<'de, 'a> de::SeqAccess<'de> for NodeSeq<'a> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Error>
    where
        T: de::DeserializeSeed<'de>,
    {
        match self.items.next() {
            Some(item) => seed.deserialize(NodeDeserializer::new(item)).map(Some),
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.items.len())
    }
}

struct NodeMap<'a> {
    pairs: std::vec::IntoIter<(&'a Node, &'a Node)>,
    value: Option<&'a Node>,
}

impl<'de, 'a> de::MapAccess<'de> for NodeMap<'a> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Error>
    where
        K: de::DeserializeSeed<'de>,
    {
        match self.pairs.next() {
            Some((k, v)) => {
                self.value = Some(v);
                seed.deserialize(NodeDeserializer::new(k)).map(Some)
            }
            None => Ok(None),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        let value = self
            .value
            .take()
            .ok_or_else(|| Error::msg("mapping value requested before its key"))?;
        seed.deserialize(NodeDeserializer::new(value))
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.pairs.len())
    }
}

struct NodeEnum<'a> {
    variant: String,
    payload: Option<&'a Node>,
}

impl<'de, 'a> de::EnumAccess<'de> for NodeEnum<'a> {
    type Error = Error;
    type Variant = NodeVariant<'a>;

    fn variant_seed<V>(self, seed: V) -> Result<(V::Value, Self::Variant), Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        let v = seed.deserialize(self.variant.into_deserializer())?;
        Ok((
            v,
            NodeVariant {
                payload: self.payload,
            },
        ))
    }
}

struct NodeVariant<'a> {
    payload: Option<&'a Node>,
}

impl<'a> NodeVariant<'a> {
    fn payload(&self) -> Result<&'a Node, Error> {
        self.payload
            .ok_or_else(|| Error::msg("enum variant expects a value, found a bare name"))
    }
}

impl<'de, 'a> de::VariantAccess<'de> for NodeVariant<'a> {
    type Error = Error;

    fn unit_variant(self) -> Result<(), Error> {
        match self.payload {
            None => Ok(()),
            Some(p) if NodeDeserializer::new(p).is_null() => Ok(()),
            Some(p) => Err(Error::msg("unexpected value for unit enum variant").with_location(p.location)),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> Result<T::Value, Error>
    where
        T: de::DeserializeSeed<'de>,
    {
        seed.deserialize(NodeDeserializer::new(self.payload()?))
    }

    fn tuple_variant<V: Visitor<'de>>(self, len: usize, visitor: V) -> Result<V::Value, Error> {
        de::Deserializer::deserialize_tuple(NodeDeserializer::new(self.payload()?), len, visitor)
    }

    fn struct_variant<V: Visitor<'de>>(
        self,
        fields: &'static [&'static str],
        visitor: V,
    ) -> Result<V::Value, Error> {
        de::Deserializer::deserialize_struct(NodeDeserializer::new(self.payload()?), "", fields, visitor)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Deserialize;

    use super::*;
    use crate::compose::parse;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Point {
        x: i32,
        y: Option<f64>,
        #[serde(default)]
        label: String,
    }

    #[derive(Debug, Deserialize, PartialEq)]
    enum Shape {
        Dot,
        Circle(f64),
        Rect { w: u32, h: u32 },
    }

    #[test]
    fn structs_with_merge_keys() {
        let doc = parse("base: &b { x: 1, label: a }\np:\n  <<: *b\n  y: 2.5\n").unwrap();
        let all: BTreeMap<String, serde_json::Value> = decode(&doc).unwrap();
        assert_eq!(all.len(), 2);
        let p: Point = decode(&prepare(&doc).unwrap().children[3]).unwrap();
        assert_eq!(
            p,
            Point {
                x: 1,
                y: Some(2.5),
                label: "a".into()
            }
        );
    }

    #[test]
    fn enums_in_both_forms() {
        let v: Vec<Shape> = decode(&parse("- Dot\n- Circle: 1.5\n- Rect: { w: 2, h: 3 }\n").unwrap()).unwrap();
        assert_eq!(v, vec![Shape::Dot, Shape::Circle(1.5), Shape::Rect { w: 2, h: 3 }]);
    }

    #[test]
    fn typeless_values_follow_the_core_schema() {
        let v: serde_json::Value =
            decode(&parse("a: 0x10\nb: yes\nc: 'true'\nd: ~\ne: !!str 12\nf: .inf\n").unwrap()).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"a": 16, "b": "yes", "c": "true", "d": null, "e": "12", "f": ".inf"})
        );
    }

    #[test]
    fn binary_scalars() {
        let bytes: serde_bytes_like::Bytes = decode(&parse("!!binary aGVsbG8=").unwrap()).unwrap();
        assert_eq!(bytes.0, b"hello");
        let s: String = decode(&parse("!!binary aGVsbG8=").unwrap()).unwrap();
        assert_eq!(s, "hello");
    }

    #[test]
    fn duplicate_keys_are_rejected() {
        let err = decode::<BTreeMap<String, i32>>(&parse("a: 1\na: 2\n").unwrap()).unwrap_err();
        assert!(matches!(err, Error::DuplicateField { ref key, .. } if key == "a"));
    }

    #[test]
    fn yaml11_bools_for_typed_targets() {
        let v: Vec<bool> = decode(&parse("[yes, Off, true]").unwrap()).unwrap();
        assert_eq!(v, vec![true, false, true]);
    }

    #[test]
    fn null_forms() {
        let v: Option<i32> = decode(&parse("~").unwrap()).unwrap();
        assert_eq!(v, None);
        let empty: Vec<i32> = decode(&parse("").unwrap()).unwrap();
        assert!(empty.is_empty());
        assert!(decode::<char>(&parse("null").unwrap()).is_err());
    }

    mod serde_bytes_like {
        use serde::Deserialize;

        /// Byte buffer that asks the deserializer for bytes rather than a sequence.
        pub struct Bytes(pub Vec<u8>);

        impl<'de> Deserialize<'de> for Bytes {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                struct V;
                impl<'de> serde::de::Visitor<'de> for V {
                    type Value = Bytes;
                    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                        f.write_str("bytes")
                    }
                    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Bytes, E> {
                        Ok(Bytes(v))
                    }
                    fn visit_bytes<E>(self, v: &[u8]) -> Result<Bytes, E> {
                        Ok(Bytes(v.to_vec()))
                    }
                }
                d.deserialize_byte_buf(V)
            }
        }
    }
}
