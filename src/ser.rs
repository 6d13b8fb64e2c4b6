//! Serde `Serializer` that builds a `Node` tree.
//!
//! Scalars carry their core tag so the emitter can decide on quoting: strings become `!!str`
//! nodes (quoted when they would read back as something else), numbers and booleans are plain,
//! `None` and unit are explicit nulls, byte buffers are `!!binary`. Enums use the externally
//! tagged form (`Variant` or `{ Variant: payload }`).

use serde::ser::{self, Serialize};

use crate::base64::encode_base64;
use crate::error::Error;
use crate::node::Node;
use crate::parse_scalars::format_float;
use crate::tags::{TAG_BINARY, TAG_BOOL, TAG_INT};

/// Serialize any `Serialize` value into a `Node`.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Node, Error> {
    value.serialize(NodeSerializer)
}

/// Stateless serializer; every call returns the finished node.
pub(crate) struct NodeSerializer;

fn int_node(v: impl ToString) -> Node {
    Node::tagged_scalar(TAG_INT, v.to_string())
}

impl ser::Serializer for NodeSerializer {
    type Ok = Node;
    type Error = Error;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantBuilder<SeqBuilder>;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantBuilder<MapBuilder>;

    fn serialize_bool(self, v: bool) -> Result<Node, Error> {
        Ok(Node::tagged_scalar(TAG_BOOL, if v { "true" } else { "false" }))
    }

    fn serialize_i8(self, v: i8) -> Result<Node, Error> {
        Ok(int_node(v))
    }

    fn serialize_i16(self, v: i16) -> Result<Node, Error> {
        Ok(int_node(v))
    }

    fn serialize_i32(self, v: i32) -> Result<Node, Error> {
        Ok(int_node(v))
    }

    fn serialize_i64(self, v: i64) -> Result<Node, Error> {
        Ok(int_node(v))
    }

    fn serialize_i128(self, v: i128) -> Result<Node, Error> {
        Ok(int_node(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Node, Error> {
        Ok(int_node(v))
    }

    fn serialize_u16(self, v: u16) -> Result<Node, Error> {
        Ok(int_node(v))
    }

    fn serialize_u32(self, v: u32) -> Result<Node, Error> {
        Ok(int_node(v))
    }

    fn serialize_u64(self, v: u64) -> Result<Node, Error> {
        Ok(int_node(v))
    }

    fn serialize_u128(self, v: u128) -> Result<Node, Error> {
        Ok(int_node(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Node, Error> {
        self.serialize_f64(v as f64)
    }

    fn serialize_f64(self, v: f64) -> Result<Node, Error> {
        Ok(Node::scalar(format_float(v)))
    }

    fn serialize_char(self, v: char) -> Result<Node, Error> {
        Ok(Node::string(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Node, Error> {
        Ok(Node::string(v))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Node, Error> {
        Ok(Node::tagged_scalar(TAG_BINARY, encode_base64(v)))
    }

    fn serialize_none(self) -> Result<Node, Error> {
        Ok(Node::null())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<Node, Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Node, Error> {
        Ok(Node::null())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Node, Error> {
        Ok(Node::null())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Node, Error> {
        Ok(Node::string(variant))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Node, Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Node, Error> {
        Ok(Node::single_entry(variant, value.serialize(self)?))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, Error> {
        Ok(SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(self, _name: &'static str, len: usize) -> Result<SeqBuilder, Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<SeqBuilder>, Error> {
        Ok(VariantBuilder {
            variant,
            inner: self.serialize_seq(Some(len))?,
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MapBuilder, Error> {
        Ok(MapBuilder {
            node: Node::mapping([]),
            key: None,
        })
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder, Error> {
        self.serialize_map(Some(len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<MapBuilder>, Error> {
        Ok(VariantBuilder {
            variant,
            inner: self.serialize_map(Some(len))?,
        })
    }
}

pub(crate) struct SeqBuilder {
    items: Vec<Node>,
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Node;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        self.items.push(value.serialize(NodeSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Node, Error> {
        Ok(Node::sequence(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Node;
    type Error = Error;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Node, Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Node;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<Node, Error> {
        ser::SerializeSeq::end(self)
    }
}

pub(crate) struct MapBuilder {
    node: Node,
    key: Option<Node>,
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Node;
    type Error = Error;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Error> {
        let key = key.serialize(NodeSerializer)?;
        if !key.is_scalar() {
            return Err(Error::msg("mapping keys must be scalars"));
        }
        // keys are written without their type tag; `1: x` keeps reading back as an int key
        self.key = Some(key.without_tag());
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        let key = self
            .key
            .take()
            .ok_or_else(|| Error::msg("mapping value serialized before its key"))?;
        self.node.push_pair(key, value.serialize(NodeSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Node, Error> {
        Ok(self.node)
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Node;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        self.node
            .push_pair(Node::scalar(key), value.serialize(NodeSerializer)?);
        Ok(())
    }

    fn end(self) -> Result<Node, Error> {
        Ok(self.node)
    }
}

/// Wraps the payload of tuple/struct variants into `{ Variant: payload }`.
pub(crate) struct VariantBuilder<B> {
    variant: &'static str,
    inner: B,
}

impl ser::SerializeTupleVariant for VariantBuilder<SeqBuilder> {
    type Ok = Node;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Error> {
        ser::SerializeSeq::serialize_element(&mut self.inner, value)
    }

    fn end(self) -> Result<Node, Error> {
        let payload = ser::SerializeSeq::end(self.inner)?;
        Ok(Node::single_entry(self.variant, payload))
    }
}

impl ser::SerializeStructVariant for VariantBuilder<MapBuilder> {
    type Ok = Node;
    type Error = Error;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Error> {
        ser::SerializeStruct::serialize_field(&mut self.inner, key, value)
    }

    fn end(self) -> Result<Node, Error> {
        let payload = ser::SerializeStruct::end(self.inner)?;
        Ok(Node::single_entry(self.variant, payload))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::compose::parse;
    use crate::de::decode;
    use crate::emit::emit;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    enum Op {
        Stop,
        Move { dx: i32, dy: i32 },
        Say(String),
    }

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Config {
        name: String,
        port: u16,
        ratio: f64,
        tags: Vec<String>,
        extra: Option<BTreeMap<String, bool>>,
        ops: Vec<Op>,
    }

    #[test]
    fn emits_readable_yaml() {
        let cfg = Config {
            name: "007".into(),
            port: 8080,
            ratio: 1.0,
            tags: vec!["a".into(), "yes".into()],
            extra: None,
            ops: vec![Op::Stop, Op::Move { dx: 1, dy: -2 }, Op::Say("hi".into())],
        };
        let text = emit(&encode(&cfg).unwrap());
        assert_eq!(
            text,
            "name: \"007\"\nport: 8080\nratio: 1.0\ntags:\n- a\n- \"yes\"\nextra: null\nops:\n- Stop\n- Move:\n    dx: 1\n    dy: -2\n- Say: hi\n"
        );
        let back: Config = decode(&parse(&text).unwrap()).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn bytes_are_binary() {
        struct Raw;
        impl Serialize for Raw {
            fn serialize<S: ser::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.serialize_bytes(b"hello")
            }
        }
        let node = encode(&Raw).unwrap();
        assert_eq!(node.tag, TAG_BINARY);
        assert_eq!(emit(&node), "!!binary aGVsbG8=\n");
    }
}
