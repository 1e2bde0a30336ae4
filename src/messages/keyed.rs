//! Self-describing values carried under each integer key of a keyed record.
//!
//! A record on the wire is a MessagePack map whose keys are the stable field
//! keys declared by the record's schema. Values are kept as [`FieldValue`]
//! so that decoding can skip keys it does not know without understanding
//! their contents.

use super::error::{CodecError, Result};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, SerializeTuple, Serializer};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Nil,
    Bool(bool),
    /// Negative integers only; non-negative integers normalize to `UInt`
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Bin(Vec<u8>),
    Array(Vec<FieldValue>),
    Map(Vec<(FieldValue, FieldValue)>),
    /// Application-defined extension type, e.g. timestamps (type -1)
    Ext(i8, Vec<u8>),
}

impl FieldValue {
    /// Build an integer value in its canonical form.
    ///
    /// MessagePack writes non-negative signed integers with the unsigned
    /// formats, so the canonical form of `5i64` is `UInt(5)`.
    pub fn int(value: i64) -> Self {
        if value >= 0 {
            FieldValue::UInt(value as u64)
        } else {
            FieldValue::Int(value)
        }
    }

    /// Short name of the value's type, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Nil => "nil",
            FieldValue::Bool(_) => "bool",
            FieldValue::Int(_) => "int",
            FieldValue::UInt(_) => "uint",
            FieldValue::Float(_) => "float",
            FieldValue::Str(_) => "string",
            FieldValue::Bin(_) => "binary",
            FieldValue::Array(_) => "array",
            FieldValue::Map(_) => "map",
            FieldValue::Ext(..) => "ext",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, FieldValue::Nil)
    }

    /// Interpret the value as a map key, if it is a non-negative integer
    /// that fits in `u32`.
    pub fn as_field_key(&self) -> Option<u32> {
        match self {
            FieldValue::UInt(v) => u32::try_from(*v).ok(),
            _ => None,
        }
    }

    fn mismatch(&self, expected: &'static str) -> CodecError {
        CodecError::TypeMismatch {
            expected,
            found: self.kind(),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            FieldValue::Nil => serializer.serialize_unit(),
            FieldValue::Bool(v) => serializer.serialize_bool(*v),
            FieldValue::Int(v) => serializer.serialize_i64(*v),
            FieldValue::UInt(v) => serializer.serialize_u64(*v),
            FieldValue::Float(v) => serializer.serialize_f64(*v),
            FieldValue::Str(v) => serializer.serialize_str(v),
            FieldValue::Bin(v) => serializer.serialize_bytes(v),
            FieldValue::Array(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            FieldValue::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            FieldValue::Ext(tag, data) => serializer.serialize_newtype_struct(
                rmp_serde::MSGPACK_EXT_STRUCT_NAME,
                &ExtPayload(*tag, data),
            ),
        }
    }
}

/// Ext values travel through rmp-serde as a `(tag, bytes)` tuple
struct ExtPayload<'a>(i8, &'a [u8]);

struct BinRef<'a>(&'a [u8]);

impl Serialize for BinRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(self.0)
    }
}

impl Serialize for ExtPayload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(2)?;
        tuple.serialize_element(&self.0)?;
        tuple.serialize_element(&BinRef(self.1))?;
        tuple.end()
    }
}

struct ExtVisitor;

impl<'de> Visitor<'de> for ExtVisitor {
    type Value = FieldValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a MessagePack ext value")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<FieldValue, A::Error> {
        let tag: i8 = seq
            .next_element()?
            .ok_or_else(|| de::Error::invalid_length(0, &self))?;
        let data = match seq.next_element::<FieldValue>()? {
            Some(FieldValue::Bin(data)) => data,
            Some(other) => {
                return Err(de::Error::invalid_type(
                    de::Unexpected::Other(other.kind()),
                    &self,
                ))
            }
            None => return Err(de::Error::invalid_length(1, &self)),
        };
        Ok(FieldValue::Ext(tag, data))
    }
}

struct FieldValueVisitor;

impl<'de> Visitor<'de> for FieldValueVisitor {
    type Value = FieldValue;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("any MessagePack value")
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<FieldValue, E> {
        Ok(FieldValue::Bool(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<FieldValue, E> {
        Ok(FieldValue::int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<FieldValue, E> {
        Ok(FieldValue::UInt(v))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> std::result::Result<FieldValue, E> {
        Ok(FieldValue::Float(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<FieldValue, E> {
        Ok(FieldValue::Str(v.to_owned()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> std::result::Result<FieldValue, E> {
        Ok(FieldValue::Str(v))
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<FieldValue, E> {
        Ok(FieldValue::Bin(v.to_vec()))
    }

    fn visit_byte_buf<E: de::Error>(self, v: Vec<u8>) -> std::result::Result<FieldValue, E> {
        Ok(FieldValue::Bin(v))
    }

    fn visit_unit<E: de::Error>(self) -> std::result::Result<FieldValue, E> {
        Ok(FieldValue::Nil)
    }

    fn visit_none<E: de::Error>(self) -> std::result::Result<FieldValue, E> {
        Ok(FieldValue::Nil)
    }

    fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<FieldValue, D::Error> {
        FieldValue::deserialize(d)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        d: D,
    ) -> std::result::Result<FieldValue, D::Error> {
        d.deserialize_any(ExtVisitor)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> std::result::Result<FieldValue, A::Error> {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0).min(256));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(FieldValue::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<FieldValue, A::Error> {
        let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0).min(256));
        while let Some((key, value)) = map.next_entry()? {
            entries.push((key, value));
        }
        Ok(FieldValue::Map(entries))
    }
}

impl<'de> Deserialize<'de> for FieldValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(FieldValueVisitor)
    }
}

/// Conversion from a Rust field into its wire value
pub trait ToField {
    fn to_field(&self) -> FieldValue;
}

/// Conversion from a wire value back into a Rust field
pub trait FromField: Sized {
    fn from_field(value: FieldValue) -> Result<Self>;
}

impl ToField for bool {
    fn to_field(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }
}

impl FromField for bool {
    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Bool(v) => Ok(v),
            other => Err(other.mismatch("bool")),
        }
    }
}

macro_rules! signed_field {
    ($($t:ty),*) => {$(
        impl ToField for $t {
            fn to_field(&self) -> FieldValue {
                FieldValue::int(i64::from(*self))
            }
        }

        impl FromField for $t {
            fn from_field(value: FieldValue) -> Result<Self> {
                match value {
                    FieldValue::Int(v) => <$t>::try_from(v).map_err(|_| CodecError::OutOfRange {
                        value: v.to_string(),
                        target: stringify!($t),
                    }),
                    FieldValue::UInt(v) => <$t>::try_from(v).map_err(|_| CodecError::OutOfRange {
                        value: v.to_string(),
                        target: stringify!($t),
                    }),
                    other => Err(other.mismatch(stringify!($t))),
                }
            }
        }
    )*};
}

macro_rules! unsigned_field {
    ($($t:ty),*) => {$(
        impl ToField for $t {
            fn to_field(&self) -> FieldValue {
                FieldValue::UInt(u64::from(*self))
            }
        }

        impl FromField for $t {
            fn from_field(value: FieldValue) -> Result<Self> {
                match value {
                    FieldValue::UInt(v) => <$t>::try_from(v).map_err(|_| CodecError::OutOfRange {
                        value: v.to_string(),
                        target: stringify!($t),
                    }),
                    FieldValue::Int(v) => Err(CodecError::OutOfRange {
                        value: v.to_string(),
                        target: stringify!($t),
                    }),
                    other => Err(other.mismatch(stringify!($t))),
                }
            }
        }
    )*};
}

signed_field!(i8, i16, i32, i64);
unsigned_field!(u8, u16, u32, u64);

impl ToField for f64 {
    fn to_field(&self) -> FieldValue {
        FieldValue::Float(*self)
    }
}

impl FromField for f64 {
    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Float(v) => Ok(v),
            FieldValue::Int(v) => Ok(v as f64),
            FieldValue::UInt(v) => Ok(v as f64),
            other => Err(other.mismatch("f64")),
        }
    }
}

impl ToField for String {
    fn to_field(&self) -> FieldValue {
        FieldValue::Str(self.clone())
    }
}

impl FromField for String {
    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Str(v) => Ok(v),
            other => Err(other.mismatch("string")),
        }
    }
}

/// Raw bytes travel as MessagePack `bin`, not as an array of integers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl ToField for Bytes {
    fn to_field(&self) -> FieldValue {
        FieldValue::Bin(self.0.clone())
    }
}

impl FromField for Bytes {
    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Bin(v) => Ok(Bytes(v)),
            other => Err(other.mismatch("binary")),
        }
    }
}

impl<T: ToField> ToField for Option<T> {
    fn to_field(&self) -> FieldValue {
        match self {
            Some(v) => v.to_field(),
            None => FieldValue::Nil,
        }
    }
}

impl<T: FromField> FromField for Option<T> {
    fn from_field(value: FieldValue) -> Result<Self> {
        if value.is_nil() {
            Ok(None)
        } else {
            T::from_field(value).map(Some)
        }
    }
}

impl<T: ToField> ToField for Vec<T> {
    fn to_field(&self) -> FieldValue {
        FieldValue::Array(self.iter().map(ToField::to_field).collect())
    }
}

impl<T: FromField> FromField for Vec<T> {
    fn from_field(value: FieldValue) -> Result<Self> {
        match value {
            FieldValue::Array(items) => items.into_iter().map(T::from_field).collect(),
            other => Err(other.mismatch("array")),
        }
    }
}
