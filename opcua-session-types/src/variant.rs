// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0
// Copyright (C) 2017-2024 Adam Lock

//! The `Variant` type, a discriminated union over the OPC UA scalar types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    basic_types::{LocalizedText, QualifiedName},
    date_time::DateTime,
    node_id::NodeId,
    status_code::StatusCode,
};

/// A value of one of the OPC UA built-in types. Only the scalar types that can
/// appear in data values and event fields are represented; structured values
/// belong to the codec layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    /// An empty value.
    Empty,
    /// A boolean.
    Boolean(bool),
    /// A signed byte.
    SByte(i8),
    /// An unsigned byte.
    Byte(u8),
    /// A signed 16 bit integer.
    Int16(i16),
    /// An unsigned 16 bit integer.
    UInt16(u16),
    /// A signed 32 bit integer.
    Int32(i32),
    /// An unsigned 32 bit integer.
    UInt32(u32),
    /// A signed 64 bit integer.
    Int64(i64),
    /// An unsigned 64 bit integer.
    UInt64(u64),
    /// An IEEE single precision float.
    Float(f32),
    /// An IEEE double precision float.
    Double(f64),
    /// A UTF-8 string.
    String(String),
    /// A UTC timestamp.
    DateTime(DateTime),
    /// A GUID.
    Guid(Uuid),
    /// A status code.
    StatusCode(StatusCode),
    /// A string of bytes.
    ByteString(Vec<u8>),
    /// A node id.
    NodeId(Box<NodeId>),
    /// A qualified name.
    QualifiedName(Box<QualifiedName>),
    /// Localized text.
    LocalizedText(Box<LocalizedText>),
    /// An array of variants.
    Array(Vec<Variant>),
}

impl Variant {
    /// True if the variant holds no value.
    pub fn is_empty(&self) -> bool {
        matches!(self, Variant::Empty)
    }

    /// Coerce the variant into `T`, if the held value converts to it.
    pub fn try_cast_to<T: FromVariant>(self) -> Option<T> {
        T::from_variant(self)
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::Empty
    }
}

macro_rules! variant_from {
    ($($ty:ty => $var:ident),*,) => {
        $(
            impl From<$ty> for Variant {
                fn from(value: $ty) -> Self {
                    Variant::$var(value)
                }
            }
        )*
    };
}

variant_from! {
    bool => Boolean,
    i8 => SByte,
    u8 => Byte,
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f32 => Float,
    f64 => Double,
    String => String,
    DateTime => DateTime,
    Uuid => Guid,
    StatusCode => StatusCode,
    Vec<u8> => ByteString,
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<NodeId> for Variant {
    fn from(value: NodeId) -> Self {
        Variant::NodeId(Box::new(value))
    }
}

impl From<QualifiedName> for Variant {
    fn from(value: QualifiedName) -> Self {
        Variant::QualifiedName(Box::new(value))
    }
}

impl From<LocalizedText> for Variant {
    fn from(value: LocalizedText) -> Self {
        Variant::LocalizedText(Box::new(value))
    }
}

impl From<Vec<Variant>> for Variant {
    fn from(value: Vec<Variant>) -> Self {
        Variant::Array(value)
    }
}

impl Variant {
    /// Build an array variant from anything that converts to variants.
    pub fn array_of<T: Into<Variant>>(values: Vec<T>) -> Self {
        Variant::Array(values.into_iter().map(|v| v.into()).collect())
    }
}

/// Conversion out of a [`Variant`], with the numeric widening and narrowing
/// rules used by unwrapped value bindings. Conversions that would lose
/// information on the concrete value fail rather than truncate.
pub trait FromVariant: Sized {
    /// Convert the variant to `Self`, or `None` if the held value does not convert.
    fn from_variant(value: Variant) -> Option<Self>;
}

macro_rules! from_variant_int {
    ($($ty:ty),*) => {
        $(
            impl FromVariant for $ty {
                fn from_variant(value: Variant) -> Option<Self> {
                    match value {
                        Variant::SByte(v) => Self::try_from(v).ok(),
                        Variant::Byte(v) => Self::try_from(v).ok(),
                        Variant::Int16(v) => Self::try_from(v).ok(),
                        Variant::UInt16(v) => Self::try_from(v).ok(),
                        Variant::Int32(v) => Self::try_from(v).ok(),
                        Variant::UInt32(v) => Self::try_from(v).ok(),
                        Variant::Int64(v) => Self::try_from(v).ok(),
                        Variant::UInt64(v) => Self::try_from(v).ok(),
                        _ => None,
                    }
                }
            }
        )*
    };
}

from_variant_int!(i8, u8, i16, u16, i32, u32, i64, u64);

impl FromVariant for f64 {
    fn from_variant(value: Variant) -> Option<Self> {
        match value {
            Variant::SByte(v) => Some(v as f64),
            Variant::Byte(v) => Some(v as f64),
            Variant::Int16(v) => Some(v as f64),
            Variant::UInt16(v) => Some(v as f64),
            Variant::Int32(v) => Some(v as f64),
            Variant::UInt32(v) => Some(v as f64),
            Variant::Int64(v) => Some(v as f64),
            Variant::UInt64(v) => Some(v as f64),
            Variant::Float(v) => Some(v as f64),
            Variant::Double(v) => Some(v),
            _ => None,
        }
    }
}

impl FromVariant for f32 {
    fn from_variant(value: Variant) -> Option<Self> {
        match value {
            Variant::SByte(v) => Some(v as f32),
            Variant::Byte(v) => Some(v as f32),
            Variant::Int16(v) => Some(v as f32),
            Variant::UInt16(v) => Some(v as f32),
            Variant::Float(v) => Some(v),
            _ => None,
        }
    }
}

impl FromVariant for bool {
    fn from_variant(value: Variant) -> Option<Self> {
        match value {
            Variant::Boolean(v) => Some(v),
            _ => None,
        }
    }
}

impl FromVariant for String {
    fn from_variant(value: Variant) -> Option<Self> {
        match value {
            Variant::String(v) => Some(v),
            Variant::LocalizedText(v) => Some(v.text),
            _ => None,
        }
    }
}

impl FromVariant for DateTime {
    fn from_variant(value: Variant) -> Option<Self> {
        match value {
            Variant::DateTime(v) => Some(v),
            _ => None,
        }
    }
}

impl FromVariant for StatusCode {
    fn from_variant(value: Variant) -> Option<Self> {
        match value {
            Variant::StatusCode(v) => Some(v),
            Variant::UInt32(v) => Some(StatusCode::from_bits(v)),
            _ => None,
        }
    }
}

impl FromVariant for NodeId {
    fn from_variant(value: Variant) -> Option<Self> {
        match value {
            Variant::NodeId(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromVariant for LocalizedText {
    fn from_variant(value: Variant) -> Option<Self> {
        match value {
            Variant::LocalizedText(v) => Some(*v),
            Variant::String(v) => Some(LocalizedText::new("", v)),
            _ => None,
        }
    }
}

impl FromVariant for QualifiedName {
    fn from_variant(value: Variant) -> Option<Self> {
        match value {
            Variant::QualifiedName(v) => Some(*v),
            _ => None,
        }
    }
}

impl FromVariant for Variant {
    fn from_variant(value: Variant) -> Option<Self> {
        Some(value)
    }
}

impl<T: FromVariant> FromVariant for Vec<T> {
    fn from_variant(value: Variant) -> Option<Self> {
        match value {
            Variant::Array(values) => values.into_iter().map(T::from_variant).collect(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_widening() {
        assert_eq!(Variant::Int32(5).try_cast_to::<i64>(), Some(5));
        assert_eq!(Variant::Byte(200).try_cast_to::<u16>(), Some(200));
        assert_eq!(Variant::Int32(5).try_cast_to::<f64>(), Some(5.0));
        assert_eq!(Variant::Float(1.5).try_cast_to::<f64>(), Some(1.5));
    }

    #[test]
    fn numeric_narrowing() {
        assert_eq!(Variant::Int32(127).try_cast_to::<i8>(), Some(127));
        assert_eq!(Variant::Int32(128).try_cast_to::<i8>(), None);
        assert_eq!(Variant::Int32(-1).try_cast_to::<u32>(), None);
        assert_eq!(Variant::UInt64(u64::MAX).try_cast_to::<i64>(), None);
    }

    #[test]
    fn mismatched_types() {
        assert_eq!(Variant::String("5".into()).try_cast_to::<i32>(), None);
        assert_eq!(Variant::Double(1.0).try_cast_to::<bool>(), None);
        assert_eq!(Variant::Empty.try_cast_to::<f64>(), None);
    }

    #[test]
    fn arrays() {
        let v = Variant::array_of(vec![1i32, 2, 3]);
        assert_eq!(v.clone().try_cast_to::<Vec<i64>>(), Some(vec![1, 2, 3]));
        assert_eq!(v.try_cast_to::<Vec<bool>>(), None);
    }
}
