//! Typed values as described by the remote service's schemas.
//!
//! The schema of every model is owned by the remote service; these types only
//! mirror the shapes it can send: primitives, structs, enums, tuples and byte
//! arrays, nested arbitrarily.

use crate::FieldElement;
use serde::{Deserialize, Serialize};

/// A scalar value.
///
/// 128-bit integers travel as decimal strings; JSON numbers lose precision
/// past 2^53 on the JS side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Primitive {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    I128(#[serde(with = "decimal")] i128),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    U128(#[serde(with = "decimal")] u128),
    #[serde(rename = "usize")]
    USize(u32),
    Bool(bool),
    Felt252(FieldElement),
    ClassHash(FieldElement),
    ContractAddress(FieldElement),
}

mod decimal {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl Primitive {
    /// Returns the value as a field element if it is one of the felt-like kinds.
    pub fn as_felt(&self) -> Option<FieldElement> {
        match self {
            Self::Felt252(f) | Self::ClassHash(f) | Self::ContractAddress(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the value widened to `u128` if it is an unsigned integer.
    pub fn as_u128(&self) -> Option<u128> {
        match *self {
            Self::U8(v) => Some(v.into()),
            Self::U16(v) => Some(v.into()),
            Self::U32(v) | Self::USize(v) => Some(v.into()),
            Self::U64(v) => Some(v.into()),
            Self::U128(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(b) => Some(b),
            _ => None,
        }
    }
}

/// A typed value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Ty {
    Primitive(Primitive),
    Struct(Struct),
    Enum(EnumValue),
    Tuple(Vec<Ty>),
    ByteArray(String),
}

impl Ty {
    pub fn as_primitive(&self) -> Option<&Primitive> {
        match self {
            Self::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Self::Struct(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&EnumValue> {
        match self {
            Self::Enum(e) => Some(e),
            _ => None,
        }
    }
}

/// A named struct value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Struct {
    pub name: String,
    pub children: Vec<Member>,
}

impl Struct {
    /// Looks up a member by name.
    pub fn member(&self, name: &str) -> Option<&Member> {
        self.children.iter().find(|m| m.name == name)
    }
}

/// One named field of a struct or model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub ty: Ty,
    /// Whether this member is part of the model's key.
    pub key: bool,
}

/// An enum value: the full option list plus the selected index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumValue {
    pub name: String,
    pub option: u8,
    pub options: Vec<EnumOption>,
}

impl EnumValue {
    /// The currently selected option, if the index is in bounds.
    pub fn selected(&self) -> Option<&EnumOption> {
        self.options.get(usize::from(self.option))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub name: String,
    pub ty: Ty,
}
