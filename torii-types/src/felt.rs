//! Field element keys.
//!
//! Entity and model keys are elements of the STARK field, stored as 32
//! big-endian bytes and rendered as `0x`-prefixed hex.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Big-endian bytes of the field modulus `2^251 + 17 * 2^192 + 1`.
const MODULUS: [u8; 32] = [
    0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x11, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
];

/// A 252-bit field element used as an entity or model key.
///
/// Always strictly below the field modulus. Ordering is numeric.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldElement([u8; 32]);

impl FieldElement {
    /// The zero element.
    pub const ZERO: Self = Self([0; 32]);

    /// Creates a field element from big-endian bytes.
    pub fn from_bytes_be(bytes: [u8; 32]) -> Result<Self> {
        if bytes >= MODULUS {
            return Err(Error::FeltOutOfRange(format!("0x{}", hex::encode(bytes))));
        }
        Ok(Self(bytes))
    }

    /// Creates a field element from a `u64`. Always in range.
    #[must_use]
    pub fn from_u64(value: u64) -> Self {
        let mut bytes = [0u8; 32];
        bytes[24..].copy_from_slice(&value.to_be_bytes());
        Self(bytes)
    }

    /// Parses a hex string, with or without a `0x` prefix, of at most 64 digits.
    pub fn from_hex(s: &str) -> Result<Self> {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.is_empty() || digits.len() > 64 {
            return Err(Error::InvalidHex(s.to_string()));
        }

        let padded = format!("{digits:0>64}");
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(&padded, &mut bytes).map_err(|_| Error::InvalidHex(s.to_string()))?;
        Self::from_bytes_be(bytes)
    }

    /// Returns the big-endian bytes.
    #[must_use]
    pub const fn to_bytes_be(&self) -> [u8; 32] {
        self.0
    }

    /// Borrows the big-endian bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the zero element.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({self})")
    }
}

impl FromStr for FieldElement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl TryFrom<[u8; 32]> for FieldElement {
    type Error = Error;

    fn try_from(bytes: [u8; 32]) -> Result<Self> {
        Self::from_bytes_be(bytes)
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
