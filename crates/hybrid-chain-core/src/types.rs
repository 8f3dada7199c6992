//! Strong type definitions for Hybrid Chain.
//!
//! Digests are newtypes so a payload string can never be passed where a hash
//! is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Why a hex string is not an [`EntryHash`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HashParseError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    #[error("expected 32 bytes, got {0}")]
    Length(usize),

    /// 64 zeros spell the genesis sentinel, which is only ever written as `""`.
    #[error("all-zero hash is reserved for genesis")]
    ReservedZero,
}

/// A 32-byte entry digest, computed as Blake3 over the entry's linkage input.
///
/// The all-zero value is reserved as the genesis sentinel ([`EntryHash::EMPTY`]).
/// It contributes no bytes to a digest and renders as the empty string, so a
/// genesis entry's `previousHash` is `""` on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryHash(pub [u8; 32]);

impl EntryHash {
    /// The genesis sentinel: "no predecessor".
    pub const EMPTY: Self = Self([0u8; 32]);

    /// Create a new EntryHash from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether this is the genesis sentinel.
    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }

    /// Convert to hex string. The sentinel renders as `""`.
    pub fn to_hex(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            hex::encode(self.0)
        }
    }

    /// Parse from hex string. `""` parses to the sentinel; a non-empty
    /// string that decodes to all zeros is rejected.
    pub fn from_hex(s: &str) -> Result<Self, HashParseError> {
        if s.is_empty() {
            return Ok(Self::EMPTY);
        }
        let bytes = hex::decode(s)?;
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| HashParseError::Length(bytes.len()))?;
        let hash = Self(arr);
        if hash.is_empty() {
            return Err(HashParseError::ReservedZero);
        }
        Ok(hash)
    }

    /// First 16 hex characters, for log lines.
    pub fn short(&self) -> String {
        if self.is_empty() {
            "<genesis>".to_string()
        } else {
            self.to_hex()[..16].to_string()
        }
    }
}

impl Default for EntryHash {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryHash({})", self.short())
    }
}

impl fmt::Display for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short())
    }
}

impl AsRef<[u8]> for EntryHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for EntryHash {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for EntryHash {
    type Error = std::array::TryFromSliceError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; 32] = slice.try_into()?;
        Ok(Self(arr))
    }
}

impl Serialize for EntryHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for EntryHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_hash_hex_roundtrip() {
        let hash = EntryHash::from_bytes([0x42; 32]);
        let hex = hash.to_hex();
        assert_eq!(hex.len(), 64);
        assert_eq!(EntryHash::from_hex(&hex).unwrap(), hash);
    }

    #[test]
    fn test_empty_sentinel_is_empty_string() {
        assert_eq!(EntryHash::EMPTY.to_hex(), "");
        assert_eq!(EntryHash::from_hex("").unwrap(), EntryHash::EMPTY);
        assert_eq!(
            serde_json::to_string(&EntryHash::EMPTY).unwrap(),
            "\"\""
        );
    }

    #[test]
    fn test_from_hex_rejects_short_input() {
        assert_eq!(EntryHash::from_hex("abcd"), Err(HashParseError::Length(2)));
        assert!(matches!(
            EntryHash::from_hex("zz"),
            Err(HashParseError::Hex(_))
        ));
    }

    #[test]
    fn test_spelled_out_zero_hash_rejected() {
        let zeros = "0".repeat(64);
        assert_eq!(EntryHash::from_hex(&zeros), Err(HashParseError::ReservedZero));
        let quoted = format!("\"{}\"", zeros);
        assert!(serde_json::from_str::<EntryHash>(&quoted).is_err());
    }

    #[test]
    fn test_entry_hash_display() {
        let hash = EntryHash::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", hash), "abababababababab");
        assert_eq!(format!("{:?}", EntryHash::EMPTY), "EntryHash(<genesis>)");
    }
}
