//! Domain primitives: Address, Signature, PositionKey.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Unix timestamp in seconds, as the chain reports it.
pub type UnixSeconds = u64;

pub const ADDRESS_LEN: usize = 32;

/// 32-byte account address, displayed as base58.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, BorshSerialize, BorshDeserialize)]
pub struct Address(pub [u8; ADDRESS_LEN]);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("invalid base58 address {0:?}")]
    InvalidBase58(String),
    #[error("address {input:?} decodes to {len} bytes, expected 32")]
    InvalidLength { input: String, len: usize },
}

impl Address {
    pub fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| AddressParseError::InvalidBase58(s.to_string()))?;
        let len = bytes.len();
        let array: [u8; ADDRESS_LEN] =
            bytes
                .try_into()
                .map_err(|_| AddressParseError::InvalidLength {
                    input: s.to_string(),
                    len,
                })?;
        Ok(Address(array))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Transaction signature (base58 string as returned by the RPC node).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(pub String);

impl Signature {
    pub fn new(sig: impl Into<String>) -> Self {
        Signature(sig.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a liquidity position: pool plus the protocol's 128-bit position id.
///
/// Position ids are only unique within a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionKey {
    pub pool: Address,
    pub id: u128,
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.pool, self.id)
    }
}

/// Serde adapter writing 128-bit integers as decimal strings.
pub mod serde_u128 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = <String as Deserialize>::deserialize(deserializer)?;
        s.parse::<u128>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_base58_roundtrip() {
        let addr = Address::new([7u8; 32]);
        let encoded = addr.to_string();
        let decoded: Address = encoded.parse().unwrap();
        assert_eq!(addr, decoded);
    }

    #[test]
    fn test_address_rejects_short_input() {
        let short = bs58::encode([1u8; 16]).into_string();
        match short.parse::<Address>() {
            Err(AddressParseError::InvalidLength { len, .. }) => assert_eq!(len, 16),
            other => panic!("Expected InvalidLength, got {:?}", other),
        }
    }

    #[test]
    fn test_address_rejects_non_base58() {
        assert!(matches!(
            "0OIl".parse::<Address>(),
            Err(AddressParseError::InvalidBase58(_))
        ));
    }

    #[test]
    fn test_address_json_is_string() {
        let addr = Address::new([1u8; 32]);
        let json = serde_json::to_value(addr).unwrap();
        assert_eq!(json, serde_json::Value::String(addr.to_base58()));

        let back: Address = serde_json::from_value(json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_value::<Address>(serde_json::json!("0OIl")).is_err());
    }

    #[test]
    fn test_position_key_ordering() {
        let pool = Address::new([2u8; 32]);
        let a = PositionKey { pool, id: 1 };
        let b = PositionKey { pool, id: 2 };
        assert!(a < b);
    }
}
