//! Identifier types shared by every component

use crate::error::{ConduitError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// SHA-256 of a tag string, used for fixed-size role and permission identifiers
pub(crate) fn tag_digest(tag: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(tag.as_bytes());
    hasher.finalize().into()
}

fn parse_hex<const N: usize>(input: &str, what: &str) -> Result<[u8; N]> {
    let trimmed = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);

    let bytes = hex::decode(trimmed)
        .map_err(|e| ConduitError::InvalidArgument(format!("{} '{}' is not valid hex: {}", what, input, e)))?;

    bytes.try_into().map_err(|bytes: Vec<u8>| {
        ConduitError::InvalidArgument(format!(
            "{} '{}' must be {} bytes, got {}",
            what,
            input,
            N,
            bytes.len()
        ))
    })
}

/// 20-byte account identity. The all-zero value is the null identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; 20]);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Address with every byte set to `byte`
    pub const fn repeat_byte(byte: u8) -> Self {
        Self([byte; 20])
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = ConduitError;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex::<20>(s, "Address").map(Self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Strategy identifier. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StrategyId(String);

impl StrategyId {
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(ConduitError::EmptyIdentifier);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StrategyId {
    type Error = ConduitError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StrategyId> for String {
    fn from(id: StrategyId) -> Self {
        id.0
    }
}

impl FromStr for StrategyId {
    type Err = ConduitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl std::borrow::Borrow<str> for StrategyId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Execution request identifier
///
/// Derived from the requester, a bridge-wide nonce and the submission
/// timestamp. The nonce never repeats, so neither does the identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId([u8; 32]);

impl RequestId {
    pub fn derive(requester: &Address, nonce: u64, timestamp_nanos: i64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(requester.as_bytes());
        hasher.update(nonce.to_be_bytes());
        hasher.update(timestamp_nanos.to_be_bytes());
        Self(hasher.finalize().into())
    }

    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self)
    }
}

impl FromStr for RequestId {
    type Err = ConduitError;

    fn from_str(s: &str) -> Result<Self> {
        parse_hex::<32>(s, "RequestId").map(Self)
    }
}

impl Serialize for RequestId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RequestId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    // ============== Address Tests ==============

    #[test]
    fn test_address_display_and_parse() {
        let addr = Address::repeat_byte(0x11);
        let text = addr.to_string();

        assert_eq!(text, "0x1111111111111111111111111111111111111111");
        assert_eq!(text.parse::<Address>().unwrap(), addr);
    }

    #[test]
    fn test_address_parse_without_prefix() {
        let addr: Address = "2222222222222222222222222222222222222222".parse().unwrap();
        assert_eq!(addr, Address::repeat_byte(0x22));
    }

    #[test]
    fn test_address_wrong_length_rejected() {
        let err = "0x1234".parse::<Address>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_address_bad_hex_rejected() {
        let err = "0xzz11111111111111111111111111111111111111".parse::<Address>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        assert!(Address::default().is_zero());
        assert!(!Address::repeat_byte(1).is_zero());
    }

    #[test]
    fn test_address_serde_as_string() {
        let addr = Address::repeat_byte(0xaa);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }

    // ============== StrategyId Tests ==============

    #[test]
    fn test_strategy_id_rejects_empty() {
        let err = StrategyId::new("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::EmptyIdentifier);
    }

    #[test]
    fn test_strategy_id_deserialize_rejects_empty() {
        assert!(serde_json::from_str::<StrategyId>("\"\"").is_err());
        let id: StrategyId = serde_json::from_str("\"YIELD\"").unwrap();
        assert_eq!(id.as_str(), "YIELD");
    }

    // ============== RequestId Tests ==============

    #[test]
    fn test_request_id_is_deterministic() {
        let requester = Address::repeat_byte(0x01);
        let a = RequestId::derive(&requester, 7, 1_000);
        let b = RequestId::derive(&requester, 7, 1_000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_request_id_differs_by_nonce() {
        let requester = Address::repeat_byte(0x01);
        let a = RequestId::derive(&requester, 1, 1_000);
        let b = RequestId::derive(&requester, 2, 1_000);
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_id_differs_by_requester() {
        let a = RequestId::derive(&Address::repeat_byte(0x01), 1, 1_000);
        let b = RequestId::derive(&Address::repeat_byte(0x02), 1, 1_000);
        assert_ne!(a, b);
    }

    #[test]
    fn test_request_id_text_roundtrip() {
        let id = RequestId::derive(&Address::repeat_byte(0x03), 42, 99);
        let parsed: RequestId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
