//! # Token & Account Identifiers
//!
//! A [`TokenId`] is an opaque, content-addressed 32-byte identifier. The
//! vault never interprets it beyond equality and ordering: canonical token
//! order inside a pool is plain byte order of the id, fixed once at
//! registration.
//!
//! Pool share tokens (BPT) and ERC4626 wrapped tokens are ordinary
//! `TokenId`s too. A pool is identified by its share token, which is what
//! lets the batch router recognise "add/remove liquidity" steps purely from
//! path shape.
//!
//! [`AccountId`] names a holder on the token ledger: users, routers, the
//! vault itself, wrapper contracts.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// ---------------------------------------------------------------------------
// TokenId
// ---------------------------------------------------------------------------

/// A unique identifier for a fungible token.
///
/// Derived as `BLAKE3(symbol)` by [`TokenId::from_symbol`], which is
/// convenient for tests and scenario files. Ordering is lexicographic over
/// the raw bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId([u8; 32]);

impl TokenId {
    /// Creates a `TokenId` from a raw 32-byte value.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32-byte identifier.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derives the id for a ticker symbol.
    pub fn from_symbol(symbol: &str) -> Self {
        Self(*blake3::hash(symbol.as_bytes()).as_bytes())
    }

    /// Returns the hex-encoded id.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a hex-encoded id.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenId({}...)", &self.to_hex()[..12])
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl std::str::FromStr for TokenId {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Hex strings on the wire so ids work as JSON map keys.
impl Serialize for TokenId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for TokenId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// A holder of tokens on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Creates an account id from any string-like name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the account name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AccountId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_ids_are_deterministic() {
        assert_eq!(TokenId::from_symbol("DAI"), TokenId::from_symbol("DAI"));
        assert_ne!(TokenId::from_symbol("DAI"), TokenId::from_symbol("USDC"));
    }

    #[test]
    fn hex_roundtrip() {
        let id = TokenId::from_symbol("WETH");
        let parsed: TokenId = id.to_hex().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_short_hex() {
        assert!(TokenId::from_hex("abcd").is_err());
    }

    #[test]
    fn ordering_is_byte_order() {
        let low = TokenId::from_bytes([0u8; 32]);
        let mut high_bytes = [0u8; 32];
        high_bytes[0] = 1;
        let high = TokenId::from_bytes(high_bytes);
        assert!(low < high);
    }

    #[test]
    fn serializes_as_hex_string() {
        let id = TokenId::from_symbol("USDC");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.to_hex()));
        let back: TokenId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
