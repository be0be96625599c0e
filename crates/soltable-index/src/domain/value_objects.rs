//! # Domain Value Objects
//!
//! Immutable value types: addresses, signatures, cursors and consistency
//! levels.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::errors::IndexError;

/// Length of a Solana public key in bytes.
pub const ADDRESS_LEN: usize = 32;

/// Address Lookup Table program id
/// (`AddressLookupTab1e1111111111111111111111111`).
pub const LOOKUP_TABLE_PROGRAM_ID: Address = Address([
    2, 119, 166, 175, 151, 51, 155, 122, 200, 141, 24, 146, 201, 4, 70, 245, 0, 2, 48, 146, 102,
    246, 46, 83, 193, 24, 36, 73, 130, 0, 0, 0,
]);

/// 32-byte account address (public key), displayed as base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    /// Wrap raw key bytes.
    pub const fn new(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a slice, which must be exactly 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, IndexError> {
        let raw: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| {
            IndexError::Decode(format!(
                "address must be {} bytes, got {}",
                ADDRESS_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| IndexError::InvalidInput(format!("invalid address {}: {}", s, e)))?;
        Address::from_slice(&bytes)
            .map_err(|_| IndexError::InvalidInput(format!("invalid address length: {}", s)))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Base58 transaction signature. Treated as an opaque history cursor.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Wrap a signature string.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the signature string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Signature {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Signature {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Ledger consistency level (`commitment` in Solana RPC terms).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Consistency {
    /// Processed by the queried node, may be rolled back.
    Processed,
    /// Voted on by a supermajority.
    #[default]
    Confirmed,
    /// Rooted, cannot be rolled back.
    Finalized,
}

impl Consistency {
    /// RPC commitment string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Consistency::Processed => "processed",
            Consistency::Confirmed => "confirmed",
            Consistency::Finalized => "finalized",
        }
    }
}

/// Named backfill progress registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CheckpointKey {
    /// Resumption cursor of an in-progress backward scan.
    FirstSeenCursor,
    /// Newest event known to be fully processed; scans stop here.
    LastSeenCursor,
}

impl CheckpointKey {
    /// Every checkpoint register, for seeding.
    pub const ALL: [CheckpointKey; 2] = [CheckpointKey::FirstSeenCursor, CheckpointKey::LastSeenCursor];

    /// Persisted register name.
    pub fn name(&self) -> &'static str {
        match self {
            CheckpointKey::FirstSeenCursor => "FIRST_SEEN_CURSOR",
            CheckpointKey::LastSeenCursor => "LAST_SEEN_CURSOR",
        }
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
