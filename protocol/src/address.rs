//! # Internal Addresses
//!
//! An account on the ledger is identified by a workchain id and the 256-bit
//! hash of its initial state:
//!
//! ```text
//! addr_std$10 anycast:(Maybe Anycast) workchain_id:int8 address:bits256
//! ```
//!
//! Anycast is never used by the relay, so [`Address`] carries only the
//! workchain and the hash. The raw text form is `"<workchain>:<64 hex>"`,
//! e.g. `0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config::BASECHAIN;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors produced while parsing a raw address string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    /// The `workchain:hash` separator is missing.
    #[error("raw address must have the form <workchain>:<hex>, got '{0}'")]
    MissingSeparator(String),

    /// The workchain part is not an 8-bit signed integer.
    #[error("invalid workchain '{0}'")]
    InvalidWorkchain(String),

    /// The hash part is not valid hex.
    #[error("invalid address hash: {0}")]
    InvalidHex(String),

    /// The hash part decodes to the wrong number of bytes.
    #[error("invalid address hash length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A standard internal address.
///
/// Equality is structural: same workchain and same hash. That is exactly the
/// comparison the ownership check relies on.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    workchain: i8,
    hash: [u8; 32],
}

impl Address {
    /// Creates an address from its parts.
    pub const fn new(workchain: i8, hash: [u8; 32]) -> Self {
        Self { workchain, hash }
    }

    /// The workchain this address belongs to.
    pub fn workchain(&self) -> i8 {
        self.workchain
    }

    /// The 256-bit account id.
    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Whether the address lives on the basechain.
    pub fn is_basechain(&self) -> bool {
        self.workchain == BASECHAIN
    }

    /// Raw text form: `"<workchain>:<64 lowercase hex>"`.
    pub fn to_raw(&self) -> String {
        format!("{}:{}", self.workchain, hex::encode(self.hash))
    }

    /// Parses the raw text form.
    pub fn from_raw(s: &str) -> Result<Self, AddressError> {
        let (wc, hash_hex) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| AddressError::MissingSeparator(s.to_string()))?;

        let workchain: i8 = wc
            .parse()
            .map_err(|_| AddressError::InvalidWorkchain(wc.to_string()))?;

        let bytes = hex::decode(hash_hex).map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(AddressError::InvalidLength(bytes.len()));
        }

        let mut hash = [0u8; 32];
        hash.copy_from_slice(&bytes);
        Ok(Self { workchain, hash })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_raw())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_raw())
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_raw(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_raw())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_raw(&s).map_err(serde::de::Error::custom)
    }
}
