//! Decentralized identifiers.

use crate::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A decentralized identifier of the form `did:vouch:<32 hex chars>`.
///
/// The method-specific part is the first 16 bytes of the Blake2b-256 hash of the
/// key that created the identity, which makes the identifier self-certifying.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Did(String);

impl Did {
    pub const PREFIX: &'static str = "did:vouch:";

    /// Length of the method-specific identifier in hex characters.
    pub const ID_HEX_LEN: usize = 32;

    /// Wrap a raw string without validation.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parse and validate a DID string.
    pub fn parse(raw: &str) -> Result<Self, TypesError> {
        let did = Self::new(raw);
        if did.is_well_formed() {
            Ok(did)
        } else {
            Err(TypesError::InvalidDid(raw.to_string()))
        }
    }

    /// Build the DID for a key-hash prefix.
    pub fn from_key_digest(prefix: &[u8; 16]) -> Self {
        Self(format!("{}{}", Self::PREFIX, hex::encode(prefix)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_well_formed(&self) -> bool {
        match self.0.strip_prefix(Self::PREFIX) {
            Some(id) => {
                id.len() == Self::ID_HEX_LEN
                    && id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
            }
            None => false,
        }
    }
}

impl fmt::Display for Did {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
