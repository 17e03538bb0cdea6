//! Content fingerprints (multihashes) assigned by the content store.
//!
//! A fingerprint is a Blake2b-256 digest wrapped in the multihash envelope
//! `<varint code 0xb220><length 0x20><digest>`. The textual form is the lowercase
//! hex encoding of the whole multihash, so `"a0e40220…"` always prefixes it.

use crate::TypesError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Multihash header for a 32-byte Blake2b-256 digest.
pub const MULTIHASH_PREFIX: [u8; 4] = [0xa0, 0xe4, 0x02, 0x20];

/// Length of an encoded multihash (header + digest).
pub const MULTIHASH_LEN: usize = MULTIHASH_PREFIX.len() + 32;

/// Content address of an immutable blob.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(digest)
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full multihash bytes: header followed by the digest.
    pub fn to_multihash(&self) -> [u8; MULTIHASH_LEN] {
        let mut out = [0u8; MULTIHASH_LEN];
        out[..MULTIHASH_PREFIX.len()].copy_from_slice(&MULTIHASH_PREFIX);
        out[MULTIHASH_PREFIX.len()..].copy_from_slice(&self.0);
        out
    }

    /// Parse raw multihash bytes. Only Blake2b-256 multihashes are accepted.
    pub fn from_multihash(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != MULTIHASH_LEN {
            return Err(TypesError::InvalidFingerprint(format!(
                "expected {MULTIHASH_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[..MULTIHASH_PREFIX.len()] != MULTIHASH_PREFIX {
            return Err(TypesError::InvalidFingerprint(
                "unsupported multihash code".to_string(),
            ));
        }
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&bytes[MULTIHASH_PREFIX.len()..]);
        Ok(Self(digest))
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({}\u{2026})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.to_multihash()))
    }
}

impl FromStr for Fingerprint {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| TypesError::InvalidFingerprint(e.to_string()))?;
        Self::from_multihash(&bytes)
    }
}
