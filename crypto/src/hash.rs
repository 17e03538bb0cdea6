//! Blake2b hashing and content fingerprints.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use vouch_types::Fingerprint;

type Blake2b256 = Blake2b<U32>;

/// Compute a 256-bit Blake2b hash of arbitrary data.
pub fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash multiple byte slices in sequence without concatenating them.
pub fn blake2b_256_multi(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Content address of a blob as assigned by every content store.
pub fn fingerprint_of(bytes: &[u8]) -> Fingerprint {
    Fingerprint::from_digest(blake2b_256(bytes))
}
