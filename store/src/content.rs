//! Content-addressed blob storage trait.

use crate::StoreError;
use vouch_types::Fingerprint;

/// Immutable blobs keyed by the fingerprint of their bytes.
///
/// A blob never changes once written. Blobs are removed only by
/// [`ContentStore::collect_garbage`], and never while pinned.
pub trait ContentStore: Send + Sync {
    /// Store `bytes` and return their fingerprint. Writing identical bytes again
    /// is a no-op that returns the same fingerprint.
    fn put(&self, bytes: &[u8]) -> Result<Fingerprint, StoreError>;

    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError>;

    fn has(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError>;

    /// Protect a blob from garbage collection. Idempotent.
    fn pin(&self, fingerprint: &Fingerprint) -> Result<(), StoreError>;

    fn unpin(&self, fingerprint: &Fingerprint) -> Result<(), StoreError>;

    fn is_pinned(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError>;

    /// Delete every unpinned blob. Returns the number of blobs removed.
    fn collect_garbage(&self) -> Result<usize, StoreError>;

    /// Number of stored blobs.
    fn len(&self) -> Result<u64, StoreError>;
}
