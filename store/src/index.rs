//! Replication index storage trait.

use crate::StoreError;
use serde::{Deserialize, Serialize};
use vouch_types::{Did, Fingerprint, IndexEntry, ListResult, Page, Timestamp};

/// A blockchain transaction confirmed to anchor a fingerprint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub txid: String,
    pub confirmed_at: Timestamp,
}

/// Secondary index over admitted review records.
///
/// Entries are keyed by fingerprint and never overwritten. Listings return
/// one page of entries in insertion order, plus the total before paging.
pub trait IndexStore: Send + Sync {
    /// Insert `entry` unless its fingerprint is already indexed.
    /// Returns `true` if the entry was inserted.
    fn insert_if_absent(&self, entry: &IndexEntry) -> Result<bool, StoreError>;

    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<IndexEntry>, StoreError>;

    fn by_author(&self, author: &Did, page: &Page) -> Result<ListResult<IndexEntry>, StoreError>;

    fn by_subject(&self, subject: &Did, page: &Page) -> Result<ListResult<IndexEntry>, StoreError>;

    fn list(&self, page: &Page) -> Result<ListResult<IndexEntry>, StoreError>;

    /// Fingerprints of entries whose `previous_version` is `fingerprint`.
    fn successors(&self, fingerprint: &Fingerprint) -> Result<Vec<Fingerprint>, StoreError>;

    /// Record `anchor` unless one is already stored for `fingerprint`.
    /// Returns `true` if this anchor was written.
    fn record_anchor(
        &self,
        fingerprint: &Fingerprint,
        anchor: &AnchorRecord,
    ) -> Result<bool, StoreError>;

    fn anchor(&self, fingerprint: &Fingerprint) -> Result<Option<AnchorRecord>, StoreError>;

    /// Drop every entry and anchor.
    fn clear(&self) -> Result<(), StoreError>;

    fn len(&self) -> Result<u64, StoreError>;
}
