//! Replication index: admitted records by fingerprint, author, subject and successor.

use std::sync::Arc;

use vouch_store::{AnchorRecord, IndexStore, StoreError};
use vouch_types::{Did, Fingerprint, IndexEntry, ListResult, Page};

use crate::config::IndexConfig;

/// Thin policy layer over an [`IndexStore`].
///
/// When writes are disabled the index keeps serving what it already holds and
/// refuses new entries. Anchors are still recorded for entries it has.
pub struct ReplicationIndex {
    store: Arc<dyn IndexStore>,
    writes_enabled: bool,
    validation_enabled: bool,
}

impl ReplicationIndex {
    pub fn new(store: Arc<dyn IndexStore>, config: &IndexConfig) -> Self {
        Self {
            store,
            writes_enabled: config.writes_enabled,
            validation_enabled: config.validation_enabled,
        }
    }

    pub fn writes_enabled(&self) -> bool {
        self.writes_enabled
    }

    pub fn validation_enabled(&self) -> bool {
        self.validation_enabled
    }

    /// Insert `entry` if its fingerprint is new. Returns whether it was inserted.
    pub fn admit(&self, entry: &IndexEntry) -> Result<bool, StoreError> {
        if !self.writes_enabled {
            tracing::debug!(multihash = %entry.multihash, "index writes disabled, entry not admitted");
            return Ok(false);
        }
        self.store.insert_if_absent(entry)
    }

    pub fn entry(&self, fingerprint: &Fingerprint) -> Result<Option<IndexEntry>, StoreError> {
        self.store.get(fingerprint)
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        Ok(self.store.get(fingerprint)?.is_some())
    }

    pub fn list(&self, page: &Page) -> Result<ListResult<IndexEntry>, StoreError> {
        self.store.list(page)
    }

    pub fn get_by_author(&self, author: &Did, page: &Page) -> Result<ListResult<IndexEntry>, StoreError> {
        self.store.by_author(author, page)
    }

    pub fn get_by_subject(&self, subject: &Did, page: &Page) -> Result<ListResult<IndexEntry>, StoreError> {
        self.store.by_subject(subject, page)
    }

    pub fn successors(&self, fingerprint: &Fingerprint) -> Result<Vec<Fingerprint>, StoreError> {
        self.store.successors(fingerprint)
    }

    /// Record a confirmed anchor. The first confirmation for a fingerprint wins.
    pub fn record_anchor(&self, fingerprint: &Fingerprint, anchor: &AnchorRecord) -> Result<bool, StoreError> {
        self.store.record_anchor(fingerprint, anchor)
    }

    pub fn anchor(&self, fingerprint: &Fingerprint) -> Result<Option<AnchorRecord>, StoreError> {
        self.store.anchor(fingerprint)
    }

    pub fn len(&self) -> Result<u64, StoreError> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        tracing::info!("clearing replication index");
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_nullables::NullIndexStore;
    use vouch_types::Timestamp;

    fn did(n: u8) -> Did {
        Did::from_key_digest(&[n; 16])
    }

    fn entry(n: u8, previous: Option<u8>) -> IndexEntry {
        IndexEntry {
            multihash: Fingerprint::from_digest([n; 32]),
            author: did(1),
            subject: did(2),
            previous_version: previous.map(|p| Fingerprint::from_digest([p; 32])),
            verifiable: true,
            inserted_at: Timestamp::new(n as u64),
        }
    }

    fn index(config: IndexConfig) -> ReplicationIndex {
        ReplicationIndex::new(Arc::new(NullIndexStore::new()), &config)
    }

    #[test]
    fn admit_is_insert_if_absent() {
        let index = index(IndexConfig::default());
        assert!(index.admit(&entry(1, None)).unwrap());
        assert!(!index.admit(&entry(1, None)).unwrap());
        assert_eq!(index.len().unwrap(), 1);
    }

    #[test]
    fn writes_disabled_serves_existing_only() {
        let store = Arc::new(NullIndexStore::new());
        store.insert_if_absent(&entry(1, None)).unwrap();
        let index = ReplicationIndex::new(
            store,
            &IndexConfig {
                writes_enabled: false,
                ..IndexConfig::default()
            },
        );
        assert!(!index.admit(&entry(2, None)).unwrap());
        assert_eq!(index.list(&Page::default()).unwrap().count, 1);
    }

    #[test]
    fn paged_queries_report_total_count() {
        let index = index(IndexConfig::default());
        for n in 1..=5 {
            index.admit(&entry(n, None)).unwrap();
        }
        let page = index.get_by_author(&did(1), &Page::new(1, 2)).unwrap();
        assert_eq!(page.count, 5);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].multihash, Fingerprint::from_digest([2; 32]));
        assert_eq!(index.get_by_subject(&did(9), &Page::default()).unwrap().count, 0);
    }

    #[test]
    fn first_anchor_wins() {
        let index = index(IndexConfig::default());
        let fp = Fingerprint::from_digest([1; 32]);
        let a = AnchorRecord {
            txid: "aa".into(),
            confirmed_at: Timestamp::new(1),
        };
        let b = AnchorRecord {
            txid: "bb".into(),
            confirmed_at: Timestamp::new(2),
        };
        assert!(index.record_anchor(&fp, &a).unwrap());
        assert!(!index.record_anchor(&fp, &b).unwrap());
        assert_eq!(index.anchor(&fp).unwrap().unwrap().txid, "aa");
    }

    #[test]
    fn successors_follow_previous_version() {
        let index = index(IndexConfig::default());
        index.admit(&entry(1, None)).unwrap();
        index.admit(&entry(2, Some(1))).unwrap();
        assert_eq!(
            index.successors(&Fingerprint::from_digest([1; 32])).unwrap(),
            vec![Fingerprint::from_digest([2; 32])]
        );
    }
}
