//! In-memory implementations of the storage traits.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use vouch_store::{AnchorRecord, ContentStore, DidStore, IndexStore, StoreError};
use vouch_types::{Did, DidDocument, Fingerprint, IndexEntry, ListResult, Page};

/// In-memory content store.
#[derive(Default)]
pub struct NullContentStore {
    blobs: Mutex<HashMap<Fingerprint, Vec<u8>>>,
    pins: Mutex<HashSet<Fingerprint>>,
}

impl NullContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove a blob regardless of pins, simulating content that was never
    /// fetched or was lost.
    pub fn forget(&self, fingerprint: &Fingerprint) {
        self.blobs.lock().unwrap().remove(fingerprint);
    }
}

impl ContentStore for NullContentStore {
    fn put(&self, bytes: &[u8]) -> Result<Fingerprint, StoreError> {
        let fingerprint = vouch_crypto::fingerprint_of(bytes);
        self.blobs
            .lock()
            .unwrap()
            .entry(fingerprint)
            .or_insert_with(|| bytes.to_vec());
        Ok(fingerprint)
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.blobs.lock().unwrap().get(fingerprint).cloned())
    }

    fn has(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        Ok(self.blobs.lock().unwrap().contains_key(fingerprint))
    }

    fn pin(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        self.pins.lock().unwrap().insert(*fingerprint);
        Ok(())
    }

    fn unpin(&self, fingerprint: &Fingerprint) -> Result<(), StoreError> {
        self.pins.lock().unwrap().remove(fingerprint);
        Ok(())
    }

    fn is_pinned(&self, fingerprint: &Fingerprint) -> Result<bool, StoreError> {
        Ok(self.pins.lock().unwrap().contains(fingerprint))
    }

    fn collect_garbage(&self) -> Result<usize, StoreError> {
        let pins = self.pins.lock().unwrap();
        let mut blobs = self.blobs.lock().unwrap();
        let before = blobs.len();
        blobs.retain(|fp, _| pins.contains(fp));
        Ok(before - blobs.len())
    }

    fn len(&self) -> Result<u64, StoreError> {
        Ok(self.blobs.lock().unwrap().len() as u64)
    }
}

/// In-memory replication index. Entries are kept in insertion order.
#[derive(Default)]
pub struct NullIndexStore {
    entries: Mutex<Vec<IndexEntry>>,
    anchors: Mutex<HashMap<Fingerprint, AnchorRecord>>,
}

impl NullIndexStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexStore for NullIndexStore {
    fn insert_if_absent(&self, entry: &IndexEntry) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        if entries.iter().any(|e| e.multihash == entry.multihash) {
            return Ok(false);
        }
        entries.push(entry.clone());
        Ok(true)
    }

    fn get(&self, fingerprint: &Fingerprint) -> Result<Option<IndexEntry>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .find(|e| &e.multihash == fingerprint)
            .cloned())
    }

    fn by_author(&self, author: &Did, page: &Page) -> Result<ListResult<IndexEntry>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(page.apply(entries.iter().filter(|e| &e.author == author).cloned().collect()))
    }

    fn by_subject(&self, subject: &Did, page: &Page) -> Result<ListResult<IndexEntry>, StoreError> {
        let entries = self.entries.lock().unwrap();
        Ok(page.apply(entries.iter().filter(|e| &e.subject == subject).cloned().collect()))
    }

    fn list(&self, page: &Page) -> Result<ListResult<IndexEntry>, StoreError> {
        let entries = self.entries.lock().unwrap();
        let rows = entries
            .iter()
            .skip(page.offset)
            .take(page.effective_limit())
            .cloned()
            .collect();
        Ok(ListResult {
            rows,
            count: entries.len(),
        })
    }

    fn successors(&self, fingerprint: &Fingerprint) -> Result<Vec<Fingerprint>, StoreError> {
        Ok(self
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.previous_version.as_ref() == Some(fingerprint))
            .map(|e| e.multihash)
            .collect())
    }

    fn record_anchor(
        &self,
        fingerprint: &Fingerprint,
        anchor: &AnchorRecord,
    ) -> Result<bool, StoreError> {
        let mut anchors = self.anchors.lock().unwrap();
        if anchors.contains_key(fingerprint) {
            return Ok(false);
        }
        anchors.insert(*fingerprint, anchor.clone());
        Ok(true)
    }

    fn anchor(&self, fingerprint: &Fingerprint) -> Result<Option<AnchorRecord>, StoreError> {
        Ok(self.anchors.lock().unwrap().get(fingerprint).cloned())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.entries.lock().unwrap().clear();
        self.anchors.lock().unwrap().clear();
        Ok(())
    }

    fn len(&self) -> Result<u64, StoreError> {
        Ok(self.entries.lock().unwrap().len() as u64)
    }
}

/// In-memory DID document history.
#[derive(Default)]
pub struct NullDidStore {
    documents: Mutex<HashMap<Did, Vec<DidDocument>>>,
}

impl NullDidStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DidStore for NullDidStore {
    fn append(&self, document: &DidDocument) -> Result<(), StoreError> {
        let mut documents = self.documents.lock().unwrap();
        let history = documents.entry(document.id.clone()).or_default();
        if history.iter().any(|d| d.version == document.version) {
            return Err(StoreError::Duplicate(format!(
                "{} version {}",
                document.id, document.version
            )));
        }
        history.push(document.clone());
        history.sort_by_key(|d| d.version);
        Ok(())
    }

    fn latest(&self, did: &Did) -> Result<Option<DidDocument>, StoreError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(did)
            .and_then(|h| h.last().cloned()))
    }

    fn version(&self, did: &Did, version: u64) -> Result<Option<DidDocument>, StoreError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(did)
            .and_then(|h| h.iter().find(|d| d.version == version).cloned()))
    }

    fn history(&self, did: &Did) -> Result<Vec<DidDocument>, StoreError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .get(did)
            .cloned()
            .unwrap_or_default())
    }

    fn all_documents(&self) -> Result<Vec<DidDocument>, StoreError> {
        Ok(self
            .documents
            .lock()
            .unwrap()
            .values()
            .flat_map(|h| h.iter().cloned())
            .collect())
    }
}
