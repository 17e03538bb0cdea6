//! Parking areas for replicated updates that arrived before what they build on.
//!
//! Records are keyed by the missing predecessor fingerprint; when that record
//! is admitted, its dependents are drained and processed again. DID documents
//! are keyed by DID and version; when version `n` is published, the documents
//! parked for `n + 1` are tried next.

use std::collections::HashMap;

use vouch_types::{Did, DidDocument, Fingerprint, Timestamp};

/// A replicated record waiting for the record it supersedes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingRecord {
    pub multihash: Fingerprint,
    pub record_bytes: Vec<u8>,
    pub anchor: Option<String>,
}

#[derive(Clone, Debug)]
struct Parked {
    record: PendingRecord,
    received_at: Timestamp,
}

/// Bounded map of `predecessor -> waiting records`.
pub struct OrphanQueue {
    entries: HashMap<Fingerprint, Vec<Parked>>,
    count: usize,
    max_size: usize,
}

impl OrphanQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            count: 0,
            max_size,
        }
    }

    /// Park `record` until `predecessor` is admitted.
    ///
    /// Returns `false` when the queue is full or the same record is already
    /// waiting on that predecessor.
    pub fn insert(&mut self, predecessor: Fingerprint, record: PendingRecord, now: Timestamp) -> bool {
        if self.count >= self.max_size {
            return false;
        }
        let waiting = self.entries.entry(predecessor).or_default();
        if waiting.iter().any(|p| p.record.multihash == record.multihash) {
            return false;
        }
        waiting.push(Parked {
            record,
            received_at: now,
        });
        self.count += 1;
        true
    }

    /// Remove and return every record waiting for `predecessor`.
    pub fn take_dependents(&mut self, predecessor: &Fingerprint) -> Vec<PendingRecord> {
        match self.entries.remove(predecessor) {
            Some(parked) => {
                self.count -= parked.len();
                parked.into_iter().map(|p| p.record).collect()
            }
            None => Vec::new(),
        }
    }

    /// Drop entries older than `max_age_secs`. Returns how many were removed.
    pub fn clear_expired(&mut self, max_age_secs: u64, now: Timestamp) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, parked| {
            let before = parked.len();
            parked.retain(|p| p.received_at.elapsed_since(now) < max_age_secs);
            removed += before - parked.len();
            !parked.is_empty()
        });
        self.count -= removed;
        removed
    }

    pub fn contains(&self, predecessor: &Fingerprint) -> bool {
        self.entries.contains_key(predecessor)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.count = 0;
    }
}

#[derive(Clone, Debug)]
struct ParkedDocument {
    document: DidDocument,
    received_at: Timestamp,
}

/// Bounded map of `(did, version) -> candidate documents`.
///
/// Several candidates may wait for the same slot: none of them can be
/// verified until the previous version's key is known, so a forged document
/// must not be able to evict the real one.
pub struct PendingDocuments {
    entries: HashMap<(Did, u64), Vec<ParkedDocument>>,
    count: usize,
    max_size: usize,
}

impl PendingDocuments {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            count: 0,
            max_size,
        }
    }

    /// Park `document` until the version before it is published.
    ///
    /// Returns `false` when the queue is full or the identical document is
    /// already waiting.
    pub fn insert(&mut self, document: DidDocument, now: Timestamp) -> bool {
        if self.count >= self.max_size {
            return false;
        }
        let slot = self
            .entries
            .entry((document.id.clone(), document.version))
            .or_default();
        if slot.iter().any(|p| p.document == document) {
            return false;
        }
        slot.push(ParkedDocument {
            document,
            received_at: now,
        });
        self.count += 1;
        true
    }

    /// Remove and return every candidate for `version` of `did`, oldest first.
    pub fn take(&mut self, did: &Did, version: u64) -> Vec<DidDocument> {
        match self.entries.remove(&(did.clone(), version)) {
            Some(parked) => {
                self.count -= parked.len();
                parked.into_iter().map(|p| p.document).collect()
            }
            None => Vec::new(),
        }
    }

    /// Drop candidates older than `max_age_secs`. Returns how many were removed.
    pub fn clear_expired(&mut self, max_age_secs: u64, now: Timestamp) -> usize {
        let mut removed = 0;
        self.entries.retain(|_, parked| {
            let before = parked.len();
            parked.retain(|p| p.received_at.elapsed_since(now) < max_age_secs);
            removed += before - parked.len();
            !parked.is_empty()
        });
        self.count -= removed;
        removed
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}
