//! Review record store: validates, persists and versions review records.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use vouch_anchor::AnchorConfirmation;
use vouch_crypto::{fingerprint_of, sign_as_customer, sign_as_issuer};
use vouch_store::{AnchorRecord, ContentStore};
use vouch_types::index::MAX_PAGE_SIZE;
use vouch_types::{Did, Fingerprint, IndexEntry, ListResult, Page, ReviewRecord};
use vouch_utils::Clock;

use crate::config::NodeRole;
use crate::identity::NodeIdentity;
use crate::index::ReplicationIndex;
use crate::metrics::NodeMetrics;
use crate::notifier::UpdateNotifier;
use crate::orphans::{OrphanQueue, PendingRecord};
use crate::pinning::PinningService;
use crate::replication::Publisher;
use crate::validation::{check_structure, DidWait, Validator};
use crate::RecordError;

/// Options for [`ReviewRecordStore::store`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreOptions {
    /// Broadcast the record to peers once stored.
    pub publish: bool,
    /// Transaction claimed to anchor the record's fingerprint.
    pub bitcoin_transaction_hash: Option<String>,
    /// Fail with `FingerprintMismatch` unless the record hashes to this.
    pub expected_multihash: Option<Fingerprint>,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            publish: true,
            bitcoin_transaction_hash: None,
            expected_multihash: None,
        }
    }
}

/// Options for [`ReviewRecordStore::read`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadOptions {
    /// Follow successor pointers to the newest version.
    pub get_latest_version: bool,
    /// Feed the next update of the returned record into the event stream.
    pub check_for_updates: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            get_latest_version: true,
            check_for_updates: false,
        }
    }
}

/// A record as seen by this node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordView {
    pub multihash: Fingerprint,
    pub requested_multihash: Fingerprint,
    pub record: ReviewRecord,
    /// Whether this node may publish a new version of the record.
    pub editable: bool,
    pub got_latest_version: bool,
    pub watching: bool,
    /// Transaction confirmed to anchor the record, if any.
    pub anchor: Option<String>,
}

/// One row of a review listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRow {
    pub entry: IndexEntry,
    /// `None` when the content is not available on this node.
    pub record: Option<ReviewRecord>,
}

/// Result of processing a replicated record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReceiveOutcome {
    Admitted,
    AlreadyKnown,
    /// Waiting in the orphan queue for `predecessor`.
    Parked { predecessor: Fingerprint },
    /// Not processed: index writes are disabled or the orphan queue is full.
    Skipped,
}

pub struct ReviewRecordStore {
    role: NodeRole,
    identity: Arc<NodeIdentity>,
    content: Arc<dyn ContentStore>,
    index: Arc<ReplicationIndex>,
    validator: Arc<Validator>,
    pinning: Arc<PinningService>,
    notifier: Arc<UpdateNotifier>,
    publisher: Arc<Publisher>,
    orphans: Mutex<OrphanQueue>,
    /// Bound on how long a replicated record waits for its signers.
    replication_wait: DidWait,
    clock: Arc<dyn Clock>,
    metrics: Arc<NodeMetrics>,
}

impl ReviewRecordStore {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        role: NodeRole,
        identity: Arc<NodeIdentity>,
        content: Arc<dyn ContentStore>,
        index: Arc<ReplicationIndex>,
        validator: Arc<Validator>,
        pinning: Arc<PinningService>,
        notifier: Arc<UpdateNotifier>,
        publisher: Arc<Publisher>,
        orphan_capacity: usize,
        replication_wait: DidWait,
        clock: Arc<dyn Clock>,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        Self {
            role,
            identity,
            content,
            index,
            validator,
            pinning,
            notifier,
            publisher,
            orphans: Mutex::new(OrphanQueue::new(orphan_capacity)),
            replication_wait,
            clock,
            metrics,
        }
    }

    fn own_did(&self) -> &Did {
        &self.identity.did
    }

    /// Sign whatever this node is expected to sign and the record lacks.
    fn fill_signatures(&self, record: &mut ReviewRecord) -> Result<(), RecordError> {
        let did = &self.identity.did;
        let keypair = &self.identity.keypair;
        if record.issuer.is_none() {
            record.issuer = Some(did.clone());
        }
        if record.verifiable && record.customer_signature.is_none() {
            sign_as_customer(record, did, keypair)?;
        }
        if record.issuer_signature.is_none() && record.issuer.as_ref() == Some(did) {
            sign_as_issuer(record, did, keypair)?;
        }
        Ok(())
    }

    /// Validate, persist and optionally publish a record authored on this node.
    pub async fn store(&self, mut record: ReviewRecord, options: StoreOptions) -> Result<Fingerprint, RecordError> {
        if !self.role.can_author() || !self.index.writes_enabled() {
            return Err(RecordError::ReadOnly);
        }
        self.fill_signatures(&mut record)?;

        let bytes = record.canonical_bytes()?;
        let fingerprint = fingerprint_of(&bytes);
        if let Some(expected) = options.expected_multihash {
            if expected != fingerprint {
                return Err(RecordError::FingerprintMismatch {
                    expected,
                    actual: fingerprint,
                });
            }
        }

        check_structure(&record)?;
        let anchor = options.bitcoin_transaction_hash.as_deref();
        let confirmation = self.validator.validate(&fingerprint, &record, anchor, DidWait::Unbounded).await?;

        self.content.put(&bytes)?;
        let inserted = self.admit(fingerprint, &record, confirmation.as_ref())?;
        self.metrics.records_stored.inc();
        tracing::info!(%fingerprint, inserted, verifiable = record.verifiable, "stored review record");
        if inserted {
            self.release_orphans(fingerprint).await;
        }

        if options.publish {
            let anchor = confirmation.map(|c| c.txid);
            if let Err(e) = self.publisher.publish_record(fingerprint, bytes, anchor).await {
                tracing::warn!(%fingerprint, error = %e, "failed to broadcast record");
            }
        }
        Ok(fingerprint)
    }

    /// Index a validated record whose content is already stored.
    ///
    /// Returns whether the index entry is new. Anchors and pins are applied
    /// either way; watchers only hear about new entries.
    fn admit(
        &self,
        fingerprint: Fingerprint,
        record: &ReviewRecord,
        confirmation: Option<&AnchorConfirmation>,
    ) -> Result<bool, RecordError> {
        let author = record
            .author()
            .cloned()
            .ok_or_else(|| RecordError::Malformed("record carries no signature".into()))?;
        let now = self.clock.now();
        let entry = IndexEntry {
            multihash: fingerprint,
            author,
            subject: record.subject_did().clone(),
            previous_version: record.previous_version_multihash,
            verifiable: record.verifiable,
            inserted_at: now,
        };
        let inserted = self.index.admit(&entry)?;
        if !inserted && !self.index.contains(&fingerprint)? {
            return Ok(false);
        }

        if let Some(confirmation) = confirmation {
            let anchor = AnchorRecord {
                txid: confirmation.txid.clone(),
                confirmed_at: now,
            };
            if self.index.record_anchor(&fingerprint, &anchor)? {
                tracing::debug!(%fingerprint, txid = %anchor.txid, "anchor recorded");
            }
        }
        if self.pinning.pins_everything() {
            self.pinning.pin(&fingerprint)?;
            self.metrics.pins.inc();
        }
        if inserted {
            self.metrics.records_admitted.inc();
            self.metrics.index_size.set(self.index.len()? as i64);
            if let Some(previous) = record.previous_version_multihash {
                self.notifier.notify_successor(&previous, fingerprint, record);
            }
        }
        Ok(inserted)
    }

    /// Read a record, by default following its update chain to the newest version.
    pub async fn read(&self, requested: Fingerprint, options: ReadOptions) -> Result<RecordView, RecordError> {
        let mut current = requested;
        let mut successors = self.index.successors(&current)?;
        if options.get_latest_version {
            loop {
                if successors.len() > 1 {
                    return Err(RecordError::VersionConflict {
                        at: current,
                        candidates: successors,
                    });
                }
                let Some(next) = successors.first().copied() else {
                    break;
                };
                current = next;
                successors = self.index.successors(&current)?;
            }
        }

        let bytes = self
            .content
            .get(&current)?
            .ok_or(RecordError::NotFound(current))?;
        let record = ReviewRecord::from_canonical_bytes(&bytes)?;
        let anchor = self.index.anchor(&current)?.map(|a| a.txid);
        let got_latest_version = successors.is_empty();
        let editable = record.verifiable
            && record.author() == Some(self.own_did())
            && anchor.is_none()
            && got_latest_version;

        let watching = if options.check_for_updates {
            self.notifier.watch_stream(current)?;
            true
        } else {
            false
        };

        Ok(RecordView {
            multihash: current,
            requested_multihash: requested,
            record,
            editable,
            got_latest_version,
            watching,
            anchor,
        })
    }

    /// Store third-party reviews that carry no proof of purchase, issued by this node.
    pub async fn import_unverified(&self, records: Vec<ReviewRecord>) -> Result<Vec<Fingerprint>, RecordError> {
        let mut fingerprints = Vec::with_capacity(records.len());
        for mut record in records {
            record.verifiable = false;
            record.popr = None;
            record.customer_signature = None;
            record.issuer_signature = None;
            sign_as_issuer(&mut record, &self.identity.did, &self.identity.keypair)?;
            fingerprints.push(self.store(record, StoreOptions::default()).await?);
        }
        tracing::info!(count = fingerprints.len(), "imported unverified reviews");
        Ok(fingerprints)
    }

    fn rows(&self, entries: ListResult<IndexEntry>) -> Result<ListResult<ReviewRow>, RecordError> {
        let mut rows = Vec::with_capacity(entries.rows.len());
        for entry in entries.rows {
            let record = match self.content.get(&entry.multihash)? {
                Some(bytes) => Some(ReviewRecord::from_canonical_bytes(&bytes)?),
                None => None,
            };
            rows.push(ReviewRow { entry, record });
        }
        Ok(ListResult {
            rows,
            count: entries.count,
        })
    }

    pub fn get_review_list(&self, page: &Page) -> Result<ListResult<ReviewRow>, RecordError> {
        self.rows(self.index.list(page)?)
    }

    pub fn get_reviews_written_by(&self, author: &Did, page: &Page) -> Result<ListResult<ReviewRow>, RecordError> {
        self.rows(self.index.get_by_author(author, page)?)
    }

    pub fn get_reviews_about(&self, subject: &Did, page: &Page) -> Result<ListResult<ReviewRow>, RecordError> {
        self.rows(self.index.get_by_subject(subject, page)?)
    }

    /// Every indexed record whose content is held here, in index order, in
    /// the shape it is broadcast in. Used to answer catch-up requests.
    pub fn replication_log(&self) -> Result<Vec<PendingRecord>, RecordError> {
        let mut log = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.index.list(&Page::new(offset, MAX_PAGE_SIZE))?;
            if page.rows.is_empty() {
                return Ok(log);
            }
            offset += page.rows.len();
            for entry in page.rows {
                let Some(record_bytes) = self.content.get(&entry.multihash)? else {
                    continue;
                };
                log.push(PendingRecord {
                    multihash: entry.multihash,
                    record_bytes,
                    anchor: self.index.anchor(&entry.multihash)?.map(|a| a.txid),
                });
            }
        }
    }

    /// Process a record received from a peer, then any parked updates it unblocks.
    pub async fn receive_replicated(&self, pending: PendingRecord) -> Result<ReceiveOutcome, RecordError> {
        let outcome = self.receive_one(&pending).await?;
        match outcome {
            ReceiveOutcome::Admitted => self.release_orphans(pending.multihash).await,
            // The predecessor may have been admitted while this one was parking.
            ReceiveOutcome::Parked { predecessor } if self.index.contains(&predecessor)? => {
                self.release_orphans(predecessor).await
            }
            _ => {}
        }
        Ok(outcome)
    }

    async fn receive_one(&self, pending: &PendingRecord) -> Result<ReceiveOutcome, RecordError> {
        let record = ReviewRecord::from_canonical_bytes(&pending.record_bytes)
            .map_err(|e| RecordError::Malformed(e.to_string()))?;
        if record.canonical_bytes()? != pending.record_bytes {
            return Err(RecordError::Malformed("record bytes are not canonical".into()));
        }
        let fingerprint = fingerprint_of(&pending.record_bytes);
        if fingerprint != pending.multihash {
            return Err(RecordError::FingerprintMismatch {
                expected: pending.multihash,
                actual: fingerprint,
            });
        }

        if self.index.contains(&fingerprint)? {
            if let Some(txid) = &pending.anchor {
                if self.index.anchor(&fingerprint)?.is_none() {
                    let confirmation = self.validator.check_anchor(&fingerprint, txid).await?;
                    self.admit(fingerprint, &record, Some(&confirmation))?;
                }
            }
            return Ok(ReceiveOutcome::AlreadyKnown);
        }
        if !self.index.writes_enabled() {
            return Ok(ReceiveOutcome::Skipped);
        }

        check_structure(&record)?;
        let confirmation = if self.index.validation_enabled() {
            if let Some(predecessor) = record.previous_version_multihash {
                if !self.index.contains(&predecessor)? {
                    return Ok(self.park(predecessor, pending));
                }
            }
            self.validator
                .validate(&fingerprint, &record, pending.anchor.as_deref(), self.replication_wait)
                .await?
        } else {
            None
        };

        self.content.put(&pending.record_bytes)?;
        if self.admit(fingerprint, &record, confirmation.as_ref())? {
            Ok(ReceiveOutcome::Admitted)
        } else {
            Ok(ReceiveOutcome::AlreadyKnown)
        }
    }

    fn park(&self, predecessor: Fingerprint, pending: &PendingRecord) -> ReceiveOutcome {
        let mut orphans = self.orphans.lock().unwrap_or_else(|e| e.into_inner());
        if !orphans.insert(predecessor, pending.clone(), self.clock.now()) {
            tracing::warn!(multihash = %pending.multihash, %predecessor, "orphan queue full, dropping update");
            return ReceiveOutcome::Skipped;
        }
        self.metrics.records_parked.inc();
        self.metrics.orphan_count.set(orphans.len() as i64);
        tracing::debug!(multihash = %pending.multihash, %predecessor, "parked update until predecessor arrives");
        ReceiveOutcome::Parked { predecessor }
    }

    /// Re-process every parked update unblocked by `admitted`, transitively.
    async fn release_orphans(&self, admitted: Fingerprint) {
        let mut ready = VecDeque::from([admitted]);
        while let Some(predecessor) = ready.pop_front() {
            let dependents = {
                let mut orphans = self.orphans.lock().unwrap_or_else(|e| e.into_inner());
                let dependents = orphans.take_dependents(&predecessor);
                self.metrics.orphan_count.set(orphans.len() as i64);
                dependents
            };
            for pending in dependents {
                match self.receive_one(&pending).await {
                    Ok(ReceiveOutcome::Admitted) => {
                        tracing::debug!(multihash = %pending.multihash, %predecessor, "admitted parked update");
                        ready.push_back(pending.multihash);
                    }
                    Ok(outcome) => {
                        tracing::debug!(multihash = %pending.multihash, ?outcome, "parked update not admitted");
                    }
                    Err(e) => {
                        tracing::warn!(multihash = %pending.multihash, error = %e, "rejected parked update");
                        self.metrics.records_rejected.inc();
                    }
                }
            }
        }
    }

    /// Drop parked updates older than `max_age_secs`.
    pub fn expire_orphans(&self, max_age_secs: u64) -> usize {
        let mut orphans = self.orphans.lock().unwrap_or_else(|e| e.into_inner());
        let removed = orphans.clear_expired(max_age_secs, self.clock.now());
        self.metrics.orphan_count.set(orphans.len() as i64);
        removed
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear_orphans(&self) {
        self.orphans.lock().unwrap_or_else(|e| e.into_inner()).clear();
        self.metrics.orphan_count.set(0);
    }
}
