//! Broadcast-on-write and validate-on-receive replication.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;
use vouch_network::{decode, encode, Envelope, Inbound, MessageDedup, NetworkError, ReplicationMessage, Transport};
use vouch_types::{DidDocument, Fingerprint, NetworkId};
use vouch_utils::Clock;

use crate::identity::{IdentityRegistry, PublishOutcome};
use crate::metrics::NodeMetrics;
use crate::orphans::PendingRecord;
use crate::records::{ReceiveOutcome, ReviewRecordStore};
use crate::{IdentityError, RecordError};

/// Wraps messages in envelopes stamped with this node's origin and network.
pub struct Publisher {
    transport: Arc<dyn Transport>,
    network: NetworkId,
    origin: String,
    clock: Arc<dyn Clock>,
}

impl Publisher {
    pub fn new(transport: Arc<dyn Transport>, network: NetworkId, origin: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            transport,
            network,
            origin,
            clock,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub async fn publish(&self, message: ReplicationMessage) -> Result<(), NetworkError> {
        let kind = message.kind();
        let envelope = Envelope::new(self.network, self.origin.clone(), self.clock.now(), message);
        let bytes = encode(&envelope)?;
        tracing::debug!(kind, size = bytes.len(), "publishing envelope");
        self.transport.publish(bytes).await
    }

    pub async fn publish_record(
        &self,
        multihash: Fingerprint,
        record_bytes: Vec<u8>,
        anchor: Option<String>,
    ) -> Result<(), NetworkError> {
        self.publish(ReplicationMessage::RecordPublished {
            multihash,
            record_bytes,
            anchor,
        })
        .await
    }

    pub async fn publish_did(&self, document: DidDocument) -> Result<(), NetworkError> {
        self.publish(ReplicationMessage::DidPublished { document }).await
    }
}

/// What a node re-broadcast in answer to a [`ReplicationMessage::SyncRequest`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SyncAnswer {
    pub documents: usize,
    pub records: usize,
}

/// What happened to one inbound payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
    Duplicate,
    /// Undecodable, oversized, or from another network or protocol version.
    Dropped,
    OwnMessage,
    Did(Option<PublishOutcome>),
    Record(Option<ReceiveOutcome>),
    Sync(Option<SyncAnswer>),
}

/// Receives envelopes from the transport and dispatches their messages.
pub struct Replicator {
    network: NetworkId,
    origin: String,
    dedup: Mutex<MessageDedup>,
    registry: Arc<IdentityRegistry>,
    records: Arc<ReviewRecordStore>,
    publisher: Arc<Publisher>,
    in_flight: Arc<Semaphore>,
    max_in_flight: usize,
    metrics: Arc<NodeMetrics>,
}

impl Replicator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        network: NetworkId,
        origin: String,
        dedup_capacity: usize,
        max_in_flight: usize,
        registry: Arc<IdentityRegistry>,
        records: Arc<ReviewRecordStore>,
        publisher: Arc<Publisher>,
        metrics: Arc<NodeMetrics>,
    ) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            network,
            origin,
            dedup: Mutex::new(MessageDedup::new(dedup_capacity)),
            registry,
            records,
            publisher,
            in_flight: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            metrics,
        }
    }

    /// Messages currently being processed by [`Replicator::run`].
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.in_flight.available_permits()
    }

    /// Handle one encoded envelope. Failures are logged and counted here.
    pub async fn handle(&self, payload: &[u8]) -> Delivery {
        if self.dedup.lock().unwrap_or_else(|e| e.into_inner()).check_payload(payload) {
            tracing::trace!("duplicate envelope");
            return Delivery::Duplicate;
        }

        let envelope = match decode(payload).and_then(|env| env.check_compatible(self.network).map(|_| env)) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!(error = %e, size = payload.len(), "dropping envelope");
                self.metrics.envelopes_dropped.inc();
                return Delivery::Dropped;
            }
        };
        if envelope.header.origin == self.origin {
            return Delivery::OwnMessage;
        }

        let origin = envelope.header.origin;
        match envelope.message {
            ReplicationMessage::DidPublished { document } => match self.registry.publish(&document) {
                Ok(outcome) => {
                    if outcome == PublishOutcome::Published {
                        self.metrics.dids_published.inc();
                    }
                    tracing::debug!(%origin, did = %document.id, version = document.version, ?outcome, "replicated DID document");
                    Delivery::Did(Some(outcome))
                }
                Err(e) => {
                    tracing::warn!(%origin, did = %document.id, error = %e, "rejected DID document");
                    Delivery::Did(None)
                }
            },
            ReplicationMessage::RecordPublished {
                multihash,
                record_bytes,
                anchor,
            } => {
                let started = Instant::now();
                let pending = PendingRecord {
                    multihash,
                    record_bytes,
                    anchor,
                };
                let result = self.records.receive_replicated(pending).await;
                self.metrics
                    .validation_time_ms
                    .observe(started.elapsed().as_secs_f64() * 1000.0);
                match result {
                    Ok(outcome) => {
                        tracing::debug!(%origin, %multihash, ?outcome, "replicated record");
                        Delivery::Record(Some(outcome))
                    }
                    Err(e) => {
                        if matches!(e, RecordError::Identity(IdentityError::ResolveTimeout { .. })) {
                            // A re-broadcast of the same envelope gets another try.
                            self.dedup.lock().unwrap_or_else(|e| e.into_inner()).forget_payload(payload);
                            self.metrics.did_wait_timeouts.inc();
                        }
                        tracing::warn!(%origin, %multihash, error = %e, "rejected replicated record");
                        self.metrics.records_rejected.inc();
                        Delivery::Record(None)
                    }
                }
            }
            ReplicationMessage::SyncRequest => match self.answer_sync().await {
                Ok(answer) => {
                    tracing::info!(%origin, documents = answer.documents, records = answer.records, "answered sync request");
                    Delivery::Sync(Some(answer))
                }
                Err(e) => {
                    tracing::warn!(%origin, error = %e, "failed to answer sync request");
                    Delivery::Sync(None)
                }
            },
        }
    }

    /// Re-broadcast every DID history, then every indexed record in
    /// insertion order, so a joining peer can catch up.
    async fn answer_sync(&self) -> Result<SyncAnswer, RecordError> {
        let documents = self.registry.all_documents()?;
        let records = self.records.replication_log()?;
        let answer = SyncAnswer {
            documents: documents.len(),
            records: records.len(),
        };
        for document in documents {
            self.publisher.publish_did(document).await?;
        }
        for record in records {
            self.publisher
                .publish_record(record.multihash, record.record_bytes, record.anchor)
                .await?;
        }
        Ok(answer)
    }

    /// Receive loop. Each payload is handled on its own task so a record
    /// waiting on an unknown DID blocks nothing else. At most
    /// `max_in_flight` payloads are handled at once; past that the loop stops
    /// reading the transport. In-flight tasks are aborted on shutdown.
    pub async fn run(self: Arc<Self>, mut inbound: Inbound, mut shutdown: broadcast::Receiver<()>) {
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("replication receiver shutting down");
                    break;
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            tracing::error!(error = %e, "replication task panicked");
                        }
                    }
                    self.metrics.replication_in_flight.set(self.in_flight() as i64);
                }
                received = inbound.recv() => match received {
                    Ok(payload) => {
                        let permit = tokio::select! {
                            biased;
                            _ = shutdown.recv() => {
                                tracing::info!("replication receiver shutting down");
                                break;
                            }
                            permit = Arc::clone(&self.in_flight).acquire_owned() => match permit {
                                Ok(permit) => permit,
                                Err(_) => break,
                            },
                        };
                        self.metrics.replication_in_flight.set(self.in_flight() as i64);
                        let this = Arc::clone(&self);
                        tasks.spawn(async move {
                            let _permit = permit;
                            this.handle(&payload).await;
                        });
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "replication receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::info!("transport closed");
                        break;
                    }
                },
            }
        }
        if !tasks.is_empty() {
            tracing::debug!(in_flight = tasks.len(), "aborting replication tasks");
        }
        tasks.abort_all();
        self.metrics.replication_in_flight.set(0);
    }
}
