//! The Vouch node: wires storage, identity, validation and replication together.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use vouch_anchor::{AnchorVerifier, ChainOracle, HttpChainOracle};
use vouch_network::{ReplicationMessage, Transport};
use vouch_nullables::{NullContentStore, NullDidStore, NullIndexStore};
use vouch_store::{ContentStore, DidStore, IndexStore};
use vouch_store_lmdb::LmdbEnvironment;
use vouch_types::{Did, DidDocument, Fingerprint, KeyPair, ListResult, Page, ReviewRecord};
use vouch_utils::{Clock, SystemClock};

use crate::config::{NodeConfig, StorageBackend};
use crate::identity::{IdentityRegistry, NodeIdentity, PublishOutcome};
use crate::index::ReplicationIndex;
use crate::metrics::NodeMetrics;
use crate::notifier::{RecordUpdated, UpdateNotifier};
use crate::pinning::{PinHook, PinningService};
use crate::records::{ReadOptions, RecordView, ReviewRecordStore, ReviewRow, StoreOptions};
use crate::replication::{Delivery, Publisher, Replicator};
use crate::shutdown::NodeTasks;
use crate::validation::{AllowList, DidWait, Validator};
use crate::{IdentityError, NodeError, RecordError};

/// Maximum time to wait for background tasks during shutdown.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// How often expired parked updates and DID documents are swept.
const ORPHAN_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// External collaborators of a node.
pub struct NodeServices {
    pub content: Arc<dyn ContentStore>,
    pub index: Arc<dyn IndexStore>,
    pub dids: Arc<dyn DidStore>,
    pub oracle: Arc<dyn ChainOracle>,
    pub transport: Arc<dyn Transport>,
    pub clock: Arc<dyn Clock>,
    /// Held so the environment can be flushed on stop.
    pub lmdb: Option<Arc<LmdbEnvironment>>,
}

impl NodeServices {
    /// Build the services named by `config`: LMDB under `data_dir/lmdb` or
    /// in-memory stores, and the HTTP chain oracle.
    pub fn open(config: &NodeConfig, transport: Arc<dyn Transport>) -> Result<Self, NodeError> {
        let oracle: Arc<dyn ChainOracle> = Arc::new(HttpChainOracle::new(&config.anchor.api_url));
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        match config.storage {
            StorageBackend::Lmdb => {
                let path = config.data_dir.join("lmdb");
                let env = Arc::new(LmdbEnvironment::open(&path, config.map_size)?);
                tracing::info!(path = %path.display(), "opened LMDB storage");
                Ok(Self {
                    content: Arc::new(env.content_store()),
                    index: Arc::new(env.index_store()),
                    dids: Arc::new(env.did_store()),
                    oracle,
                    transport,
                    clock,
                    lmdb: Some(env),
                })
            }
            StorageBackend::Memory => Ok(Self {
                content: Arc::new(NullContentStore::new()),
                index: Arc::new(NullIndexStore::new()),
                dids: Arc::new(NullDidStore::new()),
                oracle,
                transport,
                clock,
                lmdb: None,
            }),
        }
    }
}

pub struct VouchNode {
    pub config: NodeConfig,
    identity: Arc<NodeIdentity>,
    registry: Arc<IdentityRegistry>,
    index: Arc<ReplicationIndex>,
    pinning: Arc<PinningService>,
    notifier: Arc<UpdateNotifier>,
    records: Arc<ReviewRecordStore>,
    publisher: Arc<Publisher>,
    replicator: Arc<Replicator>,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    metrics: Arc<NodeMetrics>,
    lmdb: Option<Arc<LmdbEnvironment>>,
    tasks: NodeTasks,
    started: bool,
}

impl VouchNode {
    /// Assemble a node from explicit services and signing key.
    pub fn new(config: NodeConfig, services: NodeServices, keypair: KeyPair) -> Result<Self, NodeError> {
        let identity = Arc::new(NodeIdentity::from_keypair(keypair));
        let metrics = Arc::new(NodeMetrics::new());
        let clock = services.clock;

        let index = Arc::new(ReplicationIndex::new(services.index, &config.index));
        if config.index.clear_on_start {
            index.clear()?;
        }
        let registry = Arc::new(IdentityRegistry::new(
            services.dids,
            clock.clone(),
            config.pending_document_capacity,
        ));
        let anchors = Arc::new(AnchorVerifier::new(
            services.oracle,
            Duration::from_secs(config.anchor.cache_ttl_secs),
        ));
        let validator = Arc::new(Validator::new(
            registry.clone(),
            anchors,
            index.clone(),
            AllowList::from_config(&config.allowed_unverified_review_issuers),
            identity.did.clone(),
        ));
        let pinning = Arc::new(PinningService::new(
            services.content.clone(),
            config.role.pins_everything(),
        ));
        let notifier = Arc::new(UpdateNotifier::new(
            index.clone(),
            services.content.clone(),
            metrics.clone(),
        ));
        let origin = identity.did.to_string();
        let publisher = Arc::new(Publisher::new(
            services.transport.clone(),
            config.network,
            origin.clone(),
            clock.clone(),
        ));
        let records = Arc::new(ReviewRecordStore::new(
            config.role,
            identity.clone(),
            services.content,
            index.clone(),
            validator,
            pinning.clone(),
            notifier.clone(),
            publisher.clone(),
            config.orphan_capacity,
            DidWait::Bounded(Duration::from_millis(config.did_wait_timeout_ms)),
            clock.clone(),
            metrics.clone(),
        ));
        let replicator = Arc::new(Replicator::new(
            config.network,
            origin,
            config.dedup_capacity,
            config.max_inflight_messages,
            registry.clone(),
            records.clone(),
            publisher.clone(),
            metrics.clone(),
        ));
        metrics.index_size.set(index.len()? as i64);

        tracing::info!(
            did = %identity.did,
            role = ?config.role,
            network = %config.network,
            "node assembled"
        );

        Ok(Self {
            config,
            identity,
            registry,
            index,
            pinning,
            notifier,
            records,
            publisher,
            replicator,
            transport: services.transport,
            clock,
            metrics,
            lmdb: services.lmdb,
            tasks: NodeTasks::new(),
            started: false,
        })
    }

    /// Open a node from configuration, loading or creating its identity
    /// under `data_dir`.
    pub fn open(config: NodeConfig, transport: Arc<dyn Transport>) -> Result<Self, NodeError> {
        let identity = NodeIdentity::load_or_create(&config.data_dir)?;
        let services = NodeServices::open(&config, transport)?;
        Self::new(config, services, identity.keypair)
    }

    /// Publish this node's DID, ask peers for what it missed, and start the
    /// replication receiver and the sweeper.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        if self.started {
            return Err(NodeError::AlreadyStarted);
        }
        self.started = true;
        tracing::info!(did = %self.identity.did, "Vouch node starting");

        // Subscribe before announcing so replies are not missed.
        let inbound = self.transport.subscribe();
        let replicator = Arc::clone(&self.replicator);
        self.tasks
            .spawn("replicator", move |shutdown| replicator.run(inbound, shutdown));

        let genesis = self.identity.genesis_document(self.clock.now())?;
        match self.registry.publish(&genesis) {
            Ok(_) => {}
            // A restarted node already holds its own history.
            Err(IdentityError::StaleDocument { .. }) => {
                tracing::debug!("node DID already published");
            }
            Err(e) => return Err(e.into()),
        }
        let current = self.registry.resolve(&self.identity.did, false).await?;
        self.publisher.publish_did(current).await?;
        self.publisher.publish(ReplicationMessage::SyncRequest).await?;

        let records = Arc::clone(&self.records);
        let registry = Arc::clone(&self.registry);
        let max_age = self.config.orphan_max_age_secs;
        self.tasks.spawn_periodic("sweeper", ORPHAN_SWEEP_INTERVAL, move || {
            let records_removed = records.expire_orphans(max_age);
            let documents_removed = registry.expire_pending(max_age);
            if records_removed > 0 || documents_removed > 0 {
                tracing::debug!(
                    records_removed,
                    documents_removed,
                    remaining = records.orphan_count(),
                    "expired parked updates"
                );
            }
        });

        tracing::info!("Vouch node started");
        Ok(())
    }

    /// Signal shutdown, wait for background tasks and flush storage.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("Vouch node stopping");
        let aborted = self.tasks.shutdown(SHUTDOWN_TIMEOUT).await;
        if !aborted.is_empty() {
            tracing::warn!(?aborted, "shutdown timeout ({:?}), tasks aborted", SHUTDOWN_TIMEOUT);
        }

        if let Some(env) = &self.lmdb {
            if let Err(e) = env.sync() {
                tracing::warn!("LMDB sync failed: {e}");
            } else {
                tracing::info!("LMDB flushed to disk");
            }
        }
        self.started = false;
        tracing::info!("Vouch node stopped");
        Ok(())
    }

    /// Replicated messages currently being processed.
    pub fn replication_in_flight(&self) -> usize {
        self.replicator.in_flight()
    }

    pub fn did(&self) -> &Did {
        &self.identity.did
    }

    pub fn metrics(&self) -> &NodeMetrics {
        &self.metrics
    }

    // ── Review records ─────────────────────────────────────────────────

    pub async fn store_review_record(&self, record: ReviewRecord, options: StoreOptions) -> Result<Fingerprint, RecordError> {
        self.records.store(record, options).await
    }

    pub async fn read_review_record(&self, fingerprint: Fingerprint, options: ReadOptions) -> Result<RecordView, RecordError> {
        self.records.read(fingerprint, options).await
    }

    pub fn get_review_list(&self, page: &Page) -> Result<ListResult<ReviewRow>, RecordError> {
        self.records.get_review_list(page)
    }

    pub fn get_reviews_written_by_did(&self, did: &Did, page: &Page) -> Result<ListResult<ReviewRow>, RecordError> {
        self.records.get_reviews_written_by(did, page)
    }

    pub fn get_reviews_about_did(&self, did: &Did, page: &Page) -> Result<ListResult<ReviewRow>, RecordError> {
        self.records.get_reviews_about(did, page)
    }

    pub async fn import_unverified_reviews(&self, records: Vec<ReviewRecord>) -> Result<Vec<Fingerprint>, RecordError> {
        self.records.import_unverified(records).await
    }

    // ── Identities ─────────────────────────────────────────────────────

    /// Publish a DID document, optionally broadcasting it to peers.
    pub async fn publish_did(&self, document: DidDocument, broadcast: bool) -> Result<PublishOutcome, NodeError> {
        let outcome = self.registry.publish(&document)?;
        if outcome == PublishOutcome::Published {
            self.metrics.dids_published.inc();
        }
        if broadcast {
            self.publisher.publish_did(document).await?;
        }
        Ok(outcome)
    }

    pub async fn get_did(&self, did: &Did, wait_for_replication: bool) -> Result<DidDocument, IdentityError> {
        self.registry.resolve(did, wait_for_replication).await
    }

    pub fn did_history(&self, did: &Did) -> Result<Vec<DidDocument>, IdentityError> {
        self.registry.history(did)
    }

    // ── Notifications and pinning ──────────────────────────────────────

    /// The `reviewrecord/updated` event stream.
    pub fn events(&self) -> broadcast::Receiver<RecordUpdated> {
        self.notifier.subscribe()
    }

    /// One-shot watch on `fingerprint`; see [`UpdateNotifier::watch`].
    pub fn watch<F>(&self, fingerprint: Fingerprint, callback: F) -> Result<(), RecordError>
    where
        F: FnOnce(RecordUpdated) + Send + 'static,
    {
        Ok(self.notifier.watch(fingerprint, callback)?)
    }

    pub fn set_pin_hook(&self, hook: Option<PinHook>) {
        self.pinning.set_hook(hook);
    }

    pub fn pinning(&self) -> &PinningService {
        &self.pinning
    }

    pub fn index(&self) -> &ReplicationIndex {
        &self.index
    }

    /// Handle one encoded envelope as if it arrived from the transport.
    pub async fn on_receive(&self, payload: &[u8]) -> Delivery {
        self.replicator.handle(payload).await
    }
}
