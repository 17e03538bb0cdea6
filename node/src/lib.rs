//! Vouch node: stores, verifies and replicates review records.
//!
//! The node ties together:
//! - the review record store and its validation pipeline
//! - the identity registry of published DID documents
//! - the replication index and its update chains
//! - pinning and update notifications
//! - broadcast-on-write, validate-on-receive replication

pub mod config;
pub mod error;
pub mod identity;
pub mod index;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod notifier;
pub mod orphans;
pub mod pinning;
pub mod records;
pub mod replication;
pub mod shutdown;
pub mod validation;

pub use config::{AnchorConfig, IndexConfig, NodeConfig, NodeRole, StorageBackend};
pub use error::{IdentityError, NodeError, RecordError};
pub use identity::{IdentityRegistry, NodeIdentity, PublishOutcome};
pub use index::ReplicationIndex;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::{NodeServices, VouchNode};
pub use notifier::{RecordUpdated, UpdateNotifier, RECORD_UPDATED_EVENT};
pub use orphans::{OrphanQueue, PendingDocuments, PendingRecord};
pub use pinning::{PinHook, PinningService};
pub use records::{ReadOptions, ReceiveOutcome, RecordView, ReviewRecordStore, ReviewRow, StoreOptions};
pub use replication::{Delivery, Publisher, Replicator, SyncAnswer};
pub use shutdown::{wait_for_signal, NodeTasks};
pub use validation::{check_structure, AllowList, DidWait, Validator};
