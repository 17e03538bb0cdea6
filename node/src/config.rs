//! Node configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use vouch_types::NetworkId;

use crate::NodeError;

/// What a node does in the network.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// A client that authors and reads its own reviews.
    Customer,
    /// The archival service: pins every admitted record and never collects garbage.
    Collector,
    /// A read-only query node.
    Gateway,
}

impl NodeRole {
    pub fn can_author(&self) -> bool {
        !matches!(self, NodeRole::Gateway)
    }

    pub fn pins_everything(&self) -> bool {
        matches!(self, NodeRole::Collector)
    }
}

/// Where records, the index and DID documents are persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Lmdb,
    Memory,
}

/// Replication index operating modes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// When false the index only serves what it already holds.
    #[serde(default = "default_true")]
    pub writes_enabled: bool,

    /// When false replicated records are admitted after the structural check only.
    #[serde(default = "default_true")]
    pub validation_enabled: bool,

    /// Drop the whole index when the node starts.
    #[serde(default)]
    pub clear_on_start: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            writes_enabled: true,
            validation_enabled: true,
            clear_on_start: false,
        }
    }
}

/// Blockchain anchor verification settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Base URL of the BlockCypher-style REST API.
    #[serde(default = "default_anchor_api_url")]
    pub api_url: String,

    /// How long a fetched transaction stays cached, in seconds.
    #[serde(default = "default_anchor_ttl_secs")]
    pub cache_ttl_secs: u64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            api_url: default_anchor_api_url(),
            cache_ttl_secs: default_anchor_ttl_secs(),
        }
    }
}

/// Configuration for a Vouch node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_role")]
    pub role: NodeRole,

    /// Which network to replicate with.
    #[serde(default = "default_network")]
    pub network: NetworkId,

    /// Data directory for storage and the node identity key.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_storage")]
    pub storage: StorageBackend,

    /// LMDB map size in bytes.
    #[serde(default = "default_map_size")]
    pub map_size: usize,

    /// DIDs allowed to issue unverified reviews. `"*"` admits any issuer.
    #[serde(default = "default_allowed_issuers")]
    pub allowed_unverified_review_issuers: Vec<String>,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub anchor: AnchorConfig,

    /// Number of recent envelope hashes remembered for deduplication.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,

    /// Maximum replicated updates parked while their predecessor is missing.
    #[serde(default = "default_orphan_capacity")]
    pub orphan_capacity: usize,

    /// Seconds a parked update waits before it is dropped.
    #[serde(default = "default_orphan_max_age_secs")]
    pub orphan_max_age_secs: u64,

    /// Maximum DID documents parked while an earlier version is missing.
    #[serde(default = "default_pending_document_capacity")]
    pub pending_document_capacity: usize,

    /// Replicated messages processed concurrently. Further messages wait
    /// on the transport until a slot frees up.
    #[serde(default = "default_max_inflight_messages")]
    pub max_inflight_messages: usize,

    /// How long a replicated record may wait for its signer's DID, in
    /// milliseconds. Local stores wait without limit.
    #[serde(default = "default_did_wait_timeout_ms")]
    pub did_wait_timeout_ms: u64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to keep a Prometheus registry for this node.
    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_role() -> NodeRole {
    NodeRole::Customer
}

fn default_network() -> NetworkId {
    NetworkId::Staging
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./vouch_data")
}

fn default_storage() -> StorageBackend {
    StorageBackend::Lmdb
}

fn default_map_size() -> usize {
    1 << 30
}

fn default_allowed_issuers() -> Vec<String> {
    Vec::new()
}

fn default_true() -> bool {
    true
}

fn default_anchor_api_url() -> String {
    vouch_anchor::http::BLOCKCYPHER_TESTNET_URL.to_string()
}

fn default_anchor_ttl_secs() -> u64 {
    vouch_anchor::DEFAULT_CACHE_TTL.as_secs()
}

fn default_dedup_capacity() -> usize {
    vouch_network::DEFAULT_DEDUP_CAPACITY
}

fn default_orphan_capacity() -> usize {
    4096
}

fn default_orphan_max_age_secs() -> u64 {
    3600
}

fn default_pending_document_capacity() -> usize {
    1024
}

fn default_max_inflight_messages() -> usize {
    256
}

fn default_did_wait_timeout_ms() -> u64 {
    120_000
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// In-memory configuration for a node of the given role.
    pub fn in_memory(role: NodeRole) -> Self {
        Self {
            role,
            storage: StorageBackend::Memory,
            ..Self::default()
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            role: default_role(),
            network: default_network(),
            data_dir: default_data_dir(),
            storage: default_storage(),
            map_size: default_map_size(),
            allowed_unverified_review_issuers: default_allowed_issuers(),
            index: IndexConfig::default(),
            anchor: AnchorConfig::default(),
            dedup_capacity: default_dedup_capacity(),
            orphan_capacity: default_orphan_capacity(),
            orphan_max_age_secs: default_orphan_max_age_secs(),
            pending_document_capacity: default_pending_document_capacity(),
            max_inflight_messages: default_max_inflight_messages(),
            did_wait_timeout_ms: default_did_wait_timeout_ms(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = NodeConfig::from_toml_str(&toml_str).expect("should parse");
        assert_eq!(parsed.role, config.role);
        assert_eq!(parsed.index, config.index);
        assert_eq!(parsed.anchor, config.anchor);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").expect("empty toml should use defaults");
        assert_eq!(config.role, NodeRole::Customer);
        assert_eq!(config.storage, StorageBackend::Lmdb);
        assert_eq!(config.anchor.cache_ttl_secs, 600);
        assert_eq!(config.orphan_capacity, 4096);
        assert_eq!(config.max_inflight_messages, 256);
        assert_eq!(config.did_wait_timeout_ms, 120_000);
        assert!(config.index.writes_enabled);
        assert!(config.allowed_unverified_review_issuers.is_empty());
        assert_eq!(config.log_format, "human");
    }

    #[test]
    fn partial_toml_overrides() {
        let toml = r#"
            role = "collector"
            network = "experimental"
            allowed_unverified_review_issuers = ["*"]

            [index]
            validation_enabled = false

            [anchor]
            cache_ttl_secs = 30
        "#;
        let config = NodeConfig::from_toml_str(toml).expect("should parse");
        assert_eq!(config.role, NodeRole::Collector);
        assert_eq!(config.network, NetworkId::Experimental);
        assert!(!config.index.validation_enabled);
        assert!(config.index.writes_enabled);
        assert_eq!(config.anchor.cache_ttl_secs, 30);
        assert_eq!(config.allowed_unverified_review_issuers, vec!["*".to_string()]);
    }

    #[test]
    fn roles() {
        assert!(NodeRole::Customer.can_author());
        assert!(!NodeRole::Gateway.can_author());
        assert!(NodeRole::Collector.pins_everything());
        assert!(!NodeRole::Customer.pins_everything());
    }

    #[test]
    fn missing_file_returns_config_error() {
        let result = NodeConfig::from_toml_file("/nonexistent/vouch.toml");
        assert!(matches!(result, Err(NodeError::Config(_))));
    }
}
