//! Blockchain anchor verification.
//!
//! A review record is anchored when a public blockchain transaction carries an
//! output whose data payload equals the record's multihash. The chain itself is
//! reached through a [`ChainOracle`]; this crate only fetches transactions,
//! caches them, and matches outputs.

pub mod cache;
pub mod error;
pub mod http;
pub mod verifier;

pub use cache::TransactionCache;
pub use error::AnchorError;
pub use http::HttpChainOracle;
pub use verifier::{AnchorConfirmation, AnchorVerifier, DEFAULT_CACHE_TTL};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One output of a chain transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub value: u64,
    pub address: Option<String>,
    /// Payload of a data-carrier output.
    pub data: Option<Vec<u8>>,
}

/// A decoded chain transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTransaction {
    pub txid: String,
    pub outputs: Vec<TxOutput>,
}

/// Read access to a blockchain.
#[async_trait]
pub trait ChainOracle: Send + Sync {
    /// Look up a transaction. `Ok(None)` means the chain does not know it.
    async fn get_transaction(&self, txid: &str) -> Result<Option<ChainTransaction>, AnchorError>;

    /// Human-readable name of this oracle.
    fn name(&self) -> &str;
}
