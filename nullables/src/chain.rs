//! Nullable chain oracle: a scripted blockchain.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use vouch_anchor::{AnchorError, ChainOracle, ChainTransaction, TxOutput};
use vouch_types::Fingerprint;

/// A chain oracle answering from a map of scripted transactions.
///
/// Counts lookups so tests can observe caching.
#[derive(Default)]
pub struct NullChainOracle {
    transactions: Mutex<HashMap<String, ChainTransaction>>,
    fetches: AtomicU64,
    failing: AtomicBool,
}

impl NullChainOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_transaction(&self, tx: ChainTransaction) {
        self.transactions
            .lock()
            .unwrap()
            .insert(tx.txid.clone(), tx);
    }

    /// Script a transaction with a payment output and a data output carrying
    /// the multihash of `fingerprint`.
    pub fn anchor(&self, txid: &str, fingerprint: &Fingerprint) {
        self.set_transaction(ChainTransaction {
            txid: txid.to_string(),
            outputs: vec![
                TxOutput {
                    value: 10_000,
                    address: Some("mvouchchange".to_string()),
                    data: None,
                },
                TxOutput {
                    value: 0,
                    address: None,
                    data: Some(fingerprint.to_multihash().to_vec()),
                },
            ],
        });
    }

    pub fn remove(&self, txid: &str) {
        self.transactions.lock().unwrap().remove(txid);
    }

    /// Make every lookup fail with [`AnchorError::Oracle`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of lookups served so far.
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainOracle for NullChainOracle {
    async fn get_transaction(&self, txid: &str) -> Result<Option<ChainTransaction>, AnchorError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(AnchorError::Oracle("null oracle set to fail".to_string()));
        }
        Ok(self.transactions.lock().unwrap().get(txid).cloned())
    }

    fn name(&self) -> &str {
        "null"
    }
}
