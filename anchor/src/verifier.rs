//! Anchor confirmation against a chain oracle.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use vouch_types::Fingerprint;

use crate::{AnchorError, ChainOracle, ChainTransaction, TransactionCache};

/// How long a fetched transaction is trusted before it is fetched again.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(600);

/// Proof that `txid` carries an output committing to `fingerprint`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnchorConfirmation {
    pub txid: String,
    pub fingerprint: Fingerprint,
    pub output_index: usize,
}

/// Confirms that claimed transactions anchor record fingerprints.
///
/// Lookups go through a [`TransactionCache`]; the cache lock is never held
/// while the oracle is queried. Failures are returned to the caller and never
/// retried here.
pub struct AnchorVerifier {
    oracle: Arc<dyn ChainOracle>,
    cache: Mutex<TransactionCache>,
}

impl AnchorVerifier {
    pub fn new(oracle: Arc<dyn ChainOracle>, ttl: Duration) -> Self {
        Self {
            oracle,
            cache: Mutex::new(TransactionCache::new(ttl)),
        }
    }

    pub fn with_default_ttl(oracle: Arc<dyn ChainOracle>) -> Self {
        Self::new(oracle, DEFAULT_CACHE_TTL)
    }

    async fn transaction(&self, txid: &str) -> Result<ChainTransaction, AnchorError> {
        if let Some(tx) = self.cache.lock().await.get(txid, Instant::now()) {
            tracing::trace!(txid, "anchor cache hit");
            return Ok(tx);
        }

        let tx = self
            .oracle
            .get_transaction(txid)
            .await?
            .ok_or_else(|| AnchorError::TransactionNotFound(txid.to_string()))?;
        tracing::debug!(txid, oracle = self.oracle.name(), outputs = tx.outputs.len(), "fetched transaction");
        self.cache.lock().await.insert(tx.clone(), Instant::now());
        Ok(tx)
    }

    /// Confirm that `txid` has an output whose data equals the multihash of
    /// `expected`.
    pub async fn confirm(
        &self,
        txid: &str,
        expected: &Fingerprint,
    ) -> Result<AnchorConfirmation, AnchorError> {
        let tx = self.transaction(txid).await?;
        let multihash = expected.to_multihash();
        let output_index = tx
            .outputs
            .iter()
            .position(|out| out.data.as_deref() == Some(&multihash[..]))
            .ok_or_else(|| AnchorError::NoMatchingOutput {
                txid: txid.to_string(),
                fingerprint: expected.to_string(),
            })?;
        Ok(AnchorConfirmation {
            txid: txid.to_string(),
            fingerprint: *expected,
            output_index,
        })
    }

    /// Like [`confirm`](Self::confirm) but folds every failure into `false`.
    pub async fn is_confirmed(&self, txid: &str, expected: &Fingerprint) -> bool {
        match self.confirm(txid, expected).await {
            Ok(_) => true,
            Err(e) => {
                tracing::debug!(txid, error = %e, "anchor not confirmed");
                false
            }
        }
    }

    /// Forget one cached transaction so the next lookup refetches it.
    pub async fn invalidate(&self, txid: &str) {
        self.cache.lock().await.invalidate(txid);
    }

    pub async fn clear(&self) {
        self.cache.lock().await.clear();
    }
}
