//! Time-bounded cache of decoded transactions.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::ChainTransaction;

/// Transactions by txid, each valid for `ttl` after insertion.
///
/// Only transactions the chain returned are cached; "not found" is never
/// remembered, so a transaction that confirms later is picked up on the next
/// lookup.
pub struct TransactionCache {
    ttl: Duration,
    entries: HashMap<String, (Instant, ChainTransaction)>,
}

impl TransactionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Return the cached transaction if it has not expired at `now`.
    /// Expired entries are evicted.
    pub fn get(&mut self, txid: &str, now: Instant) -> Option<ChainTransaction> {
        let fresh = match self.entries.get(txid) {
            Some((inserted, _)) => now.saturating_duration_since(*inserted) < self.ttl,
            None => return None,
        };
        if fresh {
            self.entries.get(txid).map(|(_, tx)| tx.clone())
        } else {
            self.entries.remove(txid);
            None
        }
    }

    /// Cache `tx` as fetched at `now`, evicting every entry already expired.
    pub fn insert(&mut self, tx: ChainTransaction, now: Instant) {
        self.evict_expired(now);
        self.entries.insert(tx.txid.clone(), (now, tx));
    }

    /// Drop every entry older than the TTL. Returns how many were removed.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let ttl = self.ttl;
        let before = self.entries.len();
        self.entries
            .retain(|_, (inserted, _)| now.saturating_duration_since(*inserted) < ttl);
        before - self.entries.len()
    }

    /// Drop one transaction. Returns whether it was cached.
    pub fn invalidate(&mut self, txid: &str) -> bool {
        self.entries.remove(txid).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: &str) -> ChainTransaction {
        ChainTransaction {
            txid: id.to_string(),
            outputs: Vec::new(),
        }
    }

    #[test]
    fn entries_expire_after_ttl() {
        let start = Instant::now();
        let mut cache = TransactionCache::new(Duration::from_secs(600));
        cache.insert(tx("a"), start);
        assert!(cache.get("a", start + Duration::from_secs(599)).is_some());
        assert!(cache.get("a", start + Duration::from_secs(600)).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_and_clear() {
        let now = Instant::now();
        let mut cache = TransactionCache::new(Duration::from_secs(60));
        cache.insert(tx("a"), now);
        cache.insert(tx("b"), now);
        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert!(cache.get("a", now).is_none());
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.get("b", now).is_none());
    }

    #[test]
    fn insert_evicts_expired_entries() {
        let start = Instant::now();
        let mut cache = TransactionCache::new(Duration::from_secs(1));
        for n in 0..1000 {
            cache.insert(tx(&format!("tx-{n}")), start);
        }
        assert_eq!(cache.len(), 1000);
        cache.insert(tx("late"), start + Duration::from_secs(3600));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("late", start + Duration::from_secs(3600)).is_some());
    }

    #[test]
    fn evict_keeps_fresh_entries() {
        let start = Instant::now();
        let mut cache = TransactionCache::new(Duration::from_secs(10));
        cache.insert(tx("old"), start);
        cache.insert(tx("new"), start + Duration::from_secs(8));
        assert_eq!(cache.evict_expired(start + Duration::from_secs(12)), 1);
        assert!(cache.get("new", start + Duration::from_secs(12)).is_some());
    }

    #[test]
    fn reinsert_refreshes_entry() {
        let start = Instant::now();
        let mut cache = TransactionCache::new(Duration::from_secs(10));
        cache.insert(tx("a"), start);
        cache.insert(tx("a"), start + Duration::from_secs(8));
        assert!(cache.get("a", start + Duration::from_secs(15)).is_some());
    }
}
