//! Rolling hash set for envelope deduplication.
//!
//! Prevents the same envelope from being processed twice by remembering a
//! bounded set of recently seen Blake2b-256 envelope hashes.

use std::collections::HashSet;
use std::collections::VecDeque;

/// Default dedup capacity: track the last 65 536 envelope hashes.
pub const DEFAULT_DEDUP_CAPACITY: usize = 65_536;

/// Keeps the last `capacity` hashes in insertion order and evicts the oldest
/// once full.
pub struct MessageDedup {
    capacity: usize,
    hashes: HashSet<[u8; 32]>,
    order: VecDeque<[u8; 32]>,
}

impl MessageDedup {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            hashes: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Returns `true` if `hash` was seen before; otherwise records it.
    pub fn is_duplicate(&mut self, hash: &[u8; 32]) -> bool {
        if self.hashes.contains(hash) {
            return true;
        }
        if self.hashes.len() >= self.capacity {
            if let Some(old) = self.order.pop_front() {
                self.hashes.remove(&old);
            }
        }
        self.hashes.insert(*hash);
        self.order.push_back(*hash);
        false
    }

    /// Hash raw envelope bytes and check them in one step.
    pub fn check_payload(&mut self, payload: &[u8]) -> bool {
        let hash = vouch_crypto::blake2b_256(payload);
        self.is_duplicate(&hash)
    }

    /// Forget `payload` so a later copy is processed again. Returns whether
    /// it was remembered.
    pub fn forget_payload(&mut self, payload: &[u8]) -> bool {
        let hash = vouch_crypto::blake2b_256(payload);
        if !self.hashes.remove(&hash) {
            return false;
        }
        self.order.retain(|h| h != &hash);
        true
    }

    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }
}

impl Default for MessageDedup {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_CAPACITY)
    }
}
