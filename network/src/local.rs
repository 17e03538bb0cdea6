//! In-process transport connecting nodes within one runtime.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::{Inbound, NetworkError, Transport};

/// Default number of envelopes buffered per subscriber before it lags.
pub const DEFAULT_HUB_CAPACITY: usize = 4096;

/// A shared broadcast bus. Every clone publishes to and subscribes from the
/// same channel, so handing one clone to each node connects them all.
#[derive(Clone)]
pub struct LocalHub {
    tx: broadcast::Sender<Arc<Vec<u8>>>,
}

impl LocalHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new(DEFAULT_HUB_CAPACITY)
    }
}

#[async_trait]
impl Transport for LocalHub {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), NetworkError> {
        match self.tx.send(Arc::new(payload)) {
            Ok(receivers) => tracing::trace!(receivers, "published on local hub"),
            // No subscribers yet; nothing to deliver to.
            Err(_) => tracing::trace!("published on local hub without subscribers"),
        }
        Ok(())
    }

    fn subscribe(&self) -> Inbound {
        self.tx.subscribe()
    }
}
