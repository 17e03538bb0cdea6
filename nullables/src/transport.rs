//! Nullable transport: record publications without sending them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::broadcast;
use vouch_network::{Inbound, NetworkError, Transport};

/// A transport that records what the node publishes and lets tests inject
/// inbound envelopes.
pub struct NullTransport {
    sent: Mutex<Vec<Vec<u8>>>,
    inbound: broadcast::Sender<Arc<Vec<u8>>>,
}

impl NullTransport {
    pub fn new() -> Self {
        let (inbound, _) = broadcast::channel(1024);
        Self {
            sent: Mutex::new(Vec::new()),
            inbound,
        }
    }

    /// Deliver an encoded envelope to every subscriber.
    pub fn deliver(&self, payload: Vec<u8>) {
        let _ = self.inbound.send(Arc::new(payload));
    }

    /// Everything published so far (for assertions).
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn reset(&self) {
        self.sent.lock().unwrap().clear();
    }
}

impl Default for NullTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for NullTransport {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), NetworkError> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    fn subscribe(&self) -> Inbound {
        self.inbound.subscribe()
    }
}
