//! The seam between a node and the peer-to-peer network.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::NetworkError;

/// Stream of encoded envelopes delivered to a node.
pub type Inbound = broadcast::Receiver<Arc<Vec<u8>>>;

/// Publish/subscribe transport carrying encoded envelopes.
///
/// Delivery is best effort and unordered. Subscribers may see their own
/// publications and must filter them by envelope origin.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), NetworkError>;

    fn subscribe(&self) -> Inbound;
}
