//! Replication messages and their envelope.

use serde::{Deserialize, Serialize};
use vouch_types::{DidDocument, Fingerprint, NetworkId, Timestamp};

use crate::NetworkError;

/// Current replication protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// Routing metadata carried by every envelope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub network: NetworkId,
    pub protocol_version: u16,
    /// Identifier of the publishing node; receivers skip their own messages.
    pub origin: String,
    pub timestamp: Timestamp,
}

/// Payloads exchanged between nodes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationMessage {
    /// A review record was stored and published.
    RecordPublished {
        /// Fingerprint the publisher computed. Receivers recompute and compare.
        multihash: Fingerprint,
        /// Canonical record bytes.
        record_bytes: Vec<u8>,
        /// Transaction claimed to anchor the record.
        anchor: Option<String>,
    },
    /// A DID document was published.
    DidPublished { document: DidDocument },
    /// A node joined and asks peers to re-broadcast what they hold.
    SyncRequest,
}

impl ReplicationMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ReplicationMessage::RecordPublished { .. } => "record_published",
            ReplicationMessage::DidPublished { .. } => "did_published",
            ReplicationMessage::SyncRequest => "sync_request",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub header: Header,
    pub message: ReplicationMessage,
}

impl Envelope {
    pub fn new(
        network: NetworkId,
        origin: impl Into<String>,
        timestamp: Timestamp,
        message: ReplicationMessage,
    ) -> Self {
        Self {
            header: Header {
                network,
                protocol_version: PROTOCOL_VERSION,
                origin: origin.into(),
                timestamp,
            },
            message,
        }
    }

    /// Reject envelopes from another network or protocol version.
    pub fn check_compatible(&self, network: NetworkId) -> Result<(), NetworkError> {
        if self.header.network != network {
            return Err(NetworkError::WrongNetwork {
                expected: network,
                got: self.header.network,
            });
        }
        if self.header.protocol_version != PROTOCOL_VERSION {
            return Err(NetworkError::UnsupportedVersion(self.header.protocol_version));
        }
        Ok(())
    }
}
