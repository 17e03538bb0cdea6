//! Replication layer for the Vouch review network.
//!
//! Defines the envelope every node broadcasts, its binary codec, the
//! [`Transport`] seam the node publishes through, an in-process [`LocalHub`]
//! transport, and envelope deduplication.

pub mod codec;
pub mod dedup;
pub mod error;
pub mod local;
pub mod message;
pub mod transport;

pub use codec::{decode, encode, MAX_MESSAGE_SIZE};
pub use dedup::{MessageDedup, DEFAULT_DEDUP_CAPACITY};
pub use error::NetworkError;
pub use local::LocalHub;
pub use message::{Envelope, Header, ReplicationMessage, PROTOCOL_VERSION};
pub use transport::{Inbound, Transport};
