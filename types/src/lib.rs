//! Fundamental types for the Vouch review network.
//!
//! This crate defines the data model shared by every other crate in the workspace:
//! content fingerprints, decentralized identifiers, key material, review records,
//! DID documents, index entries and timestamps.

pub mod did;
pub mod document;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod keys;
pub mod network;
pub mod record;
pub mod time;

pub use did::Did;
pub use document::DidDocument;
pub use error::TypesError;
pub use fingerprint::Fingerprint;
pub use index::{IndexEntry, ListResult, Page};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use network::NetworkId;
pub use record::{PoPR, Rating, ReviewRecord, SignatureBlock, Subject};
pub use time::Timestamp;
