use thiserror::Error;
use vouch_types::{Did, Fingerprint};

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("store error: {0}")]
    Store(#[from] vouch_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] vouch_store_lmdb::LmdbError),

    #[error("network error: {0}")]
    Network(#[from] vouch_network::NetworkError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node already started")]
    AlreadyStarted,
}

/// Failures of the review record store and its validation pipeline.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("anchor mismatch: {0}")]
    AnchorMismatch(String),

    #[error("anchor could not be checked: {0}")]
    AnchorUnavailable(String),

    #[error("fingerprint mismatch: expected {expected}, computed {actual}")]
    FingerprintMismatch {
        expected: Fingerprint,
        actual: Fingerprint,
    },

    #[error("record {0} not found")]
    NotFound(Fingerprint),

    #[error("record {successor} may not supersede {predecessor}")]
    UnauthorizedSupersede {
        predecessor: Fingerprint,
        successor: Fingerprint,
    },

    #[error("{at} has {} competing successors", candidates.len())]
    VersionConflict {
        at: Fingerprint,
        candidates: Vec<Fingerprint>,
    },

    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("issuer {0} may not publish unverified reviews")]
    UnverifiedIssuerNotAllowed(Did),

    #[error("node is read-only")]
    ReadOnly,

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("store error: {0}")]
    Store(#[from] vouch_store::StoreError),

    #[error("network error: {0}")]
    Network(#[from] vouch_network::NetworkError),
}

impl From<vouch_types::TypesError> for RecordError {
    fn from(e: vouch_types::TypesError) -> Self {
        RecordError::Malformed(e.to_string())
    }
}

impl From<vouch_crypto::CryptoError> for RecordError {
    fn from(e: vouch_crypto::CryptoError) -> Self {
        RecordError::InvalidSignature(e.to_string())
    }
}

/// Failures of the identity registry.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("DID {0} not found")]
    NotFound(Did),

    #[error("document {did} version {version} is older than the published one")]
    StaleDocument { did: Did, version: u64 },

    #[error("document {did} version {got} skips ahead, expected {expected}")]
    OutOfOrder { did: Did, expected: u64, got: u64 },

    #[error("DID {did} did not replicate within {waited_ms} ms")]
    ResolveTimeout { did: Did, waited_ms: u64 },

    #[error("invalid document: {0}")]
    InvalidDocument(#[from] vouch_crypto::CryptoError),

    #[error("identity key file: {0}")]
    KeyFile(String),

    #[error("store error: {0}")]
    Store(#[from] vouch_store::StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
