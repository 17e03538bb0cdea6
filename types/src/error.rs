//! Errors raised while parsing or encoding core types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid fingerprint: {0}")]
    InvalidFingerprint(String),

    #[error("invalid DID: {0}")]
    InvalidDid(String),

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for TypesError {
    fn from(e: bincode::Error) -> Self {
        TypesError::Serialization(e.to_string())
    }
}
