use thiserror::Error;
use vouch_types::TypesError;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encoding error: {0}")]
    Encoding(#[from] TypesError),

    #[error("signature does not verify for {0}")]
    BadSignature(String),

    #[error("document is unsigned")]
    Unsigned,

    #[error("key does not derive DID {0}")]
    KeyMismatch(String),
}
