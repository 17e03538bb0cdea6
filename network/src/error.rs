use thiserror::Error;
use vouch_types::NetworkId;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("message of {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("envelope for network {got}, expected {expected}")]
    WrongNetwork { expected: NetworkId, got: NetworkId },

    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u16),

    #[error("transport closed")]
    Closed,
}

impl From<bincode::Error> for NetworkError {
    fn from(e: bincode::Error) -> Self {
        NetworkError::Malformed(e.to_string())
    }
}
