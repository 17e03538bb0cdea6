use thiserror::Error;
use vouch_types::TypesError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("stored data is corrupted: {0}")]
    Corruption(String),
}

impl From<TypesError> for StoreError {
    fn from(e: TypesError) -> Self {
        StoreError::Serialization(e.to_string())
    }
}
