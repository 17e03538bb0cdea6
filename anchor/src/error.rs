use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnchorError {
    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    #[error("transaction {txid} has no output matching {fingerprint}")]
    NoMatchingOutput { txid: String, fingerprint: String },

    #[error("chain oracle failed: {0}")]
    Oracle(String),

    #[error("malformed oracle response: {0}")]
    Malformed(String),
}
