//! DID document history storage trait.

use crate::StoreError;
use vouch_types::{Did, DidDocument};

/// Append-only per-DID document history.
///
/// Implementations store what they are given; version ordering and signature
/// rules are enforced by the identity registry.
pub trait DidStore: Send + Sync {
    /// Append a document. Fails with [`StoreError::Duplicate`] if that version
    /// is already stored for the DID.
    fn append(&self, document: &DidDocument) -> Result<(), StoreError>;

    fn latest(&self, did: &Did) -> Result<Option<DidDocument>, StoreError>;

    fn version(&self, did: &Did, version: u64) -> Result<Option<DidDocument>, StoreError>;

    /// Every stored version, oldest first.
    fn history(&self, did: &Did) -> Result<Vec<DidDocument>, StoreError>;

    /// Every stored document, each DID's history in version order.
    fn all_documents(&self) -> Result<Vec<DidDocument>, StoreError>;
}
