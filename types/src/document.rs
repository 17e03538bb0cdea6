//! DID documents.

use crate::{Did, PublicKey, Signature, Timestamp, TypesError};
use serde::{Deserialize, Serialize};

/// A published DID document.
///
/// Each DID has an append-only history of documents with consecutive versions
/// starting at zero. A document is signed by the key that is current when it is
/// published: its own key for version zero, the previous version's key afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DidDocument {
    pub id: Did,
    pub version: u64,
    pub public_key: PublicKey,
    pub created_at: Timestamp,
    pub signature: Option<Signature>,
}

#[derive(Serialize)]
struct DocumentSigningView<'a> {
    id: &'a Did,
    version: u64,
    public_key: &'a PublicKey,
    created_at: Timestamp,
}

impl DidDocument {
    pub fn signing_bytes(&self) -> Result<Vec<u8>, TypesError> {
        let view = DocumentSigningView {
            id: &self.id,
            version: self.version,
            public_key: &self.public_key,
            created_at: self.created_at,
        };
        Ok(bincode::serialize(&view)?)
    }
}
