//! DID derivation and DID document signatures.

use crate::hash::blake2b_256;
use crate::sign::{sign_message, verify_signature};
use crate::CryptoError;
use vouch_types::{Did, DidDocument, KeyPair, PublicKey, Timestamp};

/// Self-certifying DID for a public key.
pub fn did_for_key(public_key: &PublicKey) -> Did {
    let digest = blake2b_256(public_key.as_bytes());
    let mut prefix = [0u8; 16];
    prefix.copy_from_slice(&digest[..16]);
    Did::from_key_digest(&prefix)
}

/// Create and sign the version-zero document for a key pair.
pub fn new_document(keypair: &KeyPair, created_at: Timestamp) -> Result<DidDocument, CryptoError> {
    let mut doc = DidDocument {
        id: did_for_key(&keypair.public),
        version: 0,
        public_key: keypair.public,
        created_at,
        signature: None,
    };
    doc.signature = Some(sign_message(&doc.signing_bytes()?, &keypair.private));
    Ok(doc)
}

/// Produce the next version of `current` carrying `new_key`, signed by the
/// current key holder.
pub fn rotate_document(
    current: &DidDocument,
    current_keypair: &KeyPair,
    new_key: PublicKey,
    created_at: Timestamp,
) -> Result<DidDocument, CryptoError> {
    let mut doc = DidDocument {
        id: current.id.clone(),
        version: current.version + 1,
        public_key: new_key,
        created_at,
        signature: None,
    };
    doc.signature = Some(sign_message(&doc.signing_bytes()?, &current_keypair.private));
    Ok(doc)
}

/// Check a document's signature against `signer`, the key current before it.
///
/// For version zero the signer is the document's own key and that key must
/// derive the DID.
pub fn verify_document(doc: &DidDocument, signer: &PublicKey) -> Result<(), CryptoError> {
    if doc.version == 0 && did_for_key(&doc.public_key) != doc.id {
        return Err(CryptoError::KeyMismatch(doc.id.to_string()));
    }
    let signature = doc.signature.as_ref().ok_or(CryptoError::Unsigned)?;
    if verify_signature(&doc.signing_bytes()?, signature, signer) {
        Ok(())
    } else {
        Err(CryptoError::BadSignature(doc.id.to_string()))
    }
}
