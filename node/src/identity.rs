//! Identity registry: DID to published document, with append-only history.

use std::path::Path;
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;
use vouch_crypto::{did_for_key, generate_keypair, keypair_from_seed, new_document, verify_document};
use vouch_store::{DidStore, StoreError};
use vouch_types::{Did, DidDocument, KeyPair, Timestamp};
use vouch_utils::Clock;

use crate::orphans::PendingDocuments;
use crate::IdentityError;

/// File under the data directory holding the node's hex-encoded key seed.
pub const IDENTITY_KEY_FILE: &str = "identity.key";

/// Result of a successful [`IdentityRegistry::publish`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The document became the latest version of its DID.
    Published,
    /// The exact document was already known.
    Unchanged,
    /// An earlier version is still missing; the document waits for it.
    Parked,
}

/// Resolves DIDs to their latest published document.
///
/// Resolution with `wait_for_replication` suspends until the DID shows up;
/// every accepted publish wakes all waiting resolvers. Documents that skip
/// ahead of the known history are held until the gap is filled.
pub struct IdentityRegistry {
    store: Arc<dyn DidStore>,
    clock: Arc<dyn Clock>,
    published: Notify,
    /// Also serializes appends.
    pending: Mutex<PendingDocuments>,
}

impl IdentityRegistry {
    pub fn new(store: Arc<dyn DidStore>, clock: Arc<dyn Clock>, pending_capacity: usize) -> Self {
        Self {
            store,
            clock,
            published: Notify::new(),
            pending: Mutex::new(PendingDocuments::new(pending_capacity)),
        }
    }

    /// Accept a document if it is the next valid version of its DID, or park
    /// it if an earlier version has not arrived yet.
    pub fn publish(&self, document: &DidDocument) -> Result<PublishOutcome, IdentityError> {
        let outcome = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            match self.check_and_append(document) {
                Ok(PublishOutcome::Published) => {
                    let released = self.release_pending(&mut pending, &document.id, document.version + 1);
                    if released > 0 {
                        tracing::debug!(did = %document.id, released, "released parked DID documents");
                    }
                    PublishOutcome::Published
                }
                Err(IdentityError::OutOfOrder { expected, got, .. }) if got > expected => {
                    if !pending.insert(document.clone(), self.clock.now()) {
                        tracing::warn!(did = %document.id, version = got, "DID document not parked");
                        return Err(IdentityError::OutOfOrder {
                            did: document.id.clone(),
                            expected,
                            got,
                        });
                    }
                    tracing::debug!(did = %document.id, version = got, expected, "DID document parked");
                    PublishOutcome::Parked
                }
                other => other?,
            }
        };
        if outcome == PublishOutcome::Published {
            tracing::debug!(did = %document.id, version = document.version, "DID document published");
            self.published.notify_waiters();
        }
        Ok(outcome)
    }

    /// Append parked successors starting at `version` until the chain breaks.
    fn release_pending(&self, pending: &mut PendingDocuments, did: &Did, mut version: u64) -> usize {
        let mut released = 0;
        loop {
            let candidates = pending.take(did, version);
            if candidates.is_empty() {
                return released;
            }
            let mut advanced = false;
            for candidate in candidates {
                match self.check_and_append(&candidate) {
                    Ok(PublishOutcome::Published) => {
                        advanced = true;
                        released += 1;
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::debug!(%did, version, "dropping parked DID document: {e}"),
                }
            }
            if !advanced {
                return released;
            }
            version += 1;
        }
    }

    /// Drop parked documents older than `max_age_secs`.
    pub fn expire_pending(&self, max_age_secs: u64) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.clear_expired(max_age_secs, self.clock.now())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn check_and_append(&self, document: &DidDocument) -> Result<PublishOutcome, IdentityError> {
        let did = &document.id;
        let Some(latest) = self.store.latest(did)? else {
            if document.version != 0 {
                return Err(IdentityError::OutOfOrder {
                    did: did.clone(),
                    expected: 0,
                    got: document.version,
                });
            }
            verify_document(document, &document.public_key)?;
            self.store.append(document)?;
            return Ok(PublishOutcome::Published);
        };

        if document.version <= latest.version {
            return match self.store.version(did, document.version)? {
                Some(known) if known == *document => Ok(PublishOutcome::Unchanged),
                _ => Err(IdentityError::StaleDocument {
                    did: did.clone(),
                    version: document.version,
                }),
            };
        }
        if document.version != latest.version + 1 {
            return Err(IdentityError::OutOfOrder {
                did: did.clone(),
                expected: latest.version + 1,
                got: document.version,
            });
        }

        verify_document(document, &latest.public_key)?;
        match self.store.append(document) {
            Ok(()) => Ok(PublishOutcome::Published),
            Err(StoreError::Duplicate(_)) => Err(IdentityError::StaleDocument {
                did: did.clone(),
                version: document.version,
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Latest document for `did`.
    ///
    /// With `wait_for_replication` this never fails for an unknown DID; it
    /// suspends until the DID is published. Callers bound the wait.
    pub async fn resolve(&self, did: &Did, wait_for_replication: bool) -> Result<DidDocument, IdentityError> {
        loop {
            let notified = self.published.notified();
            tokio::pin!(notified);
            // Register before checking so a publish in between is not missed.
            notified.as_mut().enable();

            if let Some(doc) = self.store.latest(did)? {
                return Ok(doc);
            }
            if !wait_for_replication {
                return Err(IdentityError::NotFound(did.clone()));
            }
            tracing::trace!(%did, "waiting for DID to replicate");
            notified.await;
        }
    }

    pub fn resolve_version(&self, did: &Did, version: u64) -> Result<DidDocument, IdentityError> {
        self.store
            .version(did, version)?
            .ok_or_else(|| IdentityError::NotFound(did.clone()))
    }

    /// Every published version of `did`, oldest first.
    pub fn history(&self, did: &Did) -> Result<Vec<DidDocument>, IdentityError> {
        Ok(self.store.history(did)?)
    }

    /// Every published document of every DID, histories in version order.
    pub fn all_documents(&self) -> Result<Vec<DidDocument>, IdentityError> {
        Ok(self.store.all_documents()?)
    }
}

/// The key pair a node signs with, and its DID.
pub struct NodeIdentity {
    pub keypair: KeyPair,
    pub did: Did,
}

impl NodeIdentity {
    pub fn from_keypair(keypair: KeyPair) -> Self {
        let did = did_for_key(&keypair.public);
        Self { keypair, did }
    }

    /// Load the key seed from `data_dir`, generating and saving one on first start.
    pub fn load_or_create(data_dir: &Path) -> Result<Self, IdentityError> {
        let path = data_dir.join(IDENTITY_KEY_FILE);
        if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            let bytes = hex::decode(text.trim()).map_err(|e| IdentityError::KeyFile(e.to_string()))?;
            let seed: [u8; 32] = bytes
                .try_into()
                .map_err(|_| IdentityError::KeyFile("expected a 32-byte seed".to_string()))?;
            let identity = Self::from_keypair(keypair_from_seed(&seed));
            tracing::info!(did = %identity.did, "loaded node identity");
            return Ok(identity);
        }

        std::fs::create_dir_all(data_dir)?;
        let keypair = generate_keypair();
        std::fs::write(&path, hex::encode(keypair.private.0))?;
        let identity = Self::from_keypair(keypair);
        tracing::info!(did = %identity.did, path = %path.display(), "generated node identity");
        Ok(identity)
    }

    /// Version-zero document for this identity.
    pub fn genesis_document(&self, created_at: Timestamp) -> Result<DidDocument, IdentityError> {
        Ok(new_document(&self.keypair, created_at)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use vouch_crypto::rotate_document;
    use vouch_nullables::{NullClock, NullDidStore};

    fn registry() -> Arc<IdentityRegistry> {
        Arc::new(IdentityRegistry::new(
            Arc::new(NullDidStore::new()),
            Arc::new(NullClock::new(1_000)),
            16,
        ))
    }

    #[test]
    fn genesis_then_rotation() {
        let reg = registry();
        let kp = keypair_from_seed(&[1; 32]);
        let next = keypair_from_seed(&[2; 32]);
        let doc0 = new_document(&kp, Timestamp::new(1)).unwrap();
        assert_eq!(reg.publish(&doc0).unwrap(), PublishOutcome::Published);
        assert_eq!(reg.publish(&doc0).unwrap(), PublishOutcome::Unchanged);

        let doc1 = rotate_document(&doc0, &kp, next.public, Timestamp::new(2)).unwrap();
        assert_eq!(reg.publish(&doc1).unwrap(), PublishOutcome::Published);
        assert_eq!(reg.history(&doc0.id).unwrap().len(), 2);
        assert_eq!(reg.resolve_version(&doc0.id, 0).unwrap(), doc0);

        // A version-1 document signed by a different key cannot replace the known one.
        let forged = rotate_document(&doc0, &kp, kp.public, Timestamp::new(3)).unwrap();
        assert!(matches!(
            reg.publish(&forged),
            Err(IdentityError::StaleDocument { version: 1, .. })
        ));
    }

    #[test]
    fn rotation_must_be_signed_by_latest_key() {
        let reg = registry();
        let kp = keypair_from_seed(&[1; 32]);
        let intruder = keypair_from_seed(&[9; 32]);
        let doc0 = new_document(&kp, Timestamp::new(1)).unwrap();
        reg.publish(&doc0).unwrap();
        let bad = rotate_document(&doc0, &intruder, intruder.public, Timestamp::new(2)).unwrap();
        assert!(matches!(reg.publish(&bad), Err(IdentityError::InvalidDocument(_))));
    }

    #[test]
    fn later_versions_wait_for_the_gap() {
        let reg = registry();
        let kp0 = keypair_from_seed(&[1; 32]);
        let kp1 = keypair_from_seed(&[2; 32]);
        let kp2 = keypair_from_seed(&[3; 32]);
        let doc0 = new_document(&kp0, Timestamp::new(1)).unwrap();
        let doc1 = rotate_document(&doc0, &kp0, kp1.public, Timestamp::new(2)).unwrap();
        let doc2 = rotate_document(&doc1, &kp1, kp2.public, Timestamp::new(3)).unwrap();

        assert_eq!(reg.publish(&doc2).unwrap(), PublishOutcome::Parked);
        assert_eq!(reg.publish(&doc1).unwrap(), PublishOutcome::Parked);
        assert_eq!(reg.pending_count(), 2);
        assert!(reg.history(&doc0.id).unwrap().is_empty());

        assert_eq!(reg.publish(&doc0).unwrap(), PublishOutcome::Published);
        assert_eq!(reg.pending_count(), 0);
        assert_eq!(reg.history(&doc0.id).unwrap(), vec![doc0, doc1, doc2]);
    }

    #[test]
    fn forged_candidate_does_not_block_the_real_successor() {
        let reg = registry();
        let kp0 = keypair_from_seed(&[1; 32]);
        let kp1 = keypair_from_seed(&[2; 32]);
        let intruder = keypair_from_seed(&[9; 32]);
        let doc0 = new_document(&kp0, Timestamp::new(1)).unwrap();
        let doc1 = rotate_document(&doc0, &kp0, kp1.public, Timestamp::new(2)).unwrap();
        let doc2 = rotate_document(&doc1, &kp1, kp1.public, Timestamp::new(3)).unwrap();
        let forged = rotate_document(&doc1, &intruder, intruder.public, Timestamp::new(3)).unwrap();

        reg.publish(&doc0).unwrap();
        assert_eq!(reg.publish(&forged).unwrap(), PublishOutcome::Parked);
        assert_eq!(reg.publish(&doc2).unwrap(), PublishOutcome::Parked);
        assert_eq!(reg.publish(&doc1).unwrap(), PublishOutcome::Published);

        let latest = reg.resolve_version(&doc0.id, 2).unwrap();
        assert_eq!(latest, doc2);
        assert_eq!(reg.pending_count(), 0);
    }

    #[test]
    fn parking_is_bounded_and_expires() {
        let clock = Arc::new(NullClock::new(1_000));
        let reg = IdentityRegistry::new(Arc::new(NullDidStore::new()), clock.clone(), 1);
        let kp = keypair_from_seed(&[1; 32]);
        let doc0 = new_document(&kp, Timestamp::new(1)).unwrap();
        let doc1 = rotate_document(&doc0, &kp, kp.public, Timestamp::new(2)).unwrap();
        let doc2 = rotate_document(&doc1, &kp, kp.public, Timestamp::new(3)).unwrap();

        assert_eq!(reg.publish(&doc1).unwrap(), PublishOutcome::Parked);
        assert!(matches!(
            reg.publish(&doc2),
            Err(IdentityError::OutOfOrder { expected: 0, got: 2, .. })
        ));

        clock.advance(120);
        assert_eq!(reg.expire_pending(60), 1);
        assert_eq!(reg.publish(&doc0).unwrap(), PublishOutcome::Published);
        assert_eq!(reg.history(&doc0.id).unwrap().len(), 1);
    }

    #[test]
    fn genesis_key_must_derive_did() {
        let reg = registry();
        let kp = keypair_from_seed(&[1; 32]);
        let other = keypair_from_seed(&[2; 32]);
        let mut doc = new_document(&kp, Timestamp::new(1)).unwrap();
        doc.id = did_for_key(&other.public);
        assert!(reg.publish(&doc).is_err());
    }

    #[tokio::test]
    async fn resolve_without_wait_is_not_found() {
        let reg = registry();
        let did = did_for_key(&keypair_from_seed(&[5; 32]).public);
        assert!(matches!(
            reg.resolve(&did, false).await,
            Err(IdentityError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn resolve_waits_for_publication() {
        let reg = registry();
        let kp = keypair_from_seed(&[6; 32]);
        let doc = new_document(&kp, Timestamp::new(1)).unwrap();

        let waiter = {
            let reg = reg.clone();
            let did = doc.id.clone();
            tokio::spawn(async move { reg.resolve(&did, true).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        reg.publish(&doc).unwrap();
        let resolved = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("resolver should wake")
            .unwrap()
            .unwrap();
        assert_eq!(resolved, doc);
    }

    #[test]
    fn node_identity_persists_seed() {
        let dir = tempfile::tempdir().unwrap();
        let first = NodeIdentity::load_or_create(dir.path()).unwrap();
        let second = NodeIdentity::load_or_create(dir.path()).unwrap();
        assert_eq!(first.did, second.did);
        assert_eq!(first.keypair.public, second.keypair.public);
    }

    #[test]
    fn corrupt_key_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(IDENTITY_KEY_FILE), "zz").unwrap();
        assert!(matches!(
            NodeIdentity::load_or_create(dir.path()),
            Err(IdentityError::KeyFile(_))
        ));
    }
}
