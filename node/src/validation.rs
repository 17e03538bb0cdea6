//! Validation pipeline shared by local stores and replication receipt.
//!
//! Stages run in order: structure, signatures, anchor, predecessor. The
//! first failing stage decides the error.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use vouch_anchor::{AnchorConfirmation, AnchorError, AnchorVerifier};
use vouch_crypto::verify_block;
use vouch_types::{Did, DidDocument, Fingerprint, IndexEntry, ReviewRecord, SignatureBlock};

use crate::identity::IdentityRegistry;
use crate::index::ReplicationIndex;
use crate::{IdentityError, RecordError};

/// Longest accepted review text, in bytes.
pub const MAX_REVIEW_TEXT_LEN: usize = 64 * 1024;

/// Issuers permitted to publish unverified reviews.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllowList {
    Any,
    Dids(HashSet<Did>),
}

impl AllowList {
    /// Build from config values. `"*"` admits any issuer.
    pub fn from_config(entries: &[String]) -> Self {
        if entries.iter().any(|e| e == "*") {
            return AllowList::Any;
        }
        AllowList::Dids(entries.iter().map(Did::new).collect())
    }

    pub fn allows(&self, did: &Did) -> bool {
        match self {
            AllowList::Any => true,
            AllowList::Dids(dids) => dids.contains(did),
        }
    }
}

/// Check the shape of a record without touching any registry.
pub fn check_structure(record: &ReviewRecord) -> Result<(), RecordError> {
    if !record.subject.did.is_well_formed() {
        return Err(RecordError::Malformed(format!(
            "subject DID '{}' is not well formed",
            record.subject.did
        )));
    }
    if !record.rating.is_valid() {
        let r = record.rating;
        return Err(RecordError::Malformed(format!(
            "rating {} outside [{}, {}]",
            r.value, r.min, r.max
        )));
    }
    if record.review_text.len() > MAX_REVIEW_TEXT_LEN {
        return Err(RecordError::Malformed(format!(
            "review text is {} bytes, limit {MAX_REVIEW_TEXT_LEN}",
            record.review_text.len()
        )));
    }
    if record.verifiable {
        let Some(popr) = &record.popr else {
            return Err(RecordError::Malformed("verifiable record without PoPR".into()));
        };
        if !popr.is_cosigned() {
            return Err(RecordError::InvalidSignature("PoPR is not co-signed".into()));
        }
        if record.customer_signature.is_none() {
            return Err(RecordError::InvalidSignature("customer signature missing".into()));
        }
    }
    let issuer = record
        .issuer
        .as_ref()
        .ok_or_else(|| RecordError::Malformed("issuer missing".into()))?;
    match &record.issuer_signature {
        Some(block) if &block.creator == issuer => Ok(()),
        Some(block) => Err(RecordError::InvalidSignature(format!(
            "issuer signature created by {} instead of {issuer}",
            block.creator
        ))),
        None => Err(RecordError::InvalidSignature("issuer signature missing".into())),
    }
}

/// How long signature checks may wait for an unknown signer DID.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DidWait {
    /// Fail at once with `NotFound`.
    Never,
    /// Suspend until the DID replicates.
    Unbounded,
    /// Suspend at most this long, then fail with `ResolveTimeout`.
    Bounded(Duration),
}

/// Signature, anchor and predecessor checks against this node's registries.
pub struct Validator {
    registry: Arc<IdentityRegistry>,
    anchors: Arc<AnchorVerifier>,
    index: Arc<ReplicationIndex>,
    allowed_issuers: AllowList,
    own_did: Did,
}

impl Validator {
    pub fn new(
        registry: Arc<IdentityRegistry>,
        anchors: Arc<AnchorVerifier>,
        index: Arc<ReplicationIndex>,
        allowed_issuers: AllowList,
        own_did: Did,
    ) -> Self {
        Self {
            registry,
            anchors,
            index,
            allowed_issuers,
            own_did,
        }
    }

    async fn resolve(&self, did: &Did, wait: DidWait) -> Result<DidDocument, IdentityError> {
        match wait {
            DidWait::Never => self.registry.resolve(did, false).await,
            DidWait::Unbounded => self.registry.resolve(did, true).await,
            DidWait::Bounded(limit) => tokio::time::timeout(limit, self.registry.resolve(did, true))
                .await
                .map_err(|_| IdentityError::ResolveTimeout {
                    did: did.clone(),
                    waited_ms: limit.as_millis() as u64,
                })?,
        }
    }

    async fn verify(&self, bytes: &[u8], block: &SignatureBlock, wait: DidWait, role: &str) -> Result<(), RecordError> {
        let document = self.resolve(&block.creator, wait).await?;
        if verify_block(bytes, block, &document.public_key) {
            Ok(())
        } else {
            Err(RecordError::InvalidSignature(format!(
                "{role} signature by {} does not verify",
                block.creator
            )))
        }
    }

    /// Verify every signature the record carries against the signers'
    /// current keys. `wait` decides how long an unknown signer may take to replicate.
    pub async fn verify_signatures(&self, record: &ReviewRecord, wait: DidWait) -> Result<(), RecordError> {
        let bytes = record.signing_bytes()?;
        let issuer_block = record
            .issuer_signature
            .as_ref()
            .ok_or_else(|| RecordError::InvalidSignature("issuer signature missing".into()))?;

        if !record.verifiable {
            let issuer = &issuer_block.creator;
            if issuer != &self.own_did && !self.allowed_issuers.allows(issuer) {
                return Err(RecordError::UnverifiedIssuerNotAllowed(issuer.clone()));
            }
            return self.verify(&bytes, issuer_block, wait, "issuer").await;
        }

        let customer_block = record
            .customer_signature
            .as_ref()
            .ok_or_else(|| RecordError::InvalidSignature("customer signature missing".into()))?;
        let popr = record
            .popr
            .as_ref()
            .ok_or_else(|| RecordError::Malformed("verifiable record without PoPR".into()))?;
        let (Some(vendor), Some(marketplace)) = (&popr.vendor_signature, &popr.marketplace_signature) else {
            return Err(RecordError::InvalidSignature("PoPR is not co-signed".into()));
        };
        if vendor.creator != popr.vendor_did {
            return Err(RecordError::InvalidSignature("PoPR vendor signature by another DID".into()));
        }
        if marketplace.creator != popr.marketplace_did {
            return Err(RecordError::InvalidSignature(
                "PoPR marketplace signature by another DID".into(),
            ));
        }

        self.verify(&bytes, customer_block, wait, "customer").await?;
        self.verify(&bytes, issuer_block, wait, "issuer").await?;
        let popr_bytes = popr.signing_bytes()?;
        self.verify(&popr_bytes, vendor, wait, "vendor").await?;
        self.verify(&popr_bytes, marketplace, wait, "marketplace").await
    }

    /// Confirm that `txid` anchors `fingerprint`.
    pub async fn check_anchor(&self, fingerprint: &Fingerprint, txid: &str) -> Result<AnchorConfirmation, RecordError> {
        self.anchors.confirm(txid, fingerprint).await.map_err(|e| match e {
            AnchorError::TransactionNotFound(_) | AnchorError::NoMatchingOutput { .. } => {
                RecordError::AnchorMismatch(e.to_string())
            }
            AnchorError::Oracle(_) | AnchorError::Malformed(_) => RecordError::AnchorUnavailable(e.to_string()),
        })
    }

    /// Check that `record` (fingerprint `fingerprint`) may supersede its
    /// predecessor. Records without a predecessor pass trivially.
    pub fn check_predecessor(
        &self,
        fingerprint: &Fingerprint,
        record: &ReviewRecord,
    ) -> Result<Option<IndexEntry>, RecordError> {
        let Some(previous) = record.previous_version_multihash else {
            return Ok(None);
        };
        let entry = self.index.entry(&previous)?.ok_or(RecordError::NotFound(previous))?;
        let same_author = record.author() == Some(&entry.author);
        if !entry.verifiable || !same_author {
            return Err(RecordError::UnauthorizedSupersede {
                predecessor: previous,
                successor: *fingerprint,
            });
        }
        Ok(Some(entry))
    }

    /// Signatures, anchor and predecessor. Structure is checked by the caller.
    pub async fn validate(
        &self,
        fingerprint: &Fingerprint,
        record: &ReviewRecord,
        anchor: Option<&str>,
        wait: DidWait,
    ) -> Result<Option<AnchorConfirmation>, RecordError> {
        self.verify_signatures(record, wait).await?;
        let confirmation = match anchor {
            Some(txid) => Some(self.check_anchor(fingerprint, txid).await?),
            None => None,
        };
        self.check_predecessor(fingerprint, record)?;
        Ok(confirmation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vouch_types::{Rating, Signature, Subject, Timestamp};

    fn did(n: u8) -> Did {
        Did::from_key_digest(&[n; 16])
    }

    fn block(n: u8) -> SignatureBlock {
        SignatureBlock {
            creator: did(n),
            signature: Signature([0; 64]),
        }
    }

    fn unverified() -> ReviewRecord {
        ReviewRecord {
            review_text: "fine".into(),
            rating: Rating::stars(3),
            timestamp: Timestamp::new(1),
            subject: Subject {
                did: did(2),
                name: "Shop".into(),
                url: None,
            },
            verifiable: false,
            popr: None,
            issuer: Some(did(1)),
            previous_version_multihash: None,
            customer_signature: None,
            issuer_signature: Some(block(1)),
        }
    }

    #[test]
    fn allow_list_wildcard() {
        assert!(AllowList::from_config(&["*".into()]).allows(&did(9)));
        let list = AllowList::from_config(&[did(1).to_string()]);
        assert!(list.allows(&did(1)));
        assert!(!list.allows(&did(2)));
        assert!(!AllowList::from_config(&[]).allows(&did(1)));
    }

    #[test]
    fn structure_accepts_signed_unverified_record() {
        assert!(check_structure(&unverified()).is_ok());
    }

    #[test]
    fn structure_rejections() {
        let mut r = unverified();
        r.rating = Rating::stars(9);
        assert!(matches!(check_structure(&r), Err(RecordError::Malformed(_))));

        let mut r = unverified();
        r.subject.did = Did::new("not-a-did");
        assert!(matches!(check_structure(&r), Err(RecordError::Malformed(_))));

        let mut r = unverified();
        r.review_text = "x".repeat(MAX_REVIEW_TEXT_LEN + 1);
        assert!(matches!(check_structure(&r), Err(RecordError::Malformed(_))));

        let mut r = unverified();
        r.issuer_signature = Some(block(5));
        assert!(matches!(check_structure(&r), Err(RecordError::InvalidSignature(_))));

        let mut r = unverified();
        r.issuer_signature = None;
        assert!(matches!(check_structure(&r), Err(RecordError::InvalidSignature(_))));

        let mut r = unverified();
        r.verifiable = true;
        assert!(matches!(check_structure(&r), Err(RecordError::Malformed(_))));
    }

    fn validator() -> Validator {
        use crate::config::IndexConfig;
        use vouch_nullables::{NullChainOracle, NullClock, NullDidStore, NullIndexStore};

        let registry = Arc::new(IdentityRegistry::new(
            Arc::new(NullDidStore::new()),
            Arc::new(NullClock::new(1)),
            4,
        ));
        let anchors = Arc::new(AnchorVerifier::new(
            Arc::new(NullChainOracle::new()),
            Duration::from_secs(60),
        ));
        let index = Arc::new(ReplicationIndex::new(
            Arc::new(NullIndexStore::new()),
            &IndexConfig::default(),
        ));
        Validator::new(registry, anchors, index, AllowList::Any, did(7))
    }

    #[tokio::test]
    async fn unknown_signer_fails_fast_or_after_the_bound() {
        let validator = validator();
        assert!(matches!(
            validator.verify_signatures(&unverified(), DidWait::Never).await,
            Err(RecordError::Identity(IdentityError::NotFound(_)))
        ));

        let started = std::time::Instant::now();
        let result = validator
            .verify_signatures(&unverified(), DidWait::Bounded(Duration::from_millis(50)))
            .await;
        assert!(matches!(
            result,
            Err(RecordError::Identity(IdentityError::ResolveTimeout { waited_ms: 50, .. }))
        ));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }
}
