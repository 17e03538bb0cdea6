//! Review records and proof-of-purchase receipts.
//!
//! A [`ReviewRecord`] is immutable once stored. Its content address is the
//! fingerprint of [`ReviewRecord::canonical_bytes`]; the record deliberately has no
//! field holding its own fingerprint. Signatures cover [`ReviewRecord::signing_bytes`],
//! which is every field except the two signature blocks.

use crate::{Did, Fingerprint, PublicKey, Signature, Timestamp, TypesError};
use serde::{Deserialize, Serialize};

/// A signature together with the DID that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureBlock {
    pub creator: Did,
    pub signature: Signature,
}

/// Rating on a closed scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub value: u8,
    pub min: u8,
    pub max: u8,
}

impl Rating {
    /// A rating on the usual one-to-five scale.
    pub fn stars(value: u8) -> Self {
        Self {
            value,
            min: 1,
            max: 5,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min < self.max && (self.min..=self.max).contains(&self.value)
    }
}

/// What the review is about.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub did: Did,
    pub name: String,
    pub url: Option<String>,
}

/// Proof-of-purchase receipt, co-signed by the vendor and the marketplace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoPR {
    pub item_id: String,
    pub invoice_id: String,
    pub amount: u64,
    pub currency_symbol: String,
    pub vendor_did: Did,
    pub marketplace_did: Did,
    pub marketplace_url: String,
    /// Key the vendor uses on this marketplace.
    pub vendor_key: Option<PublicKey>,
    pub vendor_signature: Option<SignatureBlock>,
    pub marketplace_signature: Option<SignatureBlock>,
}

#[derive(Serialize)]
struct PoPRSigningView<'a> {
    item_id: &'a str,
    invoice_id: &'a str,
    amount: u64,
    currency_symbol: &'a str,
    vendor_did: &'a Did,
    marketplace_did: &'a Did,
    marketplace_url: &'a str,
    vendor_key: &'a Option<PublicKey>,
}

impl PoPR {
    /// Bytes the vendor and marketplace sign.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, TypesError> {
        let view = PoPRSigningView {
            item_id: &self.item_id,
            invoice_id: &self.invoice_id,
            amount: self.amount,
            currency_symbol: &self.currency_symbol,
            vendor_did: &self.vendor_did,
            marketplace_did: &self.marketplace_did,
            marketplace_url: &self.marketplace_url,
            vendor_key: &self.vendor_key,
        };
        Ok(bincode::serialize(&view)?)
    }

    pub fn is_cosigned(&self) -> bool {
        self.vendor_signature.is_some() && self.marketplace_signature.is_some()
    }
}

/// The unit of storage and replication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub review_text: String,
    pub rating: Rating,
    pub timestamp: Timestamp,
    pub subject: Subject,
    /// `false` for reviews imported from a third party without proof of purchase.
    pub verifiable: bool,
    pub popr: Option<PoPR>,
    pub issuer: Option<Did>,
    /// Fingerprint of the record this one supersedes.
    pub previous_version_multihash: Option<Fingerprint>,
    pub customer_signature: Option<SignatureBlock>,
    pub issuer_signature: Option<SignatureBlock>,
}

#[derive(Serialize)]
struct RecordSigningView<'a> {
    review_text: &'a str,
    rating: &'a Rating,
    timestamp: Timestamp,
    subject: &'a Subject,
    verifiable: bool,
    popr: &'a Option<PoPR>,
    issuer: &'a Option<Did>,
    previous_version_multihash: &'a Option<Fingerprint>,
}

impl ReviewRecord {
    /// Bytes covered by the customer and issuer signatures.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, TypesError> {
        let view = RecordSigningView {
            review_text: &self.review_text,
            rating: &self.rating,
            timestamp: self.timestamp,
            subject: &self.subject,
            verifiable: self.verifiable,
            popr: &self.popr,
            issuer: &self.issuer,
            previous_version_multihash: &self.previous_version_multihash,
        };
        Ok(bincode::serialize(&view)?)
    }

    /// Serialized form written to the content store.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, TypesError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// DID of the author: the customer when present, otherwise the issuer.
    pub fn author(&self) -> Option<&Did> {
        self.customer_signature
            .as_ref()
            .or(self.issuer_signature.as_ref())
            .map(|block| &block.creator)
    }

    /// DID the review is about. For purchase-backed reviews this is the vendor.
    pub fn subject_did(&self) -> &Did {
        match &self.popr {
            Some(popr) => &popr.vendor_did,
            None => &self.subject.did,
        }
    }

    /// Whether the record carries no signatures yet.
    pub fn is_unsigned(&self) -> bool {
        self.customer_signature.is_none() && self.issuer_signature.is_none()
    }
}
