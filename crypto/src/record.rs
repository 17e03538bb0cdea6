//! Signatures over review records and proof-of-purchase receipts.

use crate::sign::{sign_message, verify_signature};
use crate::CryptoError;
use vouch_types::{Did, KeyPair, PoPR, PublicKey, ReviewRecord, SignatureBlock};

fn block(bytes: &[u8], did: &Did, keypair: &KeyPair) -> SignatureBlock {
    SignatureBlock {
        creator: did.clone(),
        signature: sign_message(bytes, &keypair.private),
    }
}

/// Sign the record as its customer (author).
pub fn sign_as_customer(
    record: &mut ReviewRecord,
    did: &Did,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    let bytes = record.signing_bytes()?;
    record.customer_signature = Some(block(&bytes, did, keypair));
    Ok(())
}

/// Set the issuer and sign as issuer. The issuer field is part of the signed
/// bytes, so an existing customer signature is invalidated if the issuer changes.
pub fn sign_as_issuer(
    record: &mut ReviewRecord,
    did: &Did,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    record.issuer = Some(did.clone());
    let bytes = record.signing_bytes()?;
    record.issuer_signature = Some(block(&bytes, did, keypair));
    Ok(())
}

pub fn sign_popr_as_vendor(popr: &mut PoPR, keypair: &KeyPair) -> Result<(), CryptoError> {
    let bytes = popr.signing_bytes()?;
    popr.vendor_signature = Some(block(&bytes, &popr.vendor_did, keypair));
    Ok(())
}

pub fn sign_popr_as_marketplace(popr: &mut PoPR, keypair: &KeyPair) -> Result<(), CryptoError> {
    let bytes = popr.signing_bytes()?;
    popr.marketplace_signature = Some(block(&bytes, &popr.marketplace_did, keypair));
    Ok(())
}

/// Verify one signature block over `bytes` with the creator's resolved key.
pub fn verify_block(bytes: &[u8], block: &SignatureBlock, key: &PublicKey) -> bool {
    verify_signature(bytes, &block.signature, key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::did::did_for_key;
    use crate::keys::keypair_from_seed;
    use vouch_types::{Rating, Subject, Timestamp};

    fn record(subject: Did) -> ReviewRecord {
        ReviewRecord {
            review_text: "Arrived quickly".into(),
            rating: Rating::stars(4),
            timestamp: Timestamp::new(100),
            subject: Subject {
                did: subject,
                name: "Vendor".into(),
                url: None,
            },
            verifiable: true,
            popr: None,
            issuer: None,
            previous_version_multihash: None,
            customer_signature: None,
            issuer_signature: None,
        }
    }

    #[test]
    fn customer_and_issuer_signatures_verify() {
        let kp = keypair_from_seed(&[1; 32]);
        let did = did_for_key(&kp.public);
        let mut rr = record(did.clone());
        sign_as_issuer(&mut rr, &did, &kp).unwrap();
        sign_as_customer(&mut rr, &did, &kp).unwrap();
        let bytes = rr.signing_bytes().unwrap();
        assert!(verify_block(&bytes, rr.customer_signature.as_ref().unwrap(), &kp.public));
        assert!(verify_block(&bytes, rr.issuer_signature.as_ref().unwrap(), &kp.public));
    }

    #[test]
    fn tampering_breaks_signature() {
        let kp = keypair_from_seed(&[1; 32]);
        let did = did_for_key(&kp.public);
        let mut rr = record(did.clone());
        sign_as_customer(&mut rr, &did, &kp).unwrap();
        rr.rating = Rating::stars(1);
        let bytes = rr.signing_bytes().unwrap();
        assert!(!verify_block(&bytes, rr.customer_signature.as_ref().unwrap(), &kp.public));
    }

    #[test]
    fn popr_cosignatures() {
        let vendor = keypair_from_seed(&[8; 32]);
        let market = keypair_from_seed(&[9; 32]);
        let mut popr = PoPR {
            item_id: "sku-1".into(),
            invoice_id: "inv-1".into(),
            amount: 2500,
            currency_symbol: "tBTC".into(),
            vendor_did: did_for_key(&vendor.public),
            marketplace_did: did_for_key(&market.public),
            marketplace_url: "https://market.example".into(),
            vendor_key: Some(vendor.public),
            vendor_signature: None,
            marketplace_signature: None,
        };
        sign_popr_as_vendor(&mut popr, &vendor).unwrap();
        sign_popr_as_marketplace(&mut popr, &market).unwrap();
        assert!(popr.is_cosigned());
        let bytes = popr.signing_bytes().unwrap();
        assert!(verify_block(&bytes, popr.vendor_signature.as_ref().unwrap(), &vendor.public));
        assert!(verify_block(
            &bytes,
            popr.marketplace_signature.as_ref().unwrap(),
            &market.public
        ));
    }
}
