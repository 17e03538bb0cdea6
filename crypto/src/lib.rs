//! Cryptographic primitives for the Vouch review network.
//!
//! - **Ed25519** for DID documents, review signatures and PoPR co-signatures
//! - **Blake2b-256** for content fingerprints and DID derivation

pub mod did;
pub mod error;
pub mod hash;
pub mod keys;
pub mod record;
pub mod sign;

pub use did::{did_for_key, new_document, rotate_document, verify_document};
pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi, fingerprint_of};
pub use keys::{generate_keypair, keypair_from_private, keypair_from_seed, public_from_private};
pub use record::{
    sign_as_customer, sign_as_issuer, sign_popr_as_marketplace, sign_popr_as_vendor,
    verify_block,
};
pub use sign::{sign_message, verify_signature};
