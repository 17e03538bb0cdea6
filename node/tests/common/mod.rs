//! Shared fixtures for node integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use vouch_crypto::{
    did_for_key, fingerprint_of, keypair_from_seed, new_document, sign_as_customer, sign_as_issuer,
    sign_popr_as_marketplace, sign_popr_as_vendor,
};
use vouch_network::{encode, Envelope, LocalHub, ReplicationMessage, Transport};
use vouch_node::{NodeConfig, NodeRole, NodeServices, VouchNode};
use vouch_nullables::{NullChainOracle, NullContentStore, NullDidStore, NullIndexStore, NullTransport};
use vouch_types::{Did, DidDocument, Fingerprint, KeyPair, NetworkId, PoPR, Rating, ReviewRecord, Subject, Timestamp};
use vouch_utils::{RetryPolicy, SystemClock};

pub const CUSTOMER_SEED: u8 = 1;
pub const COLLECTOR_SEED: u8 = 2;
pub const VENDOR_SEED: u8 = 10;
pub const MARKET_SEED: u8 = 11;

pub fn keypair(seed: u8) -> KeyPair {
    keypair_from_seed(&[seed; 32])
}

pub fn did(seed: u8) -> Did {
    did_for_key(&keypair(seed).public)
}

pub fn genesis(seed: u8) -> DidDocument {
    new_document(&keypair(seed), Timestamp::new(1_700_000_000)).unwrap()
}

pub fn policy() -> RetryPolicy {
    RetryPolicy::with_deadline(Duration::from_secs(5))
}

pub fn memory_services(transport: Arc<dyn Transport>, oracle: Arc<NullChainOracle>) -> NodeServices {
    NodeServices {
        content: Arc::new(NullContentStore::new()),
        index: Arc::new(NullIndexStore::new()),
        dids: Arc::new(NullDidStore::new()),
        oracle,
        transport,
        clock: Arc::new(SystemClock),
        lmdb: None,
    }
}

/// A node with in-memory stores, not started.
pub fn node(
    transport: Arc<dyn Transport>,
    oracle: Arc<NullChainOracle>,
    role: NodeRole,
    seed: u8,
    configure: impl FnOnce(&mut NodeConfig),
) -> VouchNode {
    let mut config = NodeConfig::in_memory(role);
    configure(&mut config);
    VouchNode::new(config, memory_services(transport, oracle), keypair(seed)).unwrap()
}

/// A started node connected to `hub`.
pub async fn started_node(
    hub: &LocalHub,
    oracle: &Arc<NullChainOracle>,
    role: NodeRole,
    seed: u8,
    configure: impl FnOnce(&mut NodeConfig),
) -> VouchNode {
    let mut node = node(Arc::new(hub.clone()), oracle.clone(), role, seed, configure);
    node.start().await.unwrap();
    node
}

/// A node that only receives what the test hands to `on_receive`.
pub fn detached_node(role: NodeRole, seed: u8, configure: impl FnOnce(&mut NodeConfig)) -> VouchNode {
    node(
        Arc::new(NullTransport::new()),
        Arc::new(NullChainOracle::new()),
        role,
        seed,
        configure,
    )
}

pub fn cosigned_popr() -> PoPR {
    let vendor = keypair(VENDOR_SEED);
    let market = keypair(MARKET_SEED);
    let mut popr = PoPR {
        item_id: "sku-42".into(),
        invoice_id: "inv-9001".into(),
        amount: 2_500,
        currency_symbol: "tBTC".into(),
        vendor_did: did(VENDOR_SEED),
        marketplace_did: did(MARKET_SEED),
        marketplace_url: "https://market.example".into(),
        vendor_key: Some(vendor.public),
        vendor_signature: None,
        marketplace_signature: None,
    };
    sign_popr_as_vendor(&mut popr, &vendor).unwrap();
    sign_popr_as_marketplace(&mut popr, &market).unwrap();
    popr
}

/// An unsigned purchase-backed review of the vendor.
pub fn verified_review(text: &str, previous: Option<Fingerprint>) -> ReviewRecord {
    ReviewRecord {
        review_text: text.into(),
        rating: Rating::stars(5),
        timestamp: Timestamp::new(1_700_000_100),
        subject: Subject {
            did: did(VENDOR_SEED),
            name: "Acme Widgets".into(),
            url: Some("https://acme.example".into()),
        },
        verifiable: true,
        popr: Some(cosigned_popr()),
        issuer: None,
        previous_version_multihash: previous,
        customer_signature: None,
        issuer_signature: None,
    }
}

/// A third-party review with no proof of purchase.
pub fn unverified_review(text: &str) -> ReviewRecord {
    ReviewRecord {
        review_text: text.into(),
        rating: Rating::stars(3),
        timestamp: Timestamp::new(1_700_000_200),
        subject: Subject {
            did: did(VENDOR_SEED),
            name: "Acme Widgets".into(),
            url: None,
        },
        verifiable: false,
        popr: None,
        issuer: None,
        previous_version_multihash: None,
        customer_signature: None,
        issuer_signature: None,
    }
}

/// Sign `record` the way a node with `seed` would and return it with its fingerprint.
pub fn signed_by(seed: u8, mut record: ReviewRecord) -> (ReviewRecord, Fingerprint) {
    let kp = keypair(seed);
    let author = did(seed);
    record.issuer = Some(author.clone());
    if record.verifiable {
        sign_as_customer(&mut record, &author, &kp).unwrap();
    }
    sign_as_issuer(&mut record, &author, &kp).unwrap();
    let fingerprint = fingerprint_of(&record.canonical_bytes().unwrap());
    (record, fingerprint)
}

pub fn envelope(message: ReplicationMessage) -> Vec<u8> {
    encode(&Envelope::new(
        NetworkId::Staging,
        "did:vouch:ffffffffffffffffffffffffffffffff",
        Timestamp::new(1_700_000_300),
        message,
    ))
    .unwrap()
}

pub fn did_envelope(seed: u8) -> Vec<u8> {
    envelope(ReplicationMessage::DidPublished { document: genesis(seed) })
}

pub fn record_envelope(record: &ReviewRecord, anchor: Option<&str>) -> Vec<u8> {
    let record_bytes = record.canonical_bytes().unwrap();
    envelope(ReplicationMessage::RecordPublished {
        multihash: fingerprint_of(&record_bytes),
        record_bytes,
        anchor: anchor.map(str::to_string),
    })
}

/// Make the vendor and marketplace DIDs known to `node` and its peers.
pub async fn publish_merchants(node: &VouchNode) {
    node.publish_did(genesis(VENDOR_SEED), true).await.unwrap();
    node.publish_did(genesis(MARKET_SEED), true).await.unwrap();
}
