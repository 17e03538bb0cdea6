//! Receive-side replication: envelopes handed straight to `on_receive`.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::*;
use vouch_crypto::{fingerprint_of, rotate_document, sign_as_customer, sign_as_issuer};
use vouch_network::{decode, encode, Envelope, ReplicationMessage};
use vouch_node::{
    Delivery, NodeRole, PublishOutcome, ReadOptions, ReceiveOutcome, RecordError, StoreOptions,
    SyncAnswer,
};
use vouch_nullables::{NullChainOracle, NullTransport};
use vouch_types::{DidDocument, NetworkId, Page, Timestamp};

/// A collector that already knows the customer, vendor and marketplace DIDs.
async fn collector_with_dids(configure: impl FnOnce(&mut vouch_node::NodeConfig)) -> vouch_node::VouchNode {
    let node = detached_node(NodeRole::Collector, COLLECTOR_SEED, configure);
    for seed in [CUSTOMER_SEED, VENDOR_SEED, MARKET_SEED] {
        assert_eq!(
            node.on_receive(&did_envelope(seed)).await,
            Delivery::Did(Some(PublishOutcome::Published))
        );
    }
    node
}

#[tokio::test]
async fn duplicate_and_foreign_envelopes_are_dropped() {
    let node = detached_node(NodeRole::Collector, COLLECTOR_SEED, |_| {});
    let payload = did_envelope(CUSTOMER_SEED);
    assert_eq!(node.on_receive(&payload).await, Delivery::Did(Some(PublishOutcome::Published)));
    assert_eq!(node.on_receive(&payload).await, Delivery::Duplicate);

    let foreign = encode(&Envelope::new(
        NetworkId::Production,
        "did:vouch:ffffffffffffffffffffffffffffffff",
        Timestamp::new(1),
        ReplicationMessage::DidPublished {
            document: genesis(VENDOR_SEED),
        },
    ))
    .unwrap();
    assert_eq!(node.on_receive(&foreign).await, Delivery::Dropped);
    assert_eq!(node.on_receive(b"definitely not an envelope").await, Delivery::Dropped);
    assert_eq!(node.metrics().envelopes_dropped.get(), 2);
}

#[tokio::test]
async fn own_envelopes_are_skipped() {
    let node = detached_node(NodeRole::Collector, COLLECTOR_SEED, |_| {});
    let own = encode(&Envelope::new(
        NetworkId::Staging,
        node.did().to_string(),
        Timestamp::new(1),
        ReplicationMessage::DidPublished {
            document: genesis(VENDOR_SEED),
        },
    ))
    .unwrap();
    assert_eq!(node.on_receive(&own).await, Delivery::OwnMessage);
}

#[tokio::test]
async fn valid_record_is_admitted_and_pinned() {
    let node = collector_with_dids(|_| {}).await;
    let (record, fp) = signed_by(CUSTOMER_SEED, verified_review("Solid", None));
    assert_eq!(
        node.on_receive(&record_envelope(&record, None)).await,
        Delivery::Record(Some(ReceiveOutcome::Admitted))
    );
    assert!(node.pinning().is_pinned(&fp).unwrap());
    assert_eq!(node.index().entry(&fp).unwrap().unwrap().author, did(CUSTOMER_SEED));
}

#[tokio::test]
async fn claimed_multihash_must_match_content() {
    let node = collector_with_dids(|_| {}).await;
    let (record, _) = signed_by(CUSTOMER_SEED, verified_review("Solid", None));
    let (_, other) = signed_by(CUSTOMER_SEED, verified_review("Different", None));
    let payload = envelope(ReplicationMessage::RecordPublished {
        multihash: other,
        record_bytes: record.canonical_bytes().unwrap(),
        anchor: None,
    });
    assert_eq!(node.on_receive(&payload).await, Delivery::Record(None));
    assert_eq!(node.get_review_list(&Page::default()).unwrap().count, 0);
    assert_eq!(node.metrics().records_rejected.get(), 1);
}

#[tokio::test]
async fn non_canonical_bytes_are_rejected() {
    let node = collector_with_dids(|_| {}).await;
    let (record, _) = signed_by(CUSTOMER_SEED, verified_review("Solid", None));
    let mut bytes = record.canonical_bytes().unwrap();
    bytes.push(0);
    let payload = envelope(ReplicationMessage::RecordPublished {
        multihash: fingerprint_of(&bytes),
        record_bytes: bytes,
        anchor: None,
    });
    assert_eq!(node.on_receive(&payload).await, Delivery::Record(None));
}

#[tokio::test]
async fn tampered_signature_is_never_admitted() {
    let node = collector_with_dids(|_| {}).await;
    let (mut record, _) = signed_by(CUSTOMER_SEED, verified_review("Honest", None));
    record.review_text = "Dishonest".into();
    let fp = fingerprint_of(&record.canonical_bytes().unwrap());
    assert_eq!(node.on_receive(&record_envelope(&record, None)).await, Delivery::Record(None));
    assert!(node.index().entry(&fp).unwrap().is_none());
    assert!(!node.pinning().is_pinned(&fp).unwrap());
}

#[tokio::test]
async fn out_of_order_update_waits_for_its_predecessor() {
    let node = collector_with_dids(|_| {}).await;
    let (v1, fp1) = signed_by(CUSTOMER_SEED, verified_review("v1", None));
    let (v2, fp2) = signed_by(CUSTOMER_SEED, verified_review("v2", Some(fp1)));
    let (v3, fp3) = signed_by(CUSTOMER_SEED, verified_review("v3", Some(fp2)));

    assert_eq!(
        node.on_receive(&record_envelope(&v3, None)).await,
        Delivery::Record(Some(ReceiveOutcome::Parked { predecessor: fp2 }))
    );
    assert_eq!(
        node.on_receive(&record_envelope(&v2, None)).await,
        Delivery::Record(Some(ReceiveOutcome::Parked { predecessor: fp1 }))
    );
    assert!(node.index().entry(&fp2).unwrap().is_none());

    assert_eq!(
        node.on_receive(&record_envelope(&v1, None)).await,
        Delivery::Record(Some(ReceiveOutcome::Admitted))
    );
    assert!(node.index().entry(&fp2).unwrap().is_some());
    assert!(node.index().entry(&fp3).unwrap().is_some());

    let latest = node.read_review_record(fp1, ReadOptions::default()).await.unwrap();
    assert_eq!(latest.multihash, fp3);
    assert_eq!(node.metrics().records_parked.get(), 2);
    assert_eq!(node.metrics().orphan_count.get(), 0);
}

#[tokio::test]
async fn competing_successors_surface_as_version_conflict() {
    let node = collector_with_dids(|_| {}).await;
    let (v1, fp1) = signed_by(CUSTOMER_SEED, verified_review("v1", None));
    let (a, fp_a) = signed_by(CUSTOMER_SEED, verified_review("branch a", Some(fp1)));
    let (b, fp_b) = signed_by(CUSTOMER_SEED, verified_review("branch b", Some(fp1)));
    for record in [&v1, &a, &b] {
        assert_eq!(
            node.on_receive(&record_envelope(record, None)).await,
            Delivery::Record(Some(ReceiveOutcome::Admitted))
        );
    }

    match node.read_review_record(fp1, ReadOptions::default()).await {
        Err(RecordError::VersionConflict { at, mut candidates }) => {
            assert_eq!(at, fp1);
            candidates.sort();
            let mut expected = vec![fp_a, fp_b];
            expected.sort();
            assert_eq!(candidates, expected);
        }
        other => panic!("expected a version conflict, got {other:?}"),
    }

    let pinned = node
        .read_review_record(
            fp_a,
            ReadOptions {
                get_latest_version: false,
                ..ReadOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(pinned.record.review_text, "branch a");
}

#[tokio::test]
async fn update_by_another_author_is_refused() {
    let node = collector_with_dids(|_| {}).await;
    node.on_receive(&did_envelope(5)).await;
    let (v1, fp1) = signed_by(CUSTOMER_SEED, verified_review("mine", None));
    let (hijack, fp_h) = signed_by(5, verified_review("not yours", Some(fp1)));

    node.on_receive(&record_envelope(&v1, None)).await;
    assert_eq!(node.on_receive(&record_envelope(&hijack, None)).await, Delivery::Record(None));
    assert!(node.index().entry(&fp_h).unwrap().is_none());
}

#[tokio::test]
async fn validation_disabled_admits_after_structure_check() {
    let node = detached_node(NodeRole::Collector, COLLECTOR_SEED, |c| {
        c.index.validation_enabled = false;
    });
    // No DIDs known and no allow-list entry: only the shape is checked.
    let (record, fp) = signed_by(CUSTOMER_SEED, unverified_review("Unchecked"));
    assert_eq!(
        node.on_receive(&record_envelope(&record, None)).await,
        Delivery::Record(Some(ReceiveOutcome::Admitted))
    );
    assert!(node.index().entry(&fp).unwrap().is_some());

    let mut broken = unverified_review("No issuer");
    broken.issuer = None;
    assert_eq!(node.on_receive(&record_envelope(&broken, None)).await, Delivery::Record(None));
}

#[tokio::test]
async fn writes_disabled_skips_replicated_records() {
    let node = collector_with_dids(|c| {
        c.index.writes_enabled = false;
    })
    .await;
    let (record, fp) = signed_by(CUSTOMER_SEED, verified_review("Ignored", None));
    assert_eq!(
        node.on_receive(&record_envelope(&record, None)).await,
        Delivery::Record(Some(ReceiveOutcome::Skipped))
    );
    assert!(node.index().entry(&fp).unwrap().is_none());
}

#[tokio::test]
async fn did_versions_arriving_out_of_order_converge_on_the_latest() {
    let node = detached_node(NodeRole::Collector, COLLECTOR_SEED, |_| {});
    for seed in [VENDOR_SEED, MARKET_SEED] {
        node.on_receive(&did_envelope(seed)).await;
    }
    let kp0 = keypair(CUSTOMER_SEED);
    let kp1 = keypair(30);
    let kp2 = keypair(31);
    let doc0 = genesis(CUSTOMER_SEED);
    let doc1 = rotate_document(&doc0, &kp0, kp1.public, Timestamp::new(1_700_000_400)).unwrap();
    let doc2 = rotate_document(&doc1, &kp1, kp2.public, Timestamp::new(1_700_000_500)).unwrap();
    let deliver = |document: DidDocument| envelope(ReplicationMessage::DidPublished { document });

    assert_eq!(
        node.on_receive(&deliver(doc0.clone())).await,
        Delivery::Did(Some(PublishOutcome::Published))
    );
    assert_eq!(
        node.on_receive(&deliver(doc2.clone())).await,
        Delivery::Did(Some(PublishOutcome::Parked))
    );
    assert_eq!(node.get_did(&doc0.id, false).await.unwrap().version, 0);
    assert_eq!(
        node.on_receive(&deliver(doc1)).await,
        Delivery::Did(Some(PublishOutcome::Published))
    );

    let latest = node.get_did(&doc0.id, false).await.unwrap();
    assert_eq!(latest, doc2);
    assert_eq!(node.did_history(&doc0.id).unwrap().len(), 3);

    // Records signed with the newest key verify.
    let author = did(CUSTOMER_SEED);
    let mut record = verified_review("Signed after two rotations", None);
    record.issuer = Some(author.clone());
    sign_as_customer(&mut record, &author, &kp2).unwrap();
    sign_as_issuer(&mut record, &author, &kp2).unwrap();
    assert_eq!(
        node.on_receive(&record_envelope(&record, None)).await,
        Delivery::Record(Some(ReceiveOutcome::Admitted))
    );
}

#[tokio::test]
async fn record_gives_up_on_a_signer_that_never_appears() {
    let node = detached_node(NodeRole::Collector, COLLECTOR_SEED, |c| {
        c.allowed_unverified_review_issuers = vec!["*".into()];
        c.did_wait_timeout_ms = 100;
    });
    node.on_receive(&did_envelope(VENDOR_SEED)).await;
    let (record, fp) = signed_by(40, unverified_review("From nowhere"));
    let payload = record_envelope(&record, None);

    let started = Instant::now();
    assert_eq!(node.on_receive(&payload).await, Delivery::Record(None));
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(node.metrics().did_wait_timeouts.get(), 1);
    assert_eq!(node.metrics().records_rejected.get(), 1);
    assert!(node.index().entry(&fp).unwrap().is_none());

    // Once the signer shows up, a re-broadcast of the same envelope is accepted.
    node.on_receive(&did_envelope(40)).await;
    assert_eq!(
        node.on_receive(&payload).await,
        Delivery::Record(Some(ReceiveOutcome::Admitted))
    );
}

#[tokio::test]
async fn sync_request_rebroadcasts_dids_then_records() {
    let transport = Arc::new(NullTransport::new());
    let node = common::node(
        transport.clone(),
        Arc::new(NullChainOracle::new()),
        NodeRole::Customer,
        CUSTOMER_SEED,
        |_| {},
    );
    for seed in [CUSTOMER_SEED, VENDOR_SEED, MARKET_SEED] {
        node.on_receive(&did_envelope(seed)).await;
    }
    let fp = node
        .store_review_record(
            verified_review("Catch up on me", None),
            StoreOptions {
                publish: false,
                ..StoreOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(transport.sent().is_empty());

    assert_eq!(
        node.on_receive(&envelope(ReplicationMessage::SyncRequest)).await,
        Delivery::Sync(Some(SyncAnswer { documents: 3, records: 1 }))
    );
    let sent: Vec<ReplicationMessage> = transport
        .sent()
        .iter()
        .map(|bytes| decode(bytes).unwrap().message)
        .collect();
    assert_eq!(sent.len(), 4);
    assert!(sent[..3]
        .iter()
        .all(|m| matches!(m, ReplicationMessage::DidPublished { .. })));
    assert!(matches!(
        &sent[3],
        ReplicationMessage::RecordPublished { multihash, anchor: None, .. } if *multihash == fp
    ));
}
