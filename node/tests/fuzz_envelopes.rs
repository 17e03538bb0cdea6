//! Property-based tests for the receive path.
//!
//! Whatever bytes arrive from the network, the node must neither panic nor
//! admit anything that is not a valid, correctly addressed record.

mod common;

use common::*;
use proptest::prelude::*;
use vouch_node::{Delivery, NodeRole, ReceiveOutcome};
use vouch_types::Page;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn arbitrary_bytes_are_dropped(payload in proptest::collection::vec(any::<u8>(), 0..512)) {
        let rt = runtime();
        let node = detached_node(NodeRole::Collector, COLLECTOR_SEED, |_| {});
        let delivery = rt.block_on(node.on_receive(&payload));
        prop_assert!(matches!(delivery, Delivery::Dropped | Delivery::Did(_) | Delivery::Record(None) | Delivery::Sync(_)));
        prop_assert_eq!(node.get_review_list(&Page::default()).unwrap().count, 0);
    }

    #[test]
    fn corrupted_record_envelopes_are_never_admitted(index in 0usize..4096, flip in 1u8..=255) {
        let rt = runtime();
        let node = detached_node(NodeRole::Collector, COLLECTOR_SEED, |c| {
            c.index.validation_enabled = false;
        });
        let (record, _) = signed_by(CUSTOMER_SEED, unverified_review("Fuzzed"));
        let mut payload = record_envelope(&record, None);
        let at = index % payload.len();
        payload[at] ^= flip;

        let delivery = rt.block_on(node.on_receive(&payload));
        if let Delivery::Record(Some(ReceiveOutcome::Admitted)) = delivery {
            // A flip in the envelope header leaves the record intact.
            let rows = node.get_review_list(&Page::default()).unwrap();
            let stored = rows.rows[0].record.clone().unwrap();
            prop_assert_eq!(stored, record);
        }
    }
}
