use std::sync::Arc;
use std::time::Duration;

use vouch_anchor::{AnchorError, AnchorVerifier};
use vouch_nullables::NullChainOracle;
use vouch_types::Fingerprint;

fn setup(ttl: Duration) -> (Arc<NullChainOracle>, AnchorVerifier) {
    let oracle = Arc::new(NullChainOracle::new());
    let verifier = AnchorVerifier::new(oracle.clone(), ttl);
    (oracle, verifier)
}

#[tokio::test]
async fn confirms_matching_output() {
    let (oracle, verifier) = setup(Duration::from_secs(600));
    let fp = Fingerprint::from_digest([5; 32]);
    oracle.anchor("tx1", &fp);
    let confirmation = verifier.confirm("tx1", &fp).await.unwrap();
    assert_eq!(confirmation.output_index, 1);
    assert!(verifier.is_confirmed("tx1", &fp).await);
}

#[tokio::test]
async fn not_found_and_mismatch_are_distinct() {
    let (oracle, verifier) = setup(Duration::from_secs(600));
    let fp = Fingerprint::from_digest([5; 32]);
    assert!(matches!(
        verifier.confirm("missing", &fp).await,
        Err(AnchorError::TransactionNotFound(_))
    ));
    oracle.anchor("tx1", &Fingerprint::from_digest([6; 32]));
    assert!(matches!(
        verifier.confirm("tx1", &fp).await,
        Err(AnchorError::NoMatchingOutput { .. })
    ));
}

#[tokio::test]
async fn lookups_are_cached_until_invalidated() {
    let (oracle, verifier) = setup(Duration::from_secs(600));
    let fp = Fingerprint::from_digest([5; 32]);
    oracle.anchor("tx1", &fp);
    verifier.confirm("tx1", &fp).await.unwrap();
    verifier.confirm("tx1", &fp).await.unwrap();
    assert_eq!(oracle.fetch_count(), 1);

    // The chain changes underneath; the cache still answers until invalidated.
    oracle.anchor("tx1", &Fingerprint::from_digest([9; 32]));
    assert!(verifier.is_confirmed("tx1", &fp).await);
    verifier.invalidate("tx1").await;
    assert!(!verifier.is_confirmed("tx1", &fp).await);
    assert_eq!(oracle.fetch_count(), 2);
}

#[tokio::test]
async fn not_found_is_not_cached() {
    let (oracle, verifier) = setup(Duration::from_secs(600));
    let fp = Fingerprint::from_digest([5; 32]);
    assert!(!verifier.is_confirmed("late", &fp).await);
    oracle.anchor("late", &fp);
    assert!(verifier.is_confirmed("late", &fp).await);
}

#[tokio::test]
async fn zero_ttl_always_refetches() {
    let (oracle, verifier) = setup(Duration::ZERO);
    let fp = Fingerprint::from_digest([5; 32]);
    oracle.anchor("tx1", &fp);
    verifier.confirm("tx1", &fp).await.unwrap();
    verifier.confirm("tx1", &fp).await.unwrap();
    assert_eq!(oracle.fetch_count(), 2);
}

#[tokio::test]
async fn oracle_failures_are_reported() {
    let (oracle, verifier) = setup(Duration::from_secs(600));
    oracle.set_failing(true);
    let fp = Fingerprint::from_digest([5; 32]);
    assert!(matches!(
        verifier.confirm("tx1", &fp).await,
        Err(AnchorError::Oracle(_))
    ));
    verifier.clear().await;
}
