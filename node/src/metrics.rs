//! Prometheus metrics for the Vouch node.
//!
//! [`NodeMetrics`] owns a dedicated [`Registry`]; embedders encode it into the
//! Prometheus text exposition format however they choose to serve it.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Records stored locally through the review record store.
    pub records_stored: IntCounter,
    /// Records newly admitted to the replication index (local or replicated).
    pub records_admitted: IntCounter,
    /// Replicated records that failed validation.
    pub records_rejected: IntCounter,
    /// Replicated updates parked until their predecessor arrives.
    pub records_parked: IntCounter,
    /// Envelopes dropped before dispatch (duplicate, malformed, foreign network).
    pub envelopes_dropped: IntCounter,
    /// DID documents accepted by the identity registry.
    pub dids_published: IntCounter,
    /// Content pinned by the pinning service.
    pub pins: IntCounter,
    /// Update notifications delivered to watchers.
    pub update_notifications: IntCounter,
    /// Replicated records that gave up waiting for a signer DID.
    pub did_wait_timeouts: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub index_size: IntGauge,
    pub orphan_count: IntGauge,
    /// Replicated messages being processed right now.
    pub replication_in_flight: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent validating one replicated record, in milliseconds.
    pub validation_time_ms: Histogram,
}

impl NodeMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let records_stored = register_int_counter_with_registry!(
            Opts::new("vouch_records_stored_total", "Review records stored locally"),
            registry
        )
        .expect("failed to register records_stored counter");

        let records_admitted = register_int_counter_with_registry!(
            Opts::new(
                "vouch_records_admitted_total",
                "Review records admitted to the replication index"
            ),
            registry
        )
        .expect("failed to register records_admitted counter");

        let records_rejected = register_int_counter_with_registry!(
            Opts::new(
                "vouch_records_rejected_total",
                "Replicated review records that failed validation"
            ),
            registry
        )
        .expect("failed to register records_rejected counter");

        let records_parked = register_int_counter_with_registry!(
            Opts::new(
                "vouch_records_parked_total",
                "Replicated updates parked awaiting their predecessor"
            ),
            registry
        )
        .expect("failed to register records_parked counter");

        let envelopes_dropped = register_int_counter_with_registry!(
            Opts::new(
                "vouch_envelopes_dropped_total",
                "Replication envelopes dropped before dispatch"
            ),
            registry
        )
        .expect("failed to register envelopes_dropped counter");

        let dids_published = register_int_counter_with_registry!(
            Opts::new("vouch_dids_published_total", "DID documents accepted"),
            registry
        )
        .expect("failed to register dids_published counter");

        let pins = register_int_counter_with_registry!(
            Opts::new("vouch_pins_total", "Content pins taken"),
            registry
        )
        .expect("failed to register pins counter");

        let update_notifications = register_int_counter_with_registry!(
            Opts::new(
                "vouch_update_notifications_total",
                "Update notifications delivered to watchers"
            ),
            registry
        )
        .expect("failed to register update_notifications counter");

        let did_wait_timeouts = register_int_counter_with_registry!(
            Opts::new(
                "vouch_did_wait_timeouts_total",
                "Replicated records that timed out waiting for a signer DID"
            ),
            registry
        )
        .expect("failed to register did_wait_timeouts counter");

        let index_size = register_int_gauge_with_registry!(
            Opts::new("vouch_index_size", "Entries in the replication index"),
            registry
        )
        .expect("failed to register index_size gauge");

        let orphan_count = register_int_gauge_with_registry!(
            Opts::new("vouch_orphan_count", "Updates waiting for a predecessor"),
            registry
        )
        .expect("failed to register orphan_count gauge");

        let replication_in_flight = register_int_gauge_with_registry!(
            Opts::new(
                "vouch_replication_in_flight",
                "Replicated messages currently being processed"
            ),
            registry
        )
        .expect("failed to register replication_in_flight gauge");

        let validation_time_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "vouch_validation_time_ms",
                "Time spent validating a replicated record in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 14).unwrap_or_default()),
            registry
        )
        .expect("failed to register validation_time_ms histogram");

        Self {
            registry,
            records_stored,
            records_admitted,
            records_rejected,
            records_parked,
            envelopes_dropped,
            dids_published,
            pins,
            update_notifications,
            did_wait_timeouts,
            index_size,
            orphan_count,
            replication_in_flight,
            validation_time_ms,
        }
    }

    /// Encode all metrics in the Prometheus text exposition format.
    pub fn encode(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_exposition() {
        let metrics = NodeMetrics::new();
        metrics.records_admitted.inc();
        metrics.index_size.set(3);
        let text = metrics.encode();
        assert!(text.contains("vouch_records_admitted_total 1"));
        assert!(text.contains("vouch_index_size 3"));
    }

    #[test]
    fn independent_registries() {
        let a = NodeMetrics::new();
        let b = NodeMetrics::new();
        a.pins.inc();
        assert_eq!(a.pins.get(), 1);
        assert_eq!(b.pins.get(), 0);
    }
}
