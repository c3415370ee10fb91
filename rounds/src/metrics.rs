//! Prometheus metrics for the round lifecycle.
//!
//! [`RoundMetrics`] owns a dedicated [`Registry`]; the HTTP `/metrics` route
//! encodes it into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, Histogram,
    HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use ballot_types::Color;

pub struct RoundMetrics {
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Votes committed to a round, labelled by color.
    pub votes_accepted: IntCounterVec,
    /// Votes refused before reaching the store (bad option or cutoff).
    pub votes_rejected: IntCounter,
    /// Votes that ran out of boundary retries.
    pub votes_dropped: IntCounter,
    /// Increments that landed on a round closed under them.
    pub boundary_retries: IntCounter,
    pub rounds_closed: IntCounter,
    /// Storage failures seen by the scheduler, retried or not.
    pub scheduler_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub subscribers: IntGauge,
    /// Subscribers dropped for falling behind or disconnecting.
    pub broadcast_evictions: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Wall time of a successful vote, in milliseconds.
    pub vote_latency_ms: Histogram,
}

impl RoundMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let votes_accepted = register_int_counter_vec_with_registry!(
            Opts::new("ballot_votes_accepted_total", "Votes committed to a round"),
            &["color"],
            registry
        )?;
        let votes_rejected = register_int_counter_with_registry!(
            Opts::new(
                "ballot_votes_rejected_total",
                "Votes refused before reaching the store"
            ),
            registry
        )?;
        let votes_dropped = register_int_counter_with_registry!(
            Opts::new(
                "ballot_votes_dropped_total",
                "Votes dropped after exhausting boundary retries"
            ),
            registry
        )?;
        let boundary_retries = register_int_counter_with_registry!(
            Opts::new(
                "ballot_boundary_retries_total",
                "Vote increments retried because the round closed first"
            ),
            registry
        )?;
        let rounds_closed = register_int_counter_with_registry!(
            Opts::new("ballot_rounds_closed_total", "Rounds closed by the scheduler"),
            registry
        )?;
        let scheduler_failures = register_int_counter_with_registry!(
            Opts::new(
                "ballot_scheduler_failures_total",
                "Storage failures observed by the round scheduler"
            ),
            registry
        )?;

        let subscribers = register_int_gauge_with_registry!(
            Opts::new("ballot_subscribers", "Connected WebSocket observers"),
            registry
        )?;
        let broadcast_evictions = register_int_gauge_with_registry!(
            Opts::new(
                "ballot_broadcast_evictions",
                "Observers evicted since start for falling behind"
            ),
            registry
        )?;

        // 0.25 ms → ~4 s
        let vote_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new("ballot_vote_latency_ms", "Vote latency in milliseconds")
                .buckets(prometheus::exponential_buckets(0.25, 2.0, 15)?),
            registry
        )?;

        Ok(Self {
            registry,
            votes_accepted,
            votes_rejected,
            votes_dropped,
            boundary_retries,
            rounds_closed,
            scheduler_failures,
            subscribers,
            broadcast_evictions,
            vote_latency_ms,
        })
    }

    pub fn record_accepted(&self, color: Color) {
        self.votes_accepted.with_label_values(&[color.as_str()]).inc();
    }

    /// Render every metric in the text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
