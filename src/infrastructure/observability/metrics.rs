//! Prometheus metrics definitions for the journal engine
//!
//! All metrics use the `journal_` prefix and are read-only.

use prometheus::{
    CounterVec, Gauge, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

/// Prometheus metrics for the metrics engine and link registry
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Arc<Registry>,
    /// Cache lookups by result (hit, miss, expired)
    pub cache_requests_total: IntCounterVec,
    /// Cache evictions by reason (expired, capacity, invalidated)
    pub cache_evictions_total: IntCounterVec,
    /// Live cache entries
    pub cache_entries: GenericGauge<AtomicF64>,
    /// Day computations by outcome (success, failure, timeout)
    pub computations_total: CounterVec,
    /// Wall-clock time of one day's computation
    pub computation_seconds: HistogramVec,
    /// Link registry operations
    pub link_operations_total: IntCounterVec,
    /// Active real-time subscriptions
    pub active_subscriptions: GenericGauge<AtomicF64>,
}

impl EngineMetrics {
    /// Create a new EngineMetrics instance with all gauges and counters registered
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cache_requests_total = IntCounterVec::new(
            Opts::new("journal_cache_requests_total", "Metrics cache lookups by result"),
            &["result"],
        )?;
        registry.register(Box::new(cache_requests_total.clone()))?;

        let cache_evictions_total = IntCounterVec::new(
            Opts::new(
                "journal_cache_evictions_total",
                "Metrics cache evictions by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(cache_evictions_total.clone()))?;

        let cache_entries = Gauge::with_opts(Opts::new(
            "journal_cache_entries",
            "Entries currently held by the metrics cache",
        ))?;
        registry.register(Box::new(cache_entries.clone()))?;

        let computations_total = CounterVec::new(
            Opts::new(
                "journal_computations_total",
                "Daily metrics computations by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(computations_total.clone()))?;

        let computation_seconds = HistogramVec::new(
            HistogramOpts::new(
                "journal_computation_seconds",
                "Daily metrics computation latency in seconds",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
            &["source"],
        )?;
        registry.register(Box::new(computation_seconds.clone()))?;

        let link_operations_total = IntCounterVec::new(
            Opts::new(
                "journal_link_operations_total",
                "Trade/journal link operations",
            ),
            &["operation"],
        )?;
        registry.register(Box::new(link_operations_total.clone()))?;

        let active_subscriptions = Gauge::with_opts(Opts::new(
            "journal_active_subscriptions",
            "Real-time metrics subscriptions currently polling",
        ))?;
        registry.register(Box::new(active_subscriptions.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            cache_requests_total,
            cache_evictions_total,
            cache_entries,
            computations_total,
            computation_seconds,
            link_operations_total,
            active_subscriptions,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn inc_cache_request(&self, result: &str) {
        self.cache_requests_total.with_label_values(&[result]).inc();
    }

    pub fn inc_evictions(&self, reason: &str, count: usize) {
        self.cache_evictions_total
            .with_label_values(&[reason])
            .inc_by(count as u64);
    }

    pub fn observe_computation(&self, outcome: &str, source: &str, seconds: f64) {
        self.computations_total.with_label_values(&[outcome]).inc();
        self.computation_seconds
            .with_label_values(&[source])
            .observe(seconds);
    }

    pub fn inc_link_operations(&self, operation: &str, count: usize) {
        self.link_operations_total
            .with_label_values(&[operation])
            .inc_by(count as u64);
    }

    pub fn cache_requests(&self, result: &str) -> u64 {
        self.cache_requests_total.with_label_values(&[result]).get()
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new().expect("Failed to create default EngineMetrics")
    }
}
