//! Push-based observability for the journal engine
//!
//! Counters and histograms are collected in a private Prometheus registry and
//! rendered as text on demand (the CLI prints them with `--metrics`). Nothing
//! here listens for requests.

pub mod metrics;

pub use metrics::EngineMetrics;
