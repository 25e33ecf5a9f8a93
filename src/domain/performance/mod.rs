// Daily performance metrics
pub mod metrics;
pub mod stats;
