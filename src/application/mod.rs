// Trade <-> journal links
pub mod linking;

// Daily metrics: cache, scheduling, subscriptions
pub mod metrics;

// Engine wiring
pub mod system;
