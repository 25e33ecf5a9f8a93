pub mod cache;
pub mod outcome;
pub mod scheduler;
pub mod service;
pub mod subscription;

pub use cache::{MetricsCache, MetricsKey};
pub use outcome::{MetricsOutcome, MetricsSource};
pub use scheduler::BatchScheduler;
pub use service::MetricsService;
pub use subscription::{Subscription, SubscriptionManager};
