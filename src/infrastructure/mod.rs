pub mod observability;
pub mod persistence;
pub mod repositories;

pub use observability::EngineMetrics;
pub use persistence::Database;
pub use repositories::{InMemoryJournalStore, InMemoryLinkRepository, InMemoryTradeSource};
