//! Repository Pattern Abstractions
//!
//! Persistence for trade <-> journal links, separated from the linking rules
//! in `application::linking`.
//!
//! # Current Implementation
//!
//! - `InMemoryLinkRepository`: thread-safe, `Arc<RwLock>` backed
//! - `SqliteLinkRepository`: `sqlx` over the `trade_journal_links` table
//!
//! # Example
//!
//! ```rust,no_run
//! use tradejournal::domain::repositories::LinkRepository;
//! use tradejournal::infrastructure::InMemoryLinkRepository;
//!
//! # async {
//! let repo = InMemoryLinkRepository::new();
//! let links = repo.find_by_trade("user-1", "trade-1").await?;
//! # Ok::<(), anyhow::Error>(())
//! # };
//! ```

use crate::domain::journal::link::TradeJournalLink;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Repository for trade <-> journal entry links, keyed by `(user_id, link.id)`
#[async_trait]
pub trait LinkRepository: Send + Sync {
    /// Insert or fully replace the link with the same id
    async fn upsert(&self, link: &TradeJournalLink) -> Result<()>;

    async fn get(&self, user_id: &str, link_id: &str) -> Result<Option<TradeJournalLink>>;

    /// Delete by id. Returns whether a link was removed.
    async fn delete(&self, user_id: &str, link_id: &str) -> Result<bool>;

    async fn find_by_trade(&self, user_id: &str, trade_id: &str) -> Result<Vec<TradeJournalLink>>;

    async fn find_by_journal_date(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<TradeJournalLink>>;

    async fn find_by_journal_entry(
        &self,
        user_id: &str,
        journal_entry_id: &str,
    ) -> Result<Vec<TradeJournalLink>>;

    /// Delete every link of a trade. Returns the number removed.
    async fn delete_by_trade(&self, user_id: &str, trade_id: &str) -> Result<usize>;

    /// Delete every link of a journal entry. Returns the number removed.
    async fn delete_by_journal_entry(&self, user_id: &str, journal_entry_id: &str)
    -> Result<usize>;
}
