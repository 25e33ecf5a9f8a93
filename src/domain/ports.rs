use crate::domain::journal::entry::JournalEntry;
use crate::domain::trading::types::Trade;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Read access to the user's trade records
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// All trades (open and closed) whose calendar day is `date`
    async fn get_trades_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Trade>>;

    async fn get_trade(&self, user_id: &str, trade_id: &str) -> Result<Option<Trade>>;
}

/// Read access to journal entries, at most one per (user, date)
#[async_trait]
pub trait JournalStore: Send + Sync {
    async fn get_journal_entry(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<JournalEntry>>;
}
