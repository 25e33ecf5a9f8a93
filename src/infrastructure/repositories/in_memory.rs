//! In-Memory Port Implementations
//!
//! Thread-safe, in-memory implementations of the trade source, journal store
//! and link repository.
//!
//! # Features
//!
//! - **Thread-safe**: Uses `Arc<RwLock>` for concurrent access
//! - **Testing**: Ideal for unit tests and embedding
//!
//! # Limitations
//!
//! - Data is lost on application restart
//! - Every query is a linear scan
//!
//! For persistence, use the SQLite adapters in `infrastructure::persistence`.

use crate::domain::journal::entry::JournalEntry;
use crate::domain::journal::link::TradeJournalLink;
use crate::domain::ports::{JournalStore, TradeSource};
use crate::domain::repositories::LinkRepository;
use crate::domain::trading::types::Trade;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type UserKey = (String, String);

/// In-memory trade source keyed by (user, trade id)
pub struct InMemoryTradeSource {
    trades: Arc<RwLock<HashMap<UserKey, Trade>>>,
}

impl InMemoryTradeSource {
    pub fn new() -> Self {
        Self {
            trades: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or replace a trade
    pub async fn insert(&self, trade: Trade) {
        let key = (trade.user_id.clone(), trade.id.clone());
        self.trades.write().await.insert(key, trade);
    }

    pub async fn remove(&self, user_id: &str, trade_id: &str) -> Option<Trade> {
        self.trades
            .write()
            .await
            .remove(&(user_id.to_string(), trade_id.to_string()))
    }
}

impl Default for InMemoryTradeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TradeSource for InMemoryTradeSource {
    async fn get_trades_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Trade>> {
        let trades = self.trades.read().await;
        let mut found: Vec<Trade> = trades
            .values()
            .filter(|t| t.user_id == user_id && t.date == date)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn get_trade(&self, user_id: &str, trade_id: &str) -> Result<Option<Trade>> {
        let trades = self.trades.read().await;
        Ok(trades
            .get(&(user_id.to_string(), trade_id.to_string()))
            .cloned())
    }
}

/// In-memory journal store, one entry per (user, date)
pub struct InMemoryJournalStore {
    entries: Arc<RwLock<HashMap<(String, NaiveDate), JournalEntry>>>,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, entry: JournalEntry) {
        let key = (entry.user_id.clone(), entry.date);
        self.entries.write().await.insert(key, entry);
    }

    pub async fn remove(&self, user_id: &str, date: NaiveDate) -> Option<JournalEntry> {
        self.entries
            .write()
            .await
            .remove(&(user_id.to_string(), date))
    }
}

impl Default for InMemoryJournalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn get_journal_entry(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<JournalEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(&(user_id.to_string(), date)).cloned())
    }
}

/// In-memory implementation of LinkRepository
pub struct InMemoryLinkRepository {
    links: Arc<RwLock<HashMap<UserKey, TradeJournalLink>>>,
}

impl InMemoryLinkRepository {
    pub fn new() -> Self {
        Self {
            links: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn find_where<F>(&self, user_id: &str, predicate: F) -> Vec<TradeJournalLink>
    where
        F: Fn(&TradeJournalLink) -> bool,
    {
        let links = self.links.read().await;
        let mut found: Vec<TradeJournalLink> = links
            .values()
            .filter(|l| l.user_id == user_id && predicate(l))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        found
    }

    async fn delete_where<F>(&self, user_id: &str, predicate: F) -> usize
    where
        F: Fn(&TradeJournalLink) -> bool,
    {
        let mut links = self.links.write().await;
        let before = links.len();
        links.retain(|_, l| !(l.user_id == user_id && predicate(l)));
        before - links.len()
    }
}

impl Default for InMemoryLinkRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkRepository for InMemoryLinkRepository {
    async fn upsert(&self, link: &TradeJournalLink) -> Result<()> {
        let key = (link.user_id.clone(), link.id.clone());
        self.links.write().await.insert(key, link.clone());
        Ok(())
    }

    async fn get(&self, user_id: &str, link_id: &str) -> Result<Option<TradeJournalLink>> {
        let links = self.links.read().await;
        Ok(links
            .get(&(user_id.to_string(), link_id.to_string()))
            .cloned())
    }

    async fn delete(&self, user_id: &str, link_id: &str) -> Result<bool> {
        let mut links = self.links.write().await;
        Ok(links
            .remove(&(user_id.to_string(), link_id.to_string()))
            .is_some())
    }

    async fn find_by_trade(&self, user_id: &str, trade_id: &str) -> Result<Vec<TradeJournalLink>> {
        Ok(self.find_where(user_id, |l| l.trade_id == trade_id).await)
    }

    async fn find_by_journal_date(
        &self,
        user_id: &str,
        journal_date: NaiveDate,
    ) -> Result<Vec<TradeJournalLink>> {
        Ok(self
            .find_where(user_id, |l| l.journal_date == journal_date)
            .await)
    }

    async fn find_by_journal_entry(
        &self,
        user_id: &str,
        journal_entry_id: &str,
    ) -> Result<Vec<TradeJournalLink>> {
        Ok(self
            .find_where(user_id, |l| l.journal_entry_id == journal_entry_id)
            .await)
    }

    async fn delete_by_trade(&self, user_id: &str, trade_id: &str) -> Result<usize> {
        Ok(self.delete_where(user_id, |l| l.trade_id == trade_id).await)
    }

    async fn delete_by_journal_entry(&self, user_id: &str, journal_entry_id: &str) -> Result<usize> {
        Ok(self
            .delete_where(user_id, |l| l.journal_entry_id == journal_entry_id)
            .await)
    }
}
