//! Trade ↔ journal entry associations.
//!
//! Links have a deterministic id (`{trade_id}_{journal_date}`), so creating
//! the same link twice is an upsert. Every mutation drops the cached metrics
//! of the affected journal date, since those carry link-derived flags.

use crate::application::metrics::cache::{MetricsCache, MetricsKey};
use crate::domain::calendar;
use crate::domain::errors::JournalError;
use crate::domain::journal::entry::JournalEntry;
use crate::domain::journal::link::{
    BatchLinkReport, DateError, LinkType, TradeIntegrationData, TradeJournalLink,
};
use crate::domain::ports::{JournalStore, TradeSource};
use crate::domain::repositories::LinkRepository;
use crate::domain::trading::types::Trade;
use crate::infrastructure::observability::EngineMetrics;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct LinkRegistry {
    trades: Arc<dyn TradeSource>,
    journal: Arc<dyn JournalStore>,
    links: Arc<dyn LinkRepository>,
    cache: Option<Arc<MetricsCache>>,
    metrics: EngineMetrics,
}

impl LinkRegistry {
    pub fn new(
        trades: Arc<dyn TradeSource>,
        journal: Arc<dyn JournalStore>,
        links: Arc<dyn LinkRepository>,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            trades,
            journal,
            links,
            cache: None,
            metrics,
        }
    }

    /// Invalidate entries of `cache` whenever links change
    pub fn with_cache(mut self, cache: Arc<MetricsCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Creates or refreshes the link between a trade and the journal entry
    /// of `journal_date`. Both must exist. An existing link keeps its
    /// original `link_type`.
    pub async fn link(
        &self,
        user_id: &str,
        trade_id: &str,
        journal_date: NaiveDate,
        link_type: LinkType,
    ) -> Result<TradeJournalLink, JournalError> {
        require_id("user id", user_id)?;
        require_id("trade id", trade_id)?;

        let trade = self
            .trades
            .get_trade(user_id, trade_id)
            .await
            .map_err(|e| JournalError::fetch(format!("trade {}", trade_id), e))?
            .ok_or_else(|| JournalError::trade_not_found(trade_id))?;
        let entry = self
            .fetch_entry(user_id, journal_date)
            .await?
            .ok_or_else(|| JournalError::journal_not_found(journal_date))?;

        let link = self.upsert_link(user_id, &trade, &entry, link_type).await?;
        self.metrics.inc_link_operations("link", 1);
        info!(
            "LinkRegistry: Linked trade {} to journal {} ({})",
            trade_id, journal_date, link.link_type
        );
        Ok(link)
    }

    /// Removes the link if present. Returns whether anything was deleted.
    pub async fn unlink(
        &self,
        user_id: &str,
        trade_id: &str,
        journal_date: NaiveDate,
    ) -> Result<bool, JournalError> {
        require_id("user id", user_id)?;
        require_id("trade id", trade_id)?;

        let link_id = TradeJournalLink::link_id(trade_id, journal_date);
        let removed = self
            .links
            .delete(user_id, &link_id)
            .await
            .map_err(|e| JournalError::fetch(format!("link {}", link_id), e))?;

        if removed {
            self.invalidate(user_id, journal_date);
            self.metrics.inc_link_operations("unlink", 1);
            info!("LinkRegistry: Unlinked {}", link_id);
        } else {
            debug!("LinkRegistry: Unlink of missing {} ignored", link_id);
        }
        Ok(removed)
    }

    /// Links of a trade, most recent first
    pub async fn links_for_trade(
        &self,
        user_id: &str,
        trade_id: &str,
    ) -> Result<Vec<TradeJournalLink>, JournalError> {
        require_id("user id", user_id)?;
        require_id("trade id", trade_id)?;

        let mut links = self
            .links
            .find_by_trade(user_id, trade_id)
            .await
            .map_err(|e| JournalError::fetch(format!("links for trade {}", trade_id), e))?;
        links.sort_by(TradeJournalLink::recency_order);
        Ok(links)
    }

    /// Links of a journal date, most recent first
    pub async fn links_for_journal_date(
        &self,
        user_id: &str,
        journal_date: NaiveDate,
    ) -> Result<Vec<TradeJournalLink>, JournalError> {
        require_id("user id", user_id)?;

        let mut links = self
            .links
            .find_by_journal_date(user_id, journal_date)
            .await
            .map_err(|e| JournalError::fetch(format!("links for {}", journal_date), e))?;
        links.sort_by(TradeJournalLink::recency_order);
        Ok(links)
    }

    /// Links every trade of `date` to that day's journal entry.
    ///
    /// Returns 0 without touching anything when there is no journal entry.
    /// A trade that fails to link is logged and skipped.
    pub async fn auto_link(&self, user_id: &str, date: NaiveDate) -> Result<usize, JournalError> {
        require_id("user id", user_id)?;

        let Some(entry) = self.fetch_entry(user_id, date).await? else {
            debug!("LinkRegistry: No journal entry on {}, nothing to link", date);
            return Ok(0);
        };

        let trades = self
            .trades
            .get_trades_for_date(user_id, date)
            .await
            .map_err(|e| JournalError::fetch(format!("trades for {}", date), e))?;

        let mut linked = 0;
        for trade in &trades {
            match self.upsert_link(user_id, trade, &entry, LinkType::Auto).await {
                Ok(_) => linked += 1,
                Err(e) => warn!(
                    "LinkRegistry: Auto-link of trade {} on {} failed: {}",
                    trade.id, date, e
                ),
            }
        }

        self.metrics.inc_link_operations("auto_link", linked);
        if linked > 0 {
            info!(
                "LinkRegistry: Auto-linked {}/{} trades on {}",
                linked,
                trades.len(),
                date
            );
        }
        Ok(linked)
    }

    /// Auto-links each day of the inclusive range. Per-day failures are
    /// collected in the report; only an invalid range is an error.
    pub async fn batch_auto_link(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BatchLinkReport, JournalError> {
        require_id("user id", user_id)?;
        let dates = calendar::date_range(start, end)?;

        let mut report = BatchLinkReport::default();
        for date in dates {
            report.total_processed += 1;
            match self.auto_link(user_id, date).await {
                Ok(count) => report.total_linked += count,
                Err(e) => {
                    warn!("LinkRegistry: Auto-link for {} failed: {}", date, e);
                    report.errors.push(DateError {
                        date,
                        message: e.to_string(),
                    });
                }
            }
        }

        info!(
            "LinkRegistry: Batch auto-link {}..{} processed {} days, linked {}, {} errors",
            start,
            end,
            report.total_processed,
            report.total_linked,
            report.errors.len()
        );
        Ok(report)
    }

    /// Journal summary for a trade. Any lookup failure yields
    /// [`TradeIntegrationData::empty`].
    pub async fn trade_integration_data(&self, user_id: &str, trade_id: &str) -> TradeIntegrationData {
        match self.collect_integration_data(user_id, trade_id).await {
            Ok(data) => data,
            Err(e) => {
                warn!(
                    "LinkRegistry: Integration data for trade {} unavailable: {}",
                    trade_id, e
                );
                TradeIntegrationData::empty(trade_id)
            }
        }
    }

    async fn collect_integration_data(
        &self,
        user_id: &str,
        trade_id: &str,
    ) -> Result<TradeIntegrationData, JournalError> {
        let links = self.links_for_trade(user_id, trade_id).await?;
        if links.is_empty() {
            return Ok(TradeIntegrationData::empty(trade_id));
        }

        let dates: BTreeSet<NaiveDate> = links.iter().map(|l| l.journal_date).collect();
        let mut entries: BTreeMap<NaiveDate, JournalEntry> = BTreeMap::new();
        for &date in &dates {
            if let Some(entry) = self.fetch_entry(user_id, date).await? {
                entries.insert(date, entry);
            }
        }

        let most_recent_link = TradeJournalLink::most_recent(&links).cloned();
        let screenshot_count = most_recent_link
            .as_ref()
            .and_then(|l| entries.get(&l.journal_date))
            .map_or(0, |e| e.screenshots.len());
        let note_count = entries.values().filter(|e| e.has_content()).count();

        Ok(TradeIntegrationData {
            trade_id: trade_id.to_string(),
            has_journal_notes: true,
            link_count: links.len(),
            journal_dates: dates.into_iter().collect(),
            most_recent_link,
            note_count,
            screenshot_count,
        })
    }

    /// Removes every link of a deleted trade
    pub async fn cascade_delete_links_for_trade(
        &self,
        user_id: &str,
        trade_id: &str,
    ) -> Result<usize, JournalError> {
        require_id("user id", user_id)?;
        require_id("trade id", trade_id)?;

        let affected = self.links_for_trade(user_id, trade_id).await?;
        let removed = self
            .links
            .delete_by_trade(user_id, trade_id)
            .await
            .map_err(|e| JournalError::fetch(format!("links for trade {}", trade_id), e))?;

        for link in &affected {
            self.invalidate(user_id, link.journal_date);
        }
        self.metrics.inc_link_operations("cascade_delete", removed);
        info!(
            "LinkRegistry: Removed {} links of deleted trade {}",
            removed, trade_id
        );
        Ok(removed)
    }

    /// Removes every link pointing at a deleted journal entry
    pub async fn cascade_delete_links_for_journal_entry(
        &self,
        user_id: &str,
        journal_entry_id: &str,
    ) -> Result<usize, JournalError> {
        require_id("user id", user_id)?;
        require_id("journal entry id", journal_entry_id)?;

        let context = || format!("links for journal entry {}", journal_entry_id);
        let affected = self
            .links
            .find_by_journal_entry(user_id, journal_entry_id)
            .await
            .map_err(|e| JournalError::fetch(context(), e))?;
        let removed = self
            .links
            .delete_by_journal_entry(user_id, journal_entry_id)
            .await
            .map_err(|e| JournalError::fetch(context(), e))?;

        for date in affected.iter().map(|l| l.journal_date).collect::<BTreeSet<_>>() {
            self.invalidate(user_id, date);
        }
        self.metrics.inc_link_operations("cascade_delete", removed);
        info!(
            "LinkRegistry: Removed {} links of deleted journal entry {}",
            removed, journal_entry_id
        );
        Ok(removed)
    }

    /// Re-snapshots the trade's current fields into all of its links
    pub async fn refresh_link_metadata(
        &self,
        user_id: &str,
        trade_id: &str,
    ) -> Result<usize, JournalError> {
        require_id("user id", user_id)?;
        require_id("trade id", trade_id)?;

        let trade = self
            .trades
            .get_trade(user_id, trade_id)
            .await
            .map_err(|e| JournalError::fetch(format!("trade {}", trade_id), e))?
            .ok_or_else(|| JournalError::trade_not_found(trade_id))?;

        let links = self.links_for_trade(user_id, trade_id).await?;
        let now = Utc::now();
        for link in &links {
            let refreshed = link.with_metadata(&trade, now);
            self.links
                .upsert(&refreshed)
                .await
                .map_err(|e| JournalError::fetch(format!("link {}", link.id), e))?;
            self.invalidate(user_id, link.journal_date);
        }

        self.metrics.inc_link_operations("refresh", links.len());
        debug!(
            "LinkRegistry: Refreshed metadata on {} links of trade {}",
            links.len(),
            trade_id
        );
        Ok(links.len())
    }

    async fn upsert_link(
        &self,
        user_id: &str,
        trade: &Trade,
        entry: &JournalEntry,
        link_type: LinkType,
    ) -> Result<TradeJournalLink, JournalError> {
        let link_id = TradeJournalLink::link_id(&trade.id, entry.date);
        let existing = self
            .links
            .get(user_id, &link_id)
            .await
            .map_err(|e| JournalError::fetch(format!("link {}", link_id), e))?;

        let now = Utc::now();
        let link = match existing {
            Some(current) => current.with_metadata(trade, now),
            None => TradeJournalLink::new(user_id, trade, entry, link_type, now),
        };

        self.links
            .upsert(&link)
            .await
            .map_err(|e| JournalError::fetch(format!("link {}", link_id), e))?;
        self.invalidate(user_id, entry.date);
        Ok(link)
    }

    async fn fetch_entry(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<JournalEntry>, JournalError> {
        self.journal
            .get_journal_entry(user_id, date)
            .await
            .map_err(|e| JournalError::fetch(format!("journal entry for {}", date), e))
    }

    fn invalidate(&self, user_id: &str, date: NaiveDate) {
        if let Some(cache) = &self.cache {
            cache.invalidate(&MetricsKey::new(user_id, date));
        }
    }
}

fn require_id(field: &str, value: &str) -> Result<(), JournalError> {
    if value.trim().is_empty() {
        return Err(JournalError::validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::performance::metrics::DayMetrics;
    use crate::infrastructure::repositories::in_memory::{
        InMemoryJournalStore, InMemoryLinkRepository, InMemoryTradeSource,
    };
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Fixture {
        trades: Arc<InMemoryTradeSource>,
        journal: Arc<InMemoryJournalStore>,
        links: Arc<InMemoryLinkRepository>,
        cache: Arc<MetricsCache>,
        registry: LinkRegistry,
    }

    fn fixture() -> Fixture {
        let trades = Arc::new(InMemoryTradeSource::new());
        let journal = Arc::new(InMemoryJournalStore::new());
        let links = Arc::new(InMemoryLinkRepository::new());
        let cache = Arc::new(MetricsCache::with_limits(Duration::from_secs(300), 100));
        let registry = LinkRegistry::new(
            trades.clone(),
            journal.clone(),
            links.clone(),
            EngineMetrics::default(),
        )
        .with_cache(cache.clone());
        Fixture {
            trades,
            journal,
            links,
            cache,
            registry,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    #[tokio::test]
    async fn test_link_requires_both_sides() {
        let f = fixture();
        let err = f
            .registry
            .link("u1", "t1", day(1), LinkType::Manual)
            .await
            .unwrap_err();
        assert!(matches!(err, JournalError::NotFound { entity: "Trade", .. }));

        f.trades
            .insert(Trade::open("t1", "u1", "AAPL", day(1), dec!(10)))
            .await;
        let err = f
            .registry
            .link("u1", "t1", day(1), LinkType::Manual)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JournalError::NotFound {
                entity: "Journal entry",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_link_twice_keeps_one_record() {
        let f = fixture();
        f.trades
            .insert(Trade::open("t1", "u1", "AAPL", day(1), dec!(10)))
            .await;
        f.journal.insert(JournalEntry::new("j1", "u1", day(1))).await;

        let first = f
            .registry
            .link("u1", "t1", day(1), LinkType::Manual)
            .await
            .unwrap();
        let second = f
            .registry
            .link("u1", "t1", day(1), LinkType::Direct)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
        assert!(second.updated_at > first.updated_at);
        // The first link type sticks
        assert_eq!(second.link_type, LinkType::Manual);
        assert_eq!(f.links.len().await, 1);
    }

    #[tokio::test]
    async fn test_unlink_missing_is_noop() {
        let f = fixture();
        assert!(!f.registry.unlink("u1", "t1", day(1)).await.unwrap());
    }

    #[tokio::test]
    async fn test_link_invalidates_cached_metrics() {
        let f = fixture();
        f.trades
            .insert(Trade::open("t1", "u1", "AAPL", day(2), dec!(10)))
            .await;
        f.journal.insert(JournalEntry::new("j2", "u1", day(2))).await;
        let key = MetricsKey::new("u1", day(2));
        f.cache.set(key.clone(), DayMetrics::empty(day(2)));

        f.registry
            .link("u1", "t1", day(2), LinkType::Manual)
            .await
            .unwrap();
        assert!(f.cache.get(&key).is_none());
    }

    #[tokio::test]
    async fn test_auto_link_without_entry_returns_zero() {
        let f = fixture();
        f.trades
            .insert(Trade::open("t1", "u1", "AAPL", day(3), dec!(10)))
            .await;
        assert_eq!(f.registry.auto_link("u1", day(3)).await.unwrap(), 0);
        assert_eq!(f.links.len().await, 0);
    }

    #[tokio::test]
    async fn test_batch_auto_link_counts_days() {
        let f = fixture();
        f.trades
            .insert(Trade::open("t1", "u1", "AAPL", day(4), dec!(10)))
            .await;
        f.trades
            .insert(Trade::open("t2", "u1", "MSFT", day(4), dec!(5)))
            .await;
        f.journal.insert(JournalEntry::new("j4", "u1", day(4))).await;

        let report = f
            .registry
            .batch_auto_link("u1", day(1), day(7))
            .await
            .unwrap();
        assert_eq!(report.total_processed, 7);
        assert_eq!(report.total_linked, 2);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn test_batch_auto_link_rejects_inverted_range() {
        let f = fixture();
        let err = f
            .registry
            .batch_auto_link("u1", day(5), day(1))
            .await
            .unwrap_err();
        assert!(matches!(err, JournalError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_empty_ids_fail_validation() {
        let f = fixture();
        let err = f
            .registry
            .link("u1", "", day(1), LinkType::Manual)
            .await
            .unwrap_err();
        assert!(matches!(err, JournalError::Validation { .. }));
    }
}
