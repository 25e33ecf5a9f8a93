use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use tradejournal::application::linking::LinkRegistry;
use tradejournal::application::metrics::MetricsKey;
use tradejournal::application::system::JournalEngine;
use tradejournal::config::EngineConfig;
use tradejournal::domain::journal::entry::JournalEntry;
use tradejournal::domain::journal::link::{LinkType, TradeIntegrationData, TradeJournalLink};
use tradejournal::domain::repositories::LinkRepository;
use tradejournal::domain::trading::types::Trade;
use tradejournal::infrastructure::observability::EngineMetrics;
use tradejournal::infrastructure::repositories::{
    InMemoryJournalStore, InMemoryLinkRepository, InMemoryTradeSource,
};

// --- Link repository that rejects writes for one trade ---
struct FlakyLinkRepo {
    inner: InMemoryLinkRepository,
    reject_trade: Option<String>,
    fail_reads: bool,
}

#[async_trait]
impl LinkRepository for FlakyLinkRepo {
    async fn upsert(&self, link: &TradeJournalLink) -> anyhow::Result<()> {
        if self.reject_trade.as_deref() == Some(link.trade_id.as_str()) {
            anyhow::bail!("write rejected for {}", link.trade_id);
        }
        self.inner.upsert(link).await
    }

    async fn get(&self, user_id: &str, link_id: &str) -> anyhow::Result<Option<TradeJournalLink>> {
        self.inner.get(user_id, link_id).await
    }

    async fn delete(&self, user_id: &str, link_id: &str) -> anyhow::Result<bool> {
        self.inner.delete(user_id, link_id).await
    }

    async fn find_by_trade(
        &self,
        user_id: &str,
        trade_id: &str,
    ) -> anyhow::Result<Vec<TradeJournalLink>> {
        if self.fail_reads {
            anyhow::bail!("link store offline");
        }
        self.inner.find_by_trade(user_id, trade_id).await
    }

    async fn find_by_journal_date(
        &self,
        user_id: &str,
        journal_date: NaiveDate,
    ) -> anyhow::Result<Vec<TradeJournalLink>> {
        self.inner.find_by_journal_date(user_id, journal_date).await
    }

    async fn find_by_journal_entry(
        &self,
        user_id: &str,
        journal_entry_id: &str,
    ) -> anyhow::Result<Vec<TradeJournalLink>> {
        self.inner
            .find_by_journal_entry(user_id, journal_entry_id)
            .await
    }

    async fn delete_by_trade(&self, user_id: &str, trade_id: &str) -> anyhow::Result<usize> {
        self.inner.delete_by_trade(user_id, trade_id).await
    }

    async fn delete_by_journal_entry(
        &self,
        user_id: &str,
        journal_entry_id: &str,
    ) -> anyhow::Result<usize> {
        self.inner
            .delete_by_journal_entry(user_id, journal_entry_id)
            .await
    }
}

// --- Helpers ---
fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
}

struct Setup {
    trades: Arc<InMemoryTradeSource>,
    journal: Arc<InMemoryJournalStore>,
    engine: JournalEngine,
}

fn setup() -> Setup {
    let trades = Arc::new(InMemoryTradeSource::new());
    let journal = Arc::new(InMemoryJournalStore::new());
    let engine = JournalEngine::with_ports(
        EngineConfig::default(),
        trades.clone(),
        journal.clone(),
        Arc::new(InMemoryLinkRepository::new()),
    )
    .unwrap();
    Setup {
        trades,
        journal,
        engine,
    }
}

async fn seed_day(s: &Setup, date: NaiveDate, trade_ids: &[&str]) {
    for id in trade_ids {
        s.trades
            .insert(Trade::open(id, "trader", "ES", date, dec!(1)))
            .await;
    }
    let mut entry = JournalEntry::new(&format!("j-{}", date), "trader", date);
    entry.content = format!("Review for {}", date);
    s.journal.insert(entry).await;
}

#[tokio::test]
async fn test_batch_auto_link_single_journal_day() {
    let s = setup();
    seed_day(&s, day(3), &["t1", "t2", "t3"]).await;
    // Trades without a journal entry are left alone
    s.trades
        .insert(Trade::open("t9", "trader", "ES", day(5), dec!(1)))
        .await;

    let report = s
        .engine
        .link_registry
        .batch_auto_link("trader", day(1), day(7))
        .await
        .unwrap();

    assert_eq!(report.total_processed, 7);
    assert_eq!(report.total_linked, 3);
    assert!(report.errors.is_empty());

    let links = s
        .engine
        .link_registry
        .links_for_journal_date("trader", day(3))
        .await
        .unwrap();
    assert_eq!(links.len(), 3);
    assert!(links.iter().all(|l| l.link_type == LinkType::Auto));
    assert!(
        s.engine
            .link_registry
            .links_for_trade("trader", "t9")
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_auto_link_is_idempotent() {
    let s = setup();
    seed_day(&s, day(2), &["t1", "t2"]).await;

    let registry = &s.engine.link_registry;
    assert_eq!(registry.auto_link("trader", day(2)).await.unwrap(), 2);
    assert_eq!(registry.auto_link("trader", day(2)).await.unwrap(), 2);
    assert_eq!(
        registry
            .links_for_journal_date("trader", day(2))
            .await
            .unwrap()
            .len(),
        2
    );
}

#[tokio::test]
async fn test_batch_auto_link_keeps_manual_links() {
    let s = setup();
    seed_day(&s, day(4), &["t1", "t2"]).await;

    let registry = &s.engine.link_registry;
    let manual = registry
        .link("trader", "t1", day(4), LinkType::Manual)
        .await
        .unwrap();

    let report = registry
        .batch_auto_link("trader", day(4), day(4))
        .await
        .unwrap();
    assert_eq!(report.total_linked, 2);

    let t1 = registry.links_for_trade("trader", "t1").await.unwrap();
    assert_eq!(t1.len(), 1);
    assert_eq!(t1[0].link_type, LinkType::Manual);
    assert_eq!(t1[0].created_at, manual.created_at);
    assert!(t1[0].updated_at > manual.updated_at);

    let t2 = registry.links_for_trade("trader", "t2").await.unwrap();
    assert_eq!(t2[0].link_type, LinkType::Auto);
}

#[tokio::test]
async fn test_auto_link_skips_failed_trades() {
    let trades = Arc::new(InMemoryTradeSource::new());
    let journal = Arc::new(InMemoryJournalStore::new());
    for id in ["t1", "t2", "t3"] {
        trades
            .insert(Trade::open(id, "trader", "ES", day(8), dec!(1)))
            .await;
    }
    journal
        .insert(JournalEntry::new("j8", "trader", day(8)))
        .await;

    let registry = LinkRegistry::new(
        trades,
        journal,
        Arc::new(FlakyLinkRepo {
            inner: InMemoryLinkRepository::new(),
            reject_trade: Some("t2".to_string()),
            fail_reads: false,
        }),
        EngineMetrics::default(),
    );

    assert_eq!(registry.auto_link("trader", day(8)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_integration_data_summary() {
    let s = setup();
    seed_day(&s, day(10), &["t1"]).await;

    let mut later = JournalEntry::new("j-late", "trader", day(11));
    later.screenshots = vec!["chart.png".to_string(), "fill.png".to_string()];
    s.journal.insert(later).await;

    let registry = &s.engine.link_registry;
    registry
        .link("trader", "t1", day(10), LinkType::Auto)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    registry
        .link("trader", "t1", day(11), LinkType::Manual)
        .await
        .unwrap();

    let data = registry.trade_integration_data("trader", "t1").await;
    assert!(data.has_journal_notes);
    assert_eq!(data.link_count, 2);
    assert_eq!(data.journal_dates, vec![day(10), day(11)]);
    // Only the day-10 entry has written content
    assert_eq!(data.note_count, 1);
    let most_recent = data.most_recent_link.unwrap();
    assert_eq!(most_recent.journal_date, day(11));
    assert_eq!(data.screenshot_count, 2);
}

#[tokio::test]
async fn test_integration_data_degrades_on_failure() {
    let registry = LinkRegistry::new(
        Arc::new(InMemoryTradeSource::new()),
        Arc::new(InMemoryJournalStore::new()),
        Arc::new(FlakyLinkRepo {
            inner: InMemoryLinkRepository::new(),
            reject_trade: None,
            fail_reads: true,
        }),
        EngineMetrics::default(),
    );

    let data = registry.trade_integration_data("trader", "t1").await;
    assert_eq!(data, TradeIntegrationData::empty("t1"));
}

#[tokio::test]
async fn test_cascade_delete_for_trade_and_entry() {
    let s = setup();
    seed_day(&s, day(12), &["t1", "t2"]).await;
    seed_day(&s, day(13), &[]).await;

    let registry = &s.engine.link_registry;
    registry.auto_link("trader", day(12)).await.unwrap();
    registry
        .link("trader", "t1", day(13), LinkType::Manual)
        .await
        .unwrap();

    assert_eq!(
        registry
            .cascade_delete_links_for_trade("trader", "t1")
            .await
            .unwrap(),
        2
    );
    assert!(registry.links_for_trade("trader", "t1").await.unwrap().is_empty());

    let entry_id = format!("j-{}", day(12));
    assert_eq!(
        registry
            .cascade_delete_links_for_journal_entry("trader", &entry_id)
            .await
            .unwrap(),
        1
    );
    assert!(
        registry
            .links_for_journal_date("trader", day(12))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_refresh_metadata_follows_trade_edits() {
    let s = setup();
    seed_day(&s, day(15), &["t1"]).await;
    let registry = &s.engine.link_registry;
    let original = registry
        .link("trader", "t1", day(15), LinkType::Manual)
        .await
        .unwrap();

    let mut edited = Trade::open("t1", "trader", "NQ", day(15), dec!(4));
    edited.pnl = Some(dec!(120));
    s.trades.insert(edited).await;

    assert_eq!(registry.refresh_link_metadata("trader", "t1").await.unwrap(), 1);
    let links = registry.links_for_trade("trader", "t1").await.unwrap();
    let metadata = links[0].metadata.as_ref().unwrap();
    assert_eq!(metadata.symbol, "NQ");
    assert_eq!(metadata.pnl, Some(dec!(120)));
    assert_eq!(links[0].created_at, original.created_at);
    assert!(links[0].updated_at > original.updated_at);
}

#[tokio::test]
async fn test_link_changes_refresh_day_flags() {
    let s = setup();
    seed_day(&s, day(20), &["t1"]).await;
    let engine = &s.engine;

    let before = engine
        .metrics_service
        .calculate_daily_metrics("trader", day(20))
        .await
        .unwrap();
    assert!(before.metrics.has_journal_entry);
    assert!(!before.metrics.has_trade_notes);
    assert!(engine.cache.get(&MetricsKey::new("trader", day(20))).is_some());

    engine
        .link_registry
        .link("trader", "t1", day(20), LinkType::Manual)
        .await
        .unwrap();

    let after = engine
        .metrics_service
        .calculate_daily_metrics("trader", day(20))
        .await
        .unwrap();
    assert!(!after.is_from_cache());
    assert!(after.metrics.has_trade_notes);

    engine
        .link_registry
        .unlink("trader", "t1", day(20))
        .await
        .unwrap();
    let unlinked = engine
        .metrics_service
        .calculate_daily_metrics("trader", day(20))
        .await
        .unwrap();
    assert!(!unlinked.metrics.has_trade_notes);
}
