//! Chunked, concurrent computation of daily metrics across date ranges.

use super::cache::{MetricsCache, MetricsKey};
use super::outcome::{MetricsOutcome, MetricsSource};
use crate::config::SchedulerEnvConfig;
use crate::domain::errors::JournalError;
use crate::domain::performance::metrics::{DayMetrics, JournalFlags};
use crate::domain::ports::{JournalStore, TradeSource};
use crate::domain::repositories::LinkRepository;
use crate::infrastructure::observability::EngineMetrics;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub struct BatchScheduler {
    trades: Arc<dyn TradeSource>,
    journal: Arc<dyn JournalStore>,
    links: Arc<dyn LinkRepository>,
    cache: Arc<MetricsCache>,
    config: SchedulerEnvConfig,
    metrics: EngineMetrics,
}

impl BatchScheduler {
    pub fn new(
        trades: Arc<dyn TradeSource>,
        journal: Arc<dyn JournalStore>,
        links: Arc<dyn LinkRepository>,
        cache: Arc<MetricsCache>,
        config: SchedulerEnvConfig,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            trades,
            journal,
            links,
            cache,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &SchedulerEnvConfig {
        &self.config
    }

    /// Computes every distinct date in `dates`, `chunk_size` at a time.
    ///
    /// Always returns one entry per distinct date. A date that fails (fetch
    /// error, timeout) gets zeroed metrics and an error message instead.
    pub async fn compute_range(
        &self,
        user_id: &str,
        dates: &[NaiveDate],
    ) -> BTreeMap<NaiveDate, MetricsOutcome> {
        let unique: Vec<NaiveDate> = dates
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let chunk_size = self.config.chunk_size.max(1);
        let pacing = self.config.pacing();
        let started = Instant::now();

        let mut results = BTreeMap::new();
        for (index, chunk) in unique.chunks(chunk_size).enumerate() {
            if index > 0 && !pacing.is_zero() {
                tokio::time::sleep(pacing).await;
            }

            let futs: Vec<_> = chunk
                .iter()
                .map(|&date| async move {
                    let unit_started = Instant::now();
                    let outcome = match self.compute_one(user_id, date, false).await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(
                                "BatchScheduler: Metrics for {} on {} failed: {}",
                                user_id, date, e
                            );
                            MetricsOutcome::fallback(date, &e, unit_started.elapsed())
                        }
                    };
                    (date, outcome)
                })
                .collect();

            for (date, outcome) in futures::future::join_all(futs).await {
                results.insert(date, outcome);
            }
        }

        let failed = results.values().filter(|o| o.is_error()).count();
        info!(
            "BatchScheduler: Computed {} dates for {} in {:?} ({} failed)",
            results.len(),
            user_id,
            started.elapsed(),
            failed
        );
        results
    }

    /// One unit of work. `force` skips the cache read but still refreshes
    /// the cache with the new value.
    pub async fn compute_one(
        &self,
        user_id: &str,
        date: NaiveDate,
        force: bool,
    ) -> Result<MetricsOutcome, JournalError> {
        if user_id.trim().is_empty() {
            return Err(JournalError::validation("user id must not be empty"));
        }

        let started = Instant::now();
        let key = MetricsKey::new(user_id, date);

        if !force {
            if let Some(metrics) = self.cache.get(&key) {
                debug!("BatchScheduler: Cache hit for {} on {}", user_id, date);
                return Ok(MetricsOutcome {
                    metrics,
                    source: MetricsSource::Cache,
                    calculation_time: started.elapsed(),
                    error: None,
                });
            }
        }

        let computed = match self.config.compute_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.fetch_and_compute(user_id, date))
                .await
                .map_err(|_| JournalError::Timeout {
                    date,
                    duration_ms: limit.as_millis() as u64,
                })
                .and_then(|r| r),
            None => self.fetch_and_compute(user_id, date).await,
        };

        let elapsed = started.elapsed();
        match computed {
            Ok(metrics) => {
                self.metrics
                    .observe_computation("success", "calculated", elapsed.as_secs_f64());
                self.cache.set(key, metrics.clone());
                Ok(MetricsOutcome {
                    metrics,
                    source: MetricsSource::Calculated,
                    calculation_time: elapsed,
                    error: None,
                })
            }
            Err(e) => {
                let outcome = match e {
                    JournalError::Timeout { .. } => "timeout",
                    _ => "failure",
                };
                self.metrics
                    .observe_computation(outcome, "calculated", elapsed.as_secs_f64());
                Err(e)
            }
        }
    }

    async fn fetch_and_compute(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<DayMetrics, JournalError> {
        let (trades, entry, links) = tokio::try_join!(
            async {
                self.trades
                    .get_trades_for_date(user_id, date)
                    .await
                    .map_err(|e| JournalError::fetch(format!("trades for {}", date), e))
            },
            async {
                self.journal
                    .get_journal_entry(user_id, date)
                    .await
                    .map_err(|e| JournalError::fetch(format!("journal entry for {}", date), e))
            },
            async {
                self.links
                    .find_by_journal_date(user_id, date)
                    .await
                    .map_err(|e| JournalError::fetch(format!("links for {}", date), e))
            },
        )?;

        let flags = JournalFlags {
            has_journal_entry: entry.is_some(),
            has_trade_notes: !links.is_empty() || trades.iter().any(|t| t.has_notes()),
            completion_percentage: entry.as_ref().map_or(0, |e| e.completion_percentage),
            has_screenshots: entry.as_ref().is_some_and(|e| e.has_screenshots()),
        };

        debug!(
            "BatchScheduler: Computing {} on {} from {} trades",
            user_id,
            date,
            trades.len()
        );
        Ok(DayMetrics::compute(date, &trades).with_journal_flags(flags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::journal::entry::JournalEntry;
    use crate::domain::trading::types::Trade;
    use crate::infrastructure::repositories::in_memory::{
        InMemoryJournalStore, InMemoryLinkRepository, InMemoryTradeSource,
    };
    use chrono::NaiveTime;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
    }

    fn closed(id: &str, date: NaiveDate, pnl: rust_decimal::Decimal, hour: u32) -> Trade {
        let mut trade = Trade::open(id, "u1", "EURUSD", date, dec!(1));
        trade.entry_time = NaiveTime::from_hms_opt(hour, 0, 0);
        trade.status = crate::domain::trading::types::TradeStatus::Closed;
        trade.pnl = Some(pnl);
        trade
    }

    fn scheduler(
        trades: Arc<InMemoryTradeSource>,
        journal: Arc<InMemoryJournalStore>,
        config: SchedulerEnvConfig,
    ) -> BatchScheduler {
        BatchScheduler::new(
            trades,
            journal,
            Arc::new(InMemoryLinkRepository::new()),
            Arc::new(MetricsCache::with_limits(Duration::from_secs(300), 100)),
            config,
            EngineMetrics::default(),
        )
    }

    #[tokio::test]
    async fn test_compute_one_then_cache_hit() {
        let trades = Arc::new(InMemoryTradeSource::new());
        trades.insert(closed("t1", day(1), dec!(20), 9)).await;
        let sched = scheduler(
            trades,
            Arc::new(InMemoryJournalStore::new()),
            SchedulerEnvConfig::default(),
        );

        let first = sched.compute_one("u1", day(1), false).await.unwrap();
        assert_eq!(first.source, MetricsSource::Calculated);
        assert_eq!(first.metrics.pnl, dec!(20));

        let second = sched.compute_one("u1", day(1), false).await.unwrap();
        assert_eq!(second.source, MetricsSource::Cache);
        assert_eq!(second.metrics, first.metrics);

        let forced = sched.compute_one("u1", day(1), true).await.unwrap();
        assert_eq!(forced.source, MetricsSource::Calculated);
    }

    #[tokio::test]
    async fn test_journal_flags_applied() {
        let trades = Arc::new(InMemoryTradeSource::new());
        let journal = Arc::new(InMemoryJournalStore::new());
        let mut entry = JournalEntry::new("j1", "u1", day(2));
        entry.completion_percentage = 80;
        entry.screenshots.push("shot.png".to_string());
        journal.insert(entry).await;

        let sched = scheduler(trades, journal, SchedulerEnvConfig::default());
        let outcome = sched.compute_one("u1", day(2), false).await.unwrap();
        assert!(outcome.metrics.has_journal_entry);
        assert!(outcome.metrics.has_screenshots);
        assert_eq!(outcome.metrics.completion_percentage, 80);
        assert!(!outcome.metrics.has_trade_notes);
    }

    #[tokio::test]
    async fn test_range_deduplicates_and_chunks() {
        let trades = Arc::new(InMemoryTradeSource::new());
        trades.insert(closed("t1", day(3), dec!(5), 9)).await;
        let config = SchedulerEnvConfig {
            chunk_size: 2,
            pacing_ms: 0,
            ..SchedulerEnvConfig::default()
        };
        let sched = scheduler(trades, Arc::new(InMemoryJournalStore::new()), config);

        let dates = [day(1), day(2), day(3), day(3), day(4), day(5)];
        let results = sched.compute_range("u1", &dates).await;
        assert_eq!(results.len(), 5);
        assert_eq!(results[&day(3)].metrics.pnl, dec!(5));
        assert!(results.values().all(|o| !o.is_error()));
    }

    #[tokio::test]
    async fn test_empty_user_rejected() {
        let sched = scheduler(
            Arc::new(InMemoryTradeSource::new()),
            Arc::new(InMemoryJournalStore::new()),
            SchedulerEnvConfig::default(),
        );
        let err = sched.compute_one(" ", day(1), false).await.unwrap_err();
        assert!(matches!(err, JournalError::Validation { .. }));
    }
}
