use super::cache::{MetricsCache, MetricsKey};
use super::outcome::MetricsOutcome;
use super::scheduler::BatchScheduler;
use super::subscription::{Subscription, SubscriptionManager};
use crate::domain::calendar;
use crate::domain::errors::JournalError;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Entry point for daily metrics: single dates, ranges and subscriptions.
///
/// Constructed once at startup (see `JournalEngine`) and shared by reference.
#[derive(Clone)]
pub struct MetricsService {
    scheduler: Arc<BatchScheduler>,
    cache: Arc<MetricsCache>,
    subscriptions: SubscriptionManager,
}

impl MetricsService {
    pub fn new(
        scheduler: Arc<BatchScheduler>,
        cache: Arc<MetricsCache>,
        subscriptions: SubscriptionManager,
    ) -> Self {
        Self {
            scheduler,
            cache,
            subscriptions,
        }
    }

    /// Metrics for one date. Errors propagate to the caller.
    pub async fn calculate_daily_metrics(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<MetricsOutcome, JournalError> {
        self.scheduler.compute_one(user_id, date, false).await
    }

    /// Metrics for many dates; one entry per distinct date, failures included.
    pub async fn calculate_bulk_metrics(
        &self,
        user_id: &str,
        dates: &[NaiveDate],
    ) -> BTreeMap<NaiveDate, MetricsOutcome> {
        self.scheduler.compute_range(user_id, dates).await
    }

    /// Metrics for every day of an inclusive range, validated before any fetch.
    pub async fn calculate_range_metrics(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, MetricsOutcome>, JournalError> {
        let dates = calendar::date_range(start, end)?;
        Ok(self.scheduler.compute_range(user_id, &dates).await)
    }

    pub async fn get_real_time_metrics<F>(
        &self,
        user_id: &str,
        date: NaiveDate,
        callback: F,
    ) -> Result<Subscription, JournalError>
    where
        F: Fn(MetricsOutcome) + Send + Sync + 'static,
    {
        self.subscriptions.subscribe(user_id, date, callback).await
    }

    pub fn invalidate(&self, user_id: &str, date: NaiveDate) -> bool {
        self.cache.invalidate(&MetricsKey::new(user_id, date))
    }

    pub fn invalidate_user(&self, user_id: &str) -> usize {
        self.cache.invalidate_user(user_id)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("MetricsService: Cache cleared");
    }

    pub fn subscriptions(&self) -> &SubscriptionManager {
        &self.subscriptions
    }

    /// Cancels all subscriptions. Call on shutdown or logout.
    pub fn shutdown(&self) -> usize {
        self.subscriptions.cleanup()
    }
}
