//! Polling-based "real-time" metrics subscriptions.
//!
//! Each subscription owns one spawned task that recomputes its day on a fixed
//! interval. Tasks are tracked in a shared registry so they can be cancelled
//! individually or all at once on shutdown.

use super::outcome::MetricsOutcome;
use super::scheduler::BatchScheduler;
use crate::domain::errors::JournalError;
use crate::infrastructure::observability::EngineMetrics;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub type MetricsCallback = Arc<dyn Fn(MetricsOutcome) + Send + Sync>;

/// `interval_at` panics on a zero period
const MIN_POLLING_INTERVAL: Duration = Duration::from_millis(1);

struct Registry {
    tasks: Mutex<HashMap<u64, JoinHandle<()>>>,
    next_id: AtomicU64,
    metrics: EngineMetrics,
}

impl Registry {
    fn tasks(&self) -> MutexGuard<'_, HashMap<u64, JoinHandle<()>>> {
        match self.tasks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("SubscriptionManager: Registry lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn cancel(&self, id: u64) -> bool {
        let mut tasks = self.tasks();
        match tasks.remove(&id) {
            Some(handle) => {
                handle.abort();
                self.metrics.active_subscriptions.set(tasks.len() as f64);
                true
            }
            None => false,
        }
    }
}

/// Handle returned by [`SubscriptionManager::subscribe`].
///
/// Dropping the handle does not stop polling; call [`Subscription::unsubscribe`]
/// or [`SubscriptionManager::cleanup`].
pub struct Subscription {
    id: u64,
    registry: Arc<Registry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stops polling. Returns `true` only on the call that actually cancelled.
    pub fn unsubscribe(&self) -> bool {
        let cancelled = self.registry.cancel(self.id);
        if cancelled {
            debug!("SubscriptionManager: Subscription {} cancelled", self.id);
        }
        cancelled
    }

    pub fn is_active(&self) -> bool {
        self.registry.tasks().contains_key(&self.id)
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

#[derive(Clone)]
pub struct SubscriptionManager {
    scheduler: Arc<BatchScheduler>,
    registry: Arc<Registry>,
    real_time: bool,
    polling_interval: Duration,
}

impl SubscriptionManager {
    pub fn new(scheduler: Arc<BatchScheduler>, metrics: EngineMetrics) -> Self {
        let config = scheduler.config();
        let real_time = config.enable_real_time_updates;
        let mut polling_interval = config.polling_interval();
        if polling_interval < MIN_POLLING_INTERVAL {
            warn!(
                "SubscriptionManager: Polling interval {:?} too small, using {:?}",
                polling_interval, MIN_POLLING_INTERVAL
            );
            polling_interval = MIN_POLLING_INTERVAL;
        }
        Self {
            scheduler,
            registry: Arc::new(Registry {
                tasks: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                metrics,
            }),
            real_time,
            polling_interval,
        }
    }

    /// Delivers the current metrics for (user, date) before returning, then
    /// re-delivers a forced recomputation every polling interval.
    ///
    /// Transient failures (fetch errors, timeouts) are delivered to the
    /// callback as a zeroed outcome with `error` set; anything else, such as
    /// an invalid user id, is returned before a subscription is created.
    pub async fn subscribe<F>(
        &self,
        user_id: &str,
        date: NaiveDate,
        callback: F,
    ) -> Result<Subscription, JournalError>
    where
        F: Fn(MetricsOutcome) + Send + Sync + 'static,
    {
        let callback: MetricsCallback = Arc::new(callback);
        let started = Instant::now();

        let first = match self.scheduler.compute_one(user_id, date, false).await {
            Ok(outcome) => outcome,
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                warn!(
                    "SubscriptionManager: Initial metrics for {} on {} failed: {}",
                    user_id, date, e
                );
                MetricsOutcome::fallback(date, &e, started.elapsed())
            }
        };
        callback(first);

        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let subscription = Subscription {
            id,
            registry: self.registry.clone(),
        };

        if !self.real_time {
            debug!(
                "SubscriptionManager: Real-time updates disabled, {} on {} delivered once",
                user_id, date
            );
            return Ok(subscription);
        }

        // Lock held across spawn and insert: cleanup() must see every task
        let mut tasks = self.registry.tasks();
        let handle = tokio::spawn(Self::poll(
            self.scheduler.clone(),
            user_id.to_string(),
            date,
            self.polling_interval,
            callback,
        ));
        tasks.insert(id, handle);
        self.registry
            .metrics
            .active_subscriptions
            .set(tasks.len() as f64);
        info!(
            "SubscriptionManager: Subscription {} polling {} on {} every {:?}",
            id, user_id, date, self.polling_interval
        );
        drop(tasks);

        Ok(subscription)
    }

    async fn poll(
        scheduler: Arc<BatchScheduler>,
        user_id: String,
        date: NaiveDate,
        period: Duration,
        callback: MetricsCallback,
    ) {
        let mut ticker = time::interval_at(time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let started = Instant::now();
            let outcome = match scheduler.compute_one(&user_id, date, true).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        "SubscriptionManager: Refresh for {} on {} failed: {}",
                        user_id, date, e
                    );
                    MetricsOutcome::fallback(date, &e, started.elapsed())
                }
            };
            callback(outcome.as_realtime());
        }
    }

    /// Cancels every active subscription
    pub fn cleanup(&self) -> usize {
        let mut tasks = self.registry.tasks();
        let count = tasks.len();
        for (_, handle) in tasks.drain() {
            handle.abort();
        }
        self.registry.metrics.active_subscriptions.set(0.0);
        if count > 0 {
            info!("SubscriptionManager: Cancelled {} subscriptions", count);
        }
        count
    }

    pub fn active_count(&self) -> usize {
        self.registry.tasks().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::metrics::cache::MetricsCache;
    use crate::application::metrics::outcome::MetricsSource;
    use crate::config::SchedulerEnvConfig;
    use crate::infrastructure::repositories::in_memory::{
        InMemoryJournalStore, InMemoryLinkRepository, InMemoryTradeSource,
    };

    fn manager(config: SchedulerEnvConfig) -> SubscriptionManager {
        let scheduler = BatchScheduler::new(
            Arc::new(InMemoryTradeSource::new()),
            Arc::new(InMemoryJournalStore::new()),
            Arc::new(InMemoryLinkRepository::new()),
            Arc::new(MetricsCache::with_limits(Duration::from_secs(300), 100)),
            config,
            EngineMetrics::default(),
        );
        SubscriptionManager::new(Arc::new(scheduler), EngineMetrics::default())
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[tokio::test]
    async fn test_first_delivery_before_return() {
        let mgr = manager(SchedulerEnvConfig::default());
        let delivered = Arc::new(Mutex::new(Vec::new()));
        let sink = delivered.clone();

        let sub = mgr
            .subscribe("u1", day(), move |o| sink.lock().unwrap().push(o.source))
            .await
            .unwrap();

        assert_eq!(*delivered.lock().unwrap(), vec![MetricsSource::Calculated]);
        assert_eq!(mgr.active_count(), 1);
        assert!(sub.unsubscribe());
    }

    #[tokio::test]
    async fn test_unsubscribe_twice_is_noop() {
        let mgr = manager(SchedulerEnvConfig::default());
        let sub = mgr.subscribe("u1", day(), |_| {}).await.unwrap();
        let other = mgr.subscribe("u1", day(), |_| {}).await.unwrap();
        assert_eq!(mgr.active_count(), 2);

        assert!(sub.unsubscribe());
        assert!(!sub.unsubscribe());
        assert_eq!(mgr.active_count(), 1);
        assert!(other.is_active());
        other.unsubscribe();
    }

    #[tokio::test]
    async fn test_disabled_real_time_delivers_once() {
        let config = SchedulerEnvConfig {
            enable_real_time_updates: false,
            ..SchedulerEnvConfig::default()
        };
        let mgr = manager(config);
        let sub = mgr.subscribe("u1", day(), |_| {}).await.unwrap();
        assert_eq!(mgr.active_count(), 0);
        assert!(!sub.is_active());
        assert!(!sub.unsubscribe());
    }

    #[tokio::test]
    async fn test_invalid_user_rejected() {
        let mgr = manager(SchedulerEnvConfig::default());
        let result = mgr.subscribe("", day(), |_| {}).await;
        assert!(matches!(result, Err(JournalError::Validation { .. })));
        assert_eq!(mgr.active_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_polling_interval_is_clamped() {
        let config = SchedulerEnvConfig {
            polling_interval_ms: 0,
            ..SchedulerEnvConfig::default()
        };
        let mgr = manager(config);
        assert_eq!(mgr.polling_interval, MIN_POLLING_INTERVAL);

        let delivered = Arc::new(Mutex::new(0usize));
        let sink = delivered.clone();
        let sub = mgr
            .subscribe("u1", day(), move |_| *sink.lock().unwrap() += 1)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The polling task survived its first tick
        assert!(sub.is_active());
        assert!(*delivered.lock().unwrap() >= 2);
        assert!(sub.unsubscribe());
    }

    #[tokio::test]
    async fn test_concurrent_subscribe_and_cleanup_leaves_nothing_running() {
        let mgr = manager(SchedulerEnvConfig::default());
        let mut pending = Vec::new();
        for i in 0..16 {
            let mgr = mgr.clone();
            pending.push(tokio::spawn(async move {
                mgr.subscribe(&format!("u{}", i), day(), |_| {}).await
            }));
        }
        let cleaner = mgr.clone();
        let cleanup = tokio::spawn(async move { cleaner.cleanup() });

        let mut handles = Vec::new();
        for task in pending {
            handles.push(task.await.unwrap().unwrap());
        }
        let cancelled = cleanup.await.unwrap();

        // Every task is either cancelled by cleanup or still tracked
        let tracked = handles.iter().filter(|h| h.is_active()).count();
        assert_eq!(cancelled + tracked, 16);
        assert_eq!(mgr.cleanup(), tracked);
        assert_eq!(mgr.active_count(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_cancels_all() {
        let mgr = manager(SchedulerEnvConfig::default());
        let a = mgr.subscribe("u1", day(), |_| {}).await.unwrap();
        let _b = mgr.subscribe("u2", day(), |_| {}).await.unwrap();
        assert_eq!(mgr.cleanup(), 2);
        assert_eq!(mgr.active_count(), 0);
        assert!(!a.unsubscribe());
    }
}
