use crate::config::CacheEnvConfig;
use crate::domain::performance::metrics::DayMetrics;
use crate::infrastructure::observability::EngineMetrics;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tracing::{debug, error};

/// Cache key: one user's metrics for one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MetricsKey {
    pub user_id: String,
    pub date: NaiveDate,
}

impl MetricsKey {
    pub fn new(user_id: &str, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.to_string(),
            date,
        }
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    metrics: DayMetrics,
    last_updated: i64, // epoch millis
    ttl_ms: i64,
}

impl CacheEntry {
    fn is_expired(&self, now_ms: i64) -> bool {
        now_ms - self.last_updated > self.ttl_ms
    }
}

/// TTL and capacity bounded store of computed [`DayMetrics`].
///
/// A read past the TTL is a miss and drops the stale entry. Inserting a new
/// key at capacity sweeps every expired entry, then evicts by oldest
/// `last_updated` (smallest key on ties) until there is room.
pub struct MetricsCache {
    entries: RwLock<HashMap<MetricsKey, CacheEntry>>,
    enabled: bool,
    ttl_ms: i64,
    max_size: usize,
    metrics: EngineMetrics,
}

impl std::fmt::Debug for MetricsCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsCache")
            .field("enabled", &self.enabled)
            .field("ttl_ms", &self.ttl_ms)
            .field("max_size", &self.max_size)
            .field("entries", &"<RwLock>")
            .finish()
    }
}

impl MetricsCache {
    pub fn new(config: &CacheEnvConfig, metrics: EngineMetrics) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            enabled: config.enabled,
            ttl_ms: config.ttl_ms as i64,
            max_size: config.max_size.max(1),
            metrics,
        }
    }

    /// Enabled cache with the given TTL and capacity
    pub fn with_limits(ttl: Duration, max_size: usize) -> Self {
        let config = CacheEnvConfig {
            enabled: true,
            ttl_ms: ttl.as_millis() as u64,
            max_size,
        };
        Self::new(&config, EngineMetrics::default())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn get(&self, key: &MetricsKey) -> Option<DayMetrics> {
        self.get_at(key, now_millis())
    }

    pub fn set(&self, key: MetricsKey, metrics: DayMetrics) {
        self.set_at(key, metrics, now_millis());
    }

    /// Lookup against an explicit clock (epoch millis)
    pub fn get_at(&self, key: &MetricsKey, now_ms: i64) -> Option<DayMetrics> {
        if !self.enabled {
            return None;
        }

        {
            let guard = self.read();
            match guard.get(key) {
                None => {
                    self.metrics.inc_cache_request("miss");
                    return None;
                }
                Some(entry) if !entry.is_expired(now_ms) => {
                    self.metrics.inc_cache_request("hit");
                    return Some(entry.metrics.clone());
                }
                Some(_) => {}
            }
        }

        // Stale: drop it, unless a writer refreshed it in between
        let mut guard = self.write();
        if let Some(entry) = guard.get(key) {
            if !entry.is_expired(now_ms) {
                self.metrics.inc_cache_request("hit");
                return Some(entry.metrics.clone());
            }
            guard.remove(key);
            self.metrics.inc_evictions("expired", 1);
            self.metrics.cache_entries.set(guard.len() as f64);
            debug!(
                "MetricsCache: Evicted stale entry for {} on {}",
                key.user_id, key.date
            );
        }
        self.metrics.inc_cache_request("expired");
        None
    }

    /// Insert against an explicit clock (epoch millis)
    pub fn set_at(&self, key: MetricsKey, metrics: DayMetrics, now_ms: i64) {
        if !self.enabled {
            return;
        }

        let mut guard = self.write();
        if !guard.contains_key(&key) && guard.len() >= self.max_size {
            let swept = Self::sweep_expired(&mut guard, now_ms);
            if swept > 0 {
                self.metrics.inc_evictions("expired", swept);
            }

            let mut evicted = 0;
            while guard.len() >= self.max_size {
                let victim = guard
                    .iter()
                    .min_by(|(ka, a), (kb, b)| {
                        a.last_updated.cmp(&b.last_updated).then_with(|| ka.cmp(kb))
                    })
                    .map(|(k, _)| k.clone());
                match victim {
                    Some(victim) => {
                        guard.remove(&victim);
                        evicted += 1;
                    }
                    None => break,
                }
            }
            if evicted > 0 {
                self.metrics.inc_evictions("capacity", evicted);
                debug!(
                    "MetricsCache: Capacity {} reached, evicted {} oldest entries",
                    self.max_size, evicted
                );
            }
        }

        guard.insert(
            key,
            CacheEntry {
                metrics,
                last_updated: now_ms,
                ttl_ms: self.ttl_ms,
            },
        );
        self.metrics.cache_entries.set(guard.len() as f64);
    }

    pub fn invalidate(&self, key: &MetricsKey) -> bool {
        let mut guard = self.write();
        let removed = guard.remove(key).is_some();
        if removed {
            self.metrics.inc_evictions("invalidated", 1);
            self.metrics.cache_entries.set(guard.len() as f64);
        }
        removed
    }

    /// Drop every entry belonging to `user_id`
    pub fn invalidate_user(&self, user_id: &str) -> usize {
        let mut guard = self.write();
        let before = guard.len();
        guard.retain(|key, _| key.user_id != user_id);
        let removed = before - guard.len();
        if removed > 0 {
            self.metrics.inc_evictions("invalidated", removed);
            self.metrics.cache_entries.set(guard.len() as f64);
        }
        removed
    }

    pub fn clear(&self) {
        let mut guard = self.write();
        let removed = guard.len();
        guard.clear();
        if removed > 0 {
            self.metrics.inc_evictions("invalidated", removed);
        }
        self.metrics.cache_entries.set(0.0);
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep_expired(entries: &mut HashMap<MetricsKey, CacheEntry>, now_ms: i64) -> usize {
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now_ms));
        before - entries.len()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<MetricsKey, CacheEntry>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("MetricsCache: Lock poisoned during read, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<MetricsKey, CacheEntry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("MetricsCache: Lock poisoned during write, recovering");
                poisoned.into_inner()
            }
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
