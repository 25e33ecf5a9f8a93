use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::application::linking::LinkRegistry;
use crate::application::metrics::{
    BatchScheduler, MetricsCache, MetricsService, SubscriptionManager,
};
use crate::config::EngineConfig;
use crate::domain::ports::{JournalStore, TradeSource};
use crate::domain::repositories::LinkRepository;
use crate::infrastructure::observability::EngineMetrics;
use crate::infrastructure::persistence::{
    Database, SqliteJournalRepository, SqliteLinkRepository, SqliteTradeRepository,
};

/// The metrics engine and link registry wired to one set of ports.
///
/// Build exactly one per process and pass it (or its parts) by reference.
pub struct JournalEngine {
    pub config: EngineConfig,
    pub metrics: EngineMetrics,
    pub cache: Arc<MetricsCache>,
    pub metrics_service: MetricsService,
    pub link_registry: Arc<LinkRegistry>,
    /// Set when built over SQLite
    pub database: Option<Database>,
}

impl JournalEngine {
    /// Connects to `config.database_url` and wires the SQLite adapters
    pub async fn build(config: EngineConfig) -> Result<Self> {
        info!("JournalEngine: Building over {}", config.database_url);
        config.validate()?;

        let database = Database::new(&config.database_url).await?;
        let trades = Arc::new(SqliteTradeRepository::new(database.pool.clone()));
        let journal = Arc::new(SqliteJournalRepository::new(database.pool.clone()));
        let links = Arc::new(SqliteLinkRepository::new(database.pool.clone()));

        let mut engine = Self::with_ports(config, trades, journal, links)?;
        engine.database = Some(database);
        Ok(engine)
    }

    pub fn with_ports(
        config: EngineConfig,
        trades: Arc<dyn TradeSource>,
        journal: Arc<dyn JournalStore>,
        links: Arc<dyn LinkRepository>,
    ) -> Result<Self> {
        config.validate()?;
        let metrics = EngineMetrics::new()?;

        let cache = Arc::new(MetricsCache::new(&config.cache, metrics.clone()));
        let scheduler = Arc::new(BatchScheduler::new(
            trades.clone(),
            journal.clone(),
            links.clone(),
            cache.clone(),
            config.scheduler.clone(),
            metrics.clone(),
        ));
        let subscriptions = SubscriptionManager::new(scheduler.clone(), metrics.clone());
        let metrics_service = MetricsService::new(scheduler, cache.clone(), subscriptions);
        let link_registry = Arc::new(
            LinkRegistry::new(trades, journal, links, metrics.clone()).with_cache(cache.clone()),
        );

        info!(
            "JournalEngine: Ready (cache: {}, ttl: {}ms, chunk: {}, real-time: {})",
            config.cache.enabled,
            config.cache.ttl_ms,
            config.scheduler.chunk_size,
            config.scheduler.enable_real_time_updates
        );

        Ok(Self {
            config,
            metrics,
            cache,
            metrics_service,
            link_registry,
            database: None,
        })
    }

    /// Cancels every subscription
    pub fn shutdown(&self) {
        let cancelled = self.metrics_service.shutdown();
        info!("JournalEngine: Shut down ({} subscriptions cancelled)", cancelled);
    }
}
