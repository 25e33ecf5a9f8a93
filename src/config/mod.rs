//! Configuration module for the journal metrics engine.
//!
//! Configuration is loaded from environment variables (optionally seeded by a
//! `.env` file) or from a TOML file, and organized by concern: Cache and
//! Scheduler.

mod cache_config;
mod env_reader;
mod scheduler_config;

pub use cache_config::CacheEnvConfig;
pub use env_reader::EnvReader;
pub use scheduler_config::SchedulerEnvConfig;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/journal.db";

/// Main engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub cache: CacheEnvConfig,
    pub scheduler: SchedulerEnvConfig,
    pub database_url: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache: CacheEnvConfig::default(),
            scheduler: SchedulerEnvConfig::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_reader(&EnvReader::from_process())
    }

    pub fn from_reader(reader: &EnvReader<'_>) -> Result<Self> {
        let config = Self {
            cache: CacheEnvConfig::from_reader(reader)?,
            scheduler: SchedulerEnvConfig::from_reader(reader)?,
            database_url: reader.string("DATABASE_URL", DEFAULT_DATABASE_URL),
        };
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file. Missing keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).context("Failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.max_size == 0 {
            anyhow::bail!("max cache size must be at least 1");
        }
        if self.scheduler.chunk_size == 0 {
            anyhow::bail!("chunk size must be at least 1");
        }
        if self.scheduler.polling_interval_ms == 0 {
            anyhow::bail!("polling interval must be greater than 0ms");
        }
        if self.scheduler.compute_timeout_ms == Some(0) {
            anyhow::bail!("compute timeout must be greater than 0ms when set");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_engine_config_defaults_from_empty_env() {
        let vars = HashMap::new();
        let config = EngineConfig::from_reader(&EnvReader::from_map(&vars)).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_rejects_zero_chunk() {
        let vars: HashMap<String, String> =
            [("JOURNAL_CHUNK_SIZE".to_string(), "0".to_string())].into();
        let err = EngineConfig::from_reader(&EnvReader::from_map(&vars)).unwrap_err();
        assert!(err.to_string().contains("chunk size"));
    }

    #[test]
    fn test_engine_config_from_toml() {
        let raw = r#"
            database_url = "sqlite::memory:"

            [cache]
            ttl_ms = 60000

            [scheduler]
            chunk_size = 4
            pacing_ms = 0
            compute_timeout_ms = 5000
        "#;

        let config = EngineConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.cache.ttl_ms, 60_000);
        assert_eq!(config.cache.max_size, 100);
        assert!(config.cache.enabled);
        assert_eq!(config.scheduler.chunk_size, 4);
        assert_eq!(config.scheduler.pacing_ms, 0);
        assert_eq!(config.scheduler.compute_timeout_ms, Some(5000));
        assert_eq!(config.scheduler.polling_interval_ms, 30_000);
    }

    #[test]
    fn test_engine_config_toml_validation() {
        let raw = "[cache]\nmax_size = 0\n";
        assert!(EngineConfig::from_toml_str(raw).is_err());
    }
}
