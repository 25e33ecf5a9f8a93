//! Metrics cache configuration parsing from environment variables.

use super::env_reader::EnvReader;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CACHE_TTL_MS: u64 = 300_000;
pub const DEFAULT_MAX_CACHE_SIZE: usize = 100;

/// Cache environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheEnvConfig {
    pub enabled: bool,
    pub ttl_ms: u64,
    pub max_size: usize,
}

impl Default for CacheEnvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: DEFAULT_CACHE_TTL_MS,
            max_size: DEFAULT_MAX_CACHE_SIZE,
        }
    }
}

impl CacheEnvConfig {
    pub fn from_reader(reader: &EnvReader<'_>) -> Result<Self> {
        Ok(Self {
            enabled: reader.parse_bool("JOURNAL_CACHE_ENABLED", true),
            ttl_ms: reader.parse("JOURNAL_CACHE_TTL_MS", DEFAULT_CACHE_TTL_MS)?,
            max_size: reader.parse("JOURNAL_MAX_CACHE_SIZE", DEFAULT_MAX_CACHE_SIZE)?,
        })
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}
