//! Batch scheduling and polling configuration parsing from environment variables.
//!
//! Covers chunked range computation and the real-time polling loop.

use super::env_reader::EnvReader;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 10;
pub const DEFAULT_PACING_MS: u64 = 10;
pub const DEFAULT_POLLING_INTERVAL_MS: u64 = 30_000;

/// Scheduler environment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerEnvConfig {
    pub chunk_size: usize,
    pub pacing_ms: u64,
    /// Per-date computation timeout. `None` disables it.
    pub compute_timeout_ms: Option<u64>,
    pub enable_real_time_updates: bool,
    pub polling_interval_ms: u64,
}

impl Default for SchedulerEnvConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            pacing_ms: DEFAULT_PACING_MS,
            compute_timeout_ms: None,
            enable_real_time_updates: true,
            polling_interval_ms: DEFAULT_POLLING_INTERVAL_MS,
        }
    }
}

impl SchedulerEnvConfig {
    pub fn from_reader(reader: &EnvReader<'_>) -> Result<Self> {
        Ok(Self {
            chunk_size: reader.parse("JOURNAL_CHUNK_SIZE", DEFAULT_CHUNK_SIZE)?,
            pacing_ms: reader.parse("JOURNAL_PACING_MS", DEFAULT_PACING_MS)?,
            compute_timeout_ms: reader.parse_optional("JOURNAL_COMPUTE_TIMEOUT_MS")?,
            enable_real_time_updates: reader.parse_bool("JOURNAL_REALTIME_ENABLED", true),
            polling_interval_ms: reader
                .parse("JOURNAL_POLLING_INTERVAL_MS", DEFAULT_POLLING_INTERVAL_MS)?,
        })
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn compute_timeout(&self) -> Option<Duration> {
        self.compute_timeout_ms.map(Duration::from_millis)
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_millis(self.polling_interval_ms)
    }
}
