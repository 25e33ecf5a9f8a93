use crate::domain::errors::JournalError;
use crate::domain::performance::metrics::DayMetrics;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Where a delivered [`DayMetrics`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricsSource {
    Cache,
    Calculated,
    Realtime,
}

impl fmt::Display for MetricsSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricsSource::Cache => write!(f, "cache"),
            MetricsSource::Calculated => write!(f, "calculated"),
            MetricsSource::Realtime => write!(f, "realtime"),
        }
    }
}

/// One date's result from the engine.
///
/// A failed date still carries metrics (all zero) so views can render a
/// fallback cell; `error` says what went wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsOutcome {
    pub metrics: DayMetrics,
    pub source: MetricsSource,
    #[serde(with = "duration_ms")]
    pub calculation_time: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricsOutcome {
    /// Zeroed metrics for a date whose computation failed
    pub fn fallback(date: NaiveDate, error: &JournalError, elapsed: Duration) -> Self {
        Self {
            metrics: DayMetrics::empty(date),
            source: MetricsSource::Calculated,
            calculation_time: elapsed,
            error: Some(error.to_string()),
        }
    }

    pub fn is_from_cache(&self) -> bool {
        self.source == MetricsSource::Cache
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn as_realtime(self) -> Self {
        Self {
            source: MetricsSource::Realtime,
            ..self
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
