use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced by the metrics engine and the link registry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum JournalError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Failed to fetch {context}: {reason}")]
    TransientFetch { context: String, reason: String },

    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Computation for {date} timed out after {duration_ms}ms")]
    Timeout { date: NaiveDate, duration_ms: u64 },
}

impl JournalError {
    pub fn trade_not_found(trade_id: &str) -> Self {
        Self::NotFound {
            entity: "Trade",
            id: trade_id.to_string(),
        }
    }

    pub fn journal_not_found(date: NaiveDate) -> Self {
        Self::NotFound {
            entity: "Journal entry",
            id: date.to_string(),
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Wraps a port failure. The full error chain is kept in `reason`.
    pub fn fetch(context: impl Into<String>, err: anyhow::Error) -> Self {
        Self::TransientFetch {
            context: context.into(),
            reason: format!("{:#}", err),
        }
    }

    /// Batch operations record these per unit instead of aborting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientFetch { .. } | Self::Timeout { .. })
    }
}
