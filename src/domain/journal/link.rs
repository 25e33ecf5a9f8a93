use crate::domain::journal::entry::JournalEntry;
use crate::domain::trading::types::{Trade, TradeStatus};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// How a trade came to be associated with a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    /// Trade reference inserted into the journal body
    Direct,
    /// Inferred from the trade and the entry sharing a calendar day
    Auto,
    /// Explicitly attached by the user from the trade view
    Manual,
}

impl fmt::Display for LinkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkType::Direct => write!(f, "direct"),
            LinkType::Auto => write!(f, "auto"),
            LinkType::Manual => write!(f, "manual"),
        }
    }
}

impl FromStr for LinkType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(LinkType::Direct),
            "auto" => Ok(LinkType::Auto),
            "manual" => Ok(LinkType::Manual),
            _ => anyhow::bail!(
                "Invalid link type: {}. Must be 'direct', 'auto' or 'manual'",
                s
            ),
        }
    }
}

/// Snapshot of trade fields stored on the link for display purposes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkMetadata {
    pub symbol: String,
    pub pnl: Option<Decimal>,
    pub status: TradeStatus,
    pub lot_size: Decimal,
    pub entry_time: Option<NaiveTime>,
    pub exit_time: Option<NaiveTime>,
}

impl LinkMetadata {
    pub fn from_trade(trade: &Trade) -> Self {
        Self {
            symbol: trade.symbol.clone(),
            pnl: trade.pnl,
            status: trade.status,
            lot_size: trade.lot_size,
            entry_time: trade.entry_time,
            exit_time: trade.exit_time,
        }
    }
}

/// One trade <-> journal entry association.
///
/// The id is derived from `(trade_id, journal_date)`, so linking the same
/// trade to the same day twice overwrites instead of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeJournalLink {
    pub id: String,
    pub trade_id: String,
    pub journal_entry_id: String,
    pub journal_date: NaiveDate,
    pub user_id: String,
    pub link_type: LinkType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub metadata: Option<LinkMetadata>,
}

impl TradeJournalLink {
    pub fn link_id(trade_id: &str, journal_date: NaiveDate) -> String {
        format!("{}_{}", trade_id, journal_date.format("%Y-%m-%d"))
    }

    pub fn new(
        user_id: &str,
        trade: &Trade,
        entry: &JournalEntry,
        link_type: LinkType,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Self::link_id(&trade.id, entry.date),
            trade_id: trade.id.clone(),
            journal_entry_id: entry.id.clone(),
            journal_date: entry.date,
            user_id: user_id.to_string(),
            link_type,
            created_at: now,
            updated_at: now,
            metadata: Some(LinkMetadata::from_trade(trade)),
        }
    }

    /// Re-snapshot the trade fields. Everything else, `link_type` and
    /// `created_at` included, is kept; `updated_at` strictly advances.
    pub fn with_metadata(&self, trade: &Trade, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: self.next_update_time(now),
            metadata: Some(LinkMetadata::from_trade(trade)),
            ..self.clone()
        }
    }

    fn next_update_time(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        if now > self.updated_at {
            now
        } else {
            self.updated_at + Duration::milliseconds(1)
        }
    }

    /// Ordering used wherever "the most recent link" is needed:
    /// `updated_at` descending, then id ascending.
    pub fn recency_order(a: &TradeJournalLink, b: &TradeJournalLink) -> Ordering {
        b.updated_at
            .cmp(&a.updated_at)
            .then_with(|| a.id.cmp(&b.id))
    }

    pub fn most_recent(links: &[TradeJournalLink]) -> Option<&TradeJournalLink> {
        links.iter().min_by(|a, b| Self::recency_order(a, b))
    }
}

/// Journal summary for a single trade, used by trade-facing views
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeIntegrationData {
    pub trade_id: String,
    pub has_journal_notes: bool,
    pub link_count: usize,
    pub journal_dates: Vec<NaiveDate>,
    pub most_recent_link: Option<TradeJournalLink>,
    pub note_count: usize,
    pub screenshot_count: usize,
}

impl TradeIntegrationData {
    pub fn empty(trade_id: &str) -> Self {
        Self {
            trade_id: trade_id.to_string(),
            has_journal_notes: false,
            link_count: 0,
            journal_dates: Vec::new(),
            most_recent_link: None,
            note_count: 0,
            screenshot_count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateError {
    pub date: NaiveDate,
    pub message: String,
}

/// Outcome of auto-linking a whole date range
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchLinkReport {
    pub total_processed: usize,
    pub total_linked: usize,
    pub errors: Vec<DateError>,
}
