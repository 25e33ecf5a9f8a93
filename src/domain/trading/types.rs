use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Long,
    Short,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Long => write!(f, "long"),
            TradeSide::Short => write!(f, "short"),
        }
    }
}

impl FromStr for TradeSide {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "long" | "buy" => Ok(TradeSide::Long),
            "short" | "sell" => Ok(TradeSide::Short),
            _ => anyhow::bail!("Invalid trade side: {}. Must be 'long' or 'short'", s),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Open,
    Closed,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeStatus::Open => write!(f, "open"),
            TradeStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for TradeStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(TradeStatus::Open),
            "closed" => Ok(TradeStatus::Closed),
            _ => anyhow::bail!("Invalid trade status: {}. Must be 'open' or 'closed'", s),
        }
    }
}

/// A trade as recorded in the user's journal.
///
/// `date` is the exchange-local calendar day the trade belongs to; it is the
/// key used both for daily metrics and for auto-linking with journal entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub user_id: String,
    pub symbol: String,
    pub side: TradeSide,
    pub date: NaiveDate,
    pub entry_time: Option<NaiveTime>,
    pub exit_time: Option<NaiveTime>,
    pub entry_price: Option<Decimal>,
    pub exit_price: Option<Decimal>,
    pub lot_size: Decimal,
    pub pnl: Option<Decimal>, // Realized profit/loss, None while open or unknown
    pub status: TradeStatus,
    pub notes: Option<String>,
    #[serde(default)]
    pub screenshots: Vec<String>,
}

impl Trade {
    /// Create an open trade with no fills recorded yet
    pub fn open(id: &str, user_id: &str, symbol: &str, date: NaiveDate, lot_size: Decimal) -> Self {
        Self {
            id: id.to_string(),
            user_id: user_id.to_string(),
            symbol: symbol.to_string(),
            side: TradeSide::Long,
            date,
            entry_time: None,
            exit_time: None,
            entry_price: None,
            exit_price: None,
            lot_size,
            pnl: None,
            status: TradeStatus::Open,
            notes: None,
            screenshots: Vec::new(),
        }
    }

    /// Close the trade and calculate P&L from the recorded entry price.
    /// When no entry price is known the P&L is left untouched.
    pub fn close(&mut self, exit_price: Decimal, exit_time: NaiveTime) {
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);
        self.status = TradeStatus::Closed;

        if let Some(entry_price) = self.entry_price {
            self.pnl = Some(match self.side {
                TradeSide::Long => (exit_price - entry_price) * self.lot_size,
                TradeSide::Short => (entry_price - exit_price) * self.lot_size,
            });
        }
    }

    /// For a closed trade imported without a P&L, derive it from the
    /// recorded exit fill. Anything else is returned unchanged.
    pub fn with_derived_pnl(mut self) -> Self {
        if self.is_closed() && self.pnl.is_none() {
            if let (Some(price), Some(time)) = (self.exit_price, self.exit_time) {
                self.close(price, time);
            }
        }
        self
    }

    pub fn is_closed(&self) -> bool {
        self.status == TradeStatus::Closed
    }

    /// Realized P&L, treating a missing value as zero
    pub fn realized_pnl(&self) -> Decimal {
        self.pnl.unwrap_or(Decimal::ZERO)
    }

    pub fn has_notes(&self) -> bool {
        self.notes.as_deref().is_some_and(|n| !n.trim().is_empty())
    }
}
