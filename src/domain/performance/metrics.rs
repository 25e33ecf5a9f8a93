use super::stats::Stats;
use crate::domain::trading::types::Trade;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Day-level mood derived from win rate and profit factor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionalState {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl EmotionalState {
    /// `profit_factor` of `None` means no losing trades (infinite factor).
    pub fn classify(win_rate: f64, profit_factor: Option<f64>) -> Self {
        let pf = profit_factor.unwrap_or(f64::INFINITY);
        if win_rate >= 60.0 && pf >= 1.5 {
            EmotionalState::Positive
        } else if win_rate <= 40.0 || pf <= 0.7 {
            EmotionalState::Negative
        } else {
            EmotionalState::Neutral
        }
    }
}

impl fmt::Display for EmotionalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmotionalState::Positive => write!(f, "positive"),
            EmotionalState::Neutral => write!(f, "neutral"),
            EmotionalState::Negative => write!(f, "negative"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn classify(max_drawdown: Decimal, average_loss: Decimal) -> Self {
        let avg_loss = average_loss.abs();
        if max_drawdown > Decimal::from(1000) || avg_loss > Decimal::from(500) {
            RiskLevel::High
        } else if max_drawdown > Decimal::from(500) || avg_loss > Decimal::from(200) {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// Journal-side facts attached to a day's metrics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalFlags {
    pub has_journal_entry: bool,
    pub has_trade_notes: bool,
    pub completion_percentage: u8,
    pub has_screenshots: bool,
}

/// Trading statistics for one user and one calendar day.
///
/// Produced wholesale by [`DayMetrics::compute`] and never patched in place:
/// a change in the underlying trades or journal state yields a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayMetrics {
    pub date: NaiveDate,

    // P&L over closed trades
    pub pnl: Decimal,
    pub gross_profit: Decimal,
    pub gross_loss: Decimal,

    // Trade counts (trade_count includes open trades)
    pub trade_count: usize,
    pub closed_trade_count: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,

    pub total_volume: Decimal,
    pub average_win: Decimal,
    pub average_loss: Decimal,
    pub max_drawdown: Decimal,
    pub profit_factor: Option<f64>,
    pub sharpe_ratio: Option<f64>,

    // Journal flags
    pub has_journal_entry: bool,
    pub has_trade_notes: bool,
    pub completion_percentage: u8,
    pub has_screenshots: bool,

    // Classifications
    pub emotional_state: EmotionalState,
    pub risk_level: RiskLevel,
}

impl DayMetrics {
    /// All-default metrics, used as the fallback for a failed computation.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            pnl: Decimal::ZERO,
            gross_profit: Decimal::ZERO,
            gross_loss: Decimal::ZERO,
            trade_count: 0,
            closed_trade_count: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate: 0.0,
            total_volume: Decimal::ZERO,
            average_win: Decimal::ZERO,
            average_loss: Decimal::ZERO,
            max_drawdown: Decimal::ZERO,
            profit_factor: None,
            sharpe_ratio: None,
            has_journal_entry: false,
            has_trade_notes: false,
            completion_percentage: 0,
            has_screenshots: false,
            emotional_state: EmotionalState::Neutral,
            risk_level: RiskLevel::Low,
        }
    }

    /// Calculate the day's statistics from every trade recorded on `date`.
    ///
    /// Open trades count towards `trade_count` and `total_volume` only; all
    /// P&L-derived figures use closed trades. Pure: safe to run concurrently.
    pub fn compute(date: NaiveDate, trades: &[Trade]) -> Self {
        let mut closed: Vec<&Trade> = trades.iter().filter(|t| t.is_closed()).collect();
        // Stable: trades without an entry time go first, ties keep input order
        closed.sort_by_key(|t| t.entry_time);

        let closed_pnls: Vec<Decimal> = closed.iter().map(|t| t.realized_pnl()).collect();

        let pnl: Decimal = closed_pnls.iter().sum();
        let winners: Vec<Decimal> = closed_pnls
            .iter()
            .copied()
            .filter(|p| *p > Decimal::ZERO)
            .collect();
        let losers: Vec<Decimal> = closed_pnls
            .iter()
            .copied()
            .filter(|p| *p < Decimal::ZERO)
            .collect();

        let gross_profit: Decimal = winners.iter().sum();
        let gross_loss: Decimal = losers.iter().sum::<Decimal>().abs();

        let closed_count = closed.len();
        let win_rate = if closed_count > 0 {
            (winners.len() as f64 / closed_count as f64) * 100.0
        } else {
            0.0
        };

        let average_win = if winners.is_empty() {
            Decimal::ZERO
        } else {
            gross_profit / Decimal::from(winners.len())
        };
        let average_loss = if losers.is_empty() {
            Decimal::ZERO
        } else {
            gross_loss / Decimal::from(losers.len())
        };

        let max_drawdown = Stats::max_drawdown(&closed_pnls);
        let sharpe_ratio = Stats::sharpe_ratio(&closed_pnls);
        let profit_factor = Stats::profit_factor(gross_profit, gross_loss);

        let total_volume: Decimal = trades.iter().map(|t| t.lot_size).sum();

        Self {
            date,
            pnl,
            gross_profit,
            gross_loss,
            trade_count: trades.len(),
            closed_trade_count: closed_count,
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            win_rate,
            total_volume,
            average_win,
            average_loss,
            max_drawdown,
            profit_factor,
            sharpe_ratio,
            emotional_state: EmotionalState::classify(win_rate, profit_factor),
            risk_level: RiskLevel::classify(max_drawdown, average_loss),
            ..Self::empty(date)
        }
    }

    /// Return a copy carrying the given journal flags
    pub fn with_journal_flags(self, flags: JournalFlags) -> Self {
        Self {
            has_journal_entry: flags.has_journal_entry,
            has_trade_notes: flags.has_trade_notes,
            completion_percentage: flags.completion_percentage,
            has_screenshots: flags.has_screenshots,
            ..self
        }
    }
}
