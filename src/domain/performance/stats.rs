use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use statrs::statistics::Statistics;

/// Shared statistics utilities for per-day trade calculations.
pub struct Stats;

impl Stats {
    /// Per-trade Sharpe ratio with a zero risk-free rate.
    ///
    /// Mean over population standard deviation of the per-trade P&L. Not
    /// annualized. `None` with fewer than two samples or zero dispersion.
    pub fn sharpe_ratio(pnls: &[Decimal]) -> Option<f64> {
        if pnls.len() < 2 {
            return None;
        }

        let values: Vec<f64> = pnls.iter().map(|p| p.to_f64().unwrap_or(0.0)).collect();
        let mean = values.iter().mean();
        let std_dev = values.iter().population_std_dev();

        if std_dev.is_finite() && std_dev > 1e-12 {
            Some(mean / std_dev)
        } else {
            None
        }
    }

    /// Largest peak-to-trough decline of the running cumulative P&L.
    ///
    /// The running total starts flat at zero, so the result is never negative
    /// and stays zero for a non-decreasing series.
    pub fn max_drawdown(pnls: &[Decimal]) -> Decimal {
        let mut running = Decimal::ZERO;
        let mut peak = Decimal::ZERO;
        let mut max_dd = Decimal::ZERO;

        for pnl in pnls {
            running += pnl;
            if running > peak {
                peak = running;
            }
            let drawdown = peak - running;
            if drawdown > max_dd {
                max_dd = drawdown;
            }
        }

        max_dd
    }

    /// Gross profit / gross loss. `None` stands for an infinite factor.
    pub fn profit_factor(gross_profit: Decimal, gross_loss: Decimal) -> Option<f64> {
        if gross_loss > Decimal::ZERO {
            Some(
                gross_profit.to_f64().unwrap_or(0.0) / gross_loss.to_f64().unwrap_or(1.0),
            )
        } else {
            None
        }
    }
}
