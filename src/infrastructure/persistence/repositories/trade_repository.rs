use crate::domain::ports::TradeSource;
use crate::domain::trading::types::{Trade, TradeSide, TradeStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

pub struct SqliteTradeRepository {
    pool: SqlitePool,
}

impl SqliteTradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, trade: &Trade) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO trades
            (id, user_id, symbol, side, date, entry_time, exit_time, entry_price, exit_price,
             lot_size, pnl, status, notes, screenshots)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&trade.id)
        .bind(&trade.user_id)
        .bind(&trade.symbol)
        .bind(trade.side.to_string())
        .bind(trade.date.format(DATE_FORMAT).to_string())
        .bind(trade.entry_time.map(|t| t.format(TIME_FORMAT).to_string()))
        .bind(trade.exit_time.map(|t| t.format(TIME_FORMAT).to_string()))
        .bind(trade.entry_price.map(|p| p.to_string()))
        .bind(trade.exit_price.map(|p| p.to_string()))
        .bind(trade.lot_size.to_string())
        .bind(trade.pnl.map(|p| p.to_string()))
        .bind(trade.status.to_string())
        .bind(&trade.notes)
        .bind(serde_json::to_string(&trade.screenshots)?)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save trade {}", trade.id))?;

        Ok(())
    }

    pub async fn delete(&self, user_id: &str, trade_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM trades WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(trade_id)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete trade {}", trade_id))?;
        Ok(result.rows_affected() > 0)
    }

    fn map_row(row: &SqliteRow) -> Result<Trade> {
        let side: String = row.try_get("side")?;
        let status: String = row.try_get("status")?;
        let date: String = row.try_get("date")?;
        let screenshots: String = row.try_get("screenshots")?;

        Ok(Trade {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            symbol: row.try_get("symbol")?,
            side: TradeSide::from_str(&side)?,
            date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
                .with_context(|| format!("Invalid trade date {}", date))?,
            entry_time: parse_time(row.try_get("entry_time")?)?,
            exit_time: parse_time(row.try_get("exit_time")?)?,
            entry_price: parse_decimal(row.try_get("entry_price")?)?,
            exit_price: parse_decimal(row.try_get("exit_price")?)?,
            lot_size: Decimal::from_str(&row.try_get::<String, _>("lot_size")?)
                .context("Invalid lot size")?,
            pnl: parse_decimal(row.try_get("pnl")?)?,
            status: TradeStatus::from_str(&status)?,
            notes: row.try_get("notes")?,
            screenshots: serde_json::from_str(&screenshots).context("Invalid screenshots")?,
        })
    }
}

#[async_trait]
impl TradeSource for SqliteTradeRepository {
    async fn get_trades_for_date(&self, user_id: &str, date: NaiveDate) -> Result<Vec<Trade>> {
        let rows = sqlx::query("SELECT * FROM trades WHERE user_id = ? AND date = ? ORDER BY id")
            .bind(user_id)
            .bind(date.format(DATE_FORMAT).to_string())
            .fetch_all(&self.pool)
            .await
            .context("Failed to query trades")?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn get_trade(&self, user_id: &str, trade_id: &str) -> Result<Option<Trade>> {
        let row = sqlx::query("SELECT * FROM trades WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(trade_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query trade")?;

        row.as_ref().map(Self::map_row).transpose()
    }
}

fn parse_time(value: Option<String>) -> Result<Option<NaiveTime>> {
    value
        .map(|v| {
            NaiveTime::parse_from_str(&v, TIME_FORMAT).with_context(|| format!("Invalid time {}", v))
        })
        .transpose()
}

fn parse_decimal(value: Option<String>) -> Result<Option<Decimal>> {
    value
        .map(|v| Decimal::from_str(&v).with_context(|| format!("Invalid decimal {}", v)))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_save_and_query_trade() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let repo = SqliteTradeRepository::new(db.pool.clone());
        let date = NaiveDate::from_ymd_opt(2024, 9, 2).unwrap();

        let mut trade = Trade::open("t1", "u1", "GBPUSD", date, dec!(0.5));
        trade.entry_time = NaiveTime::from_hms_opt(9, 15, 0);
        trade.entry_price = Some(dec!(1.2500));
        trade.close(dec!(1.2600), NaiveTime::from_hms_opt(11, 0, 0).unwrap());
        trade.notes = Some("clean breakout".to_string());
        repo.save(&trade).await.unwrap();

        let loaded = repo.get_trade("u1", "t1").await.unwrap().unwrap();
        assert_eq!(loaded.pnl, Some(dec!(0.005)));
        assert_eq!(loaded.status, TradeStatus::Closed);
        assert_eq!(loaded.entry_time, trade.entry_time);
        assert!(loaded.has_notes());

        assert_eq!(repo.get_trades_for_date("u1", date).await.unwrap().len(), 1);
        assert!(repo.get_trades_for_date("u2", date).await.unwrap().is_empty());
        assert!(repo.delete("u1", "t1").await.unwrap());
        assert!(repo.get_trade("u1", "t1").await.unwrap().is_none());
    }
}
