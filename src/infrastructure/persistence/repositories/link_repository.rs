use crate::domain::journal::link::{LinkType, TradeJournalLink};
use crate::domain::repositories::LinkRepository;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

pub struct SqliteLinkRepository {
    pool: SqlitePool,
}

impl SqliteLinkRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn find_where(
        &self,
        column: &str,
        user_id: &str,
        value: String,
    ) -> Result<Vec<TradeJournalLink>> {
        let sql = format!(
            "SELECT * FROM trade_journal_links WHERE user_id = ? AND {} = ? ORDER BY id",
            column
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to query links by {}", column))?;

        rows.iter().map(map_row).collect()
    }

    async fn delete_where(&self, column: &str, user_id: &str, value: &str) -> Result<usize> {
        let sql = format!(
            "DELETE FROM trade_journal_links WHERE user_id = ? AND {} = ?",
            column
        );
        let result = sqlx::query(&sql)
            .bind(user_id)
            .bind(value)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Failed to delete links by {}", column))?;
        Ok(result.rows_affected() as usize)
    }
}

fn map_row(row: &SqliteRow) -> Result<TradeJournalLink> {
    let journal_date: String = row.try_get("journal_date")?;
    let link_type: String = row.try_get("link_type")?;
    let metadata: Option<String> = row.try_get("metadata")?;

    Ok(TradeJournalLink {
        id: row.try_get("id")?,
        trade_id: row.try_get("trade_id")?,
        journal_entry_id: row.try_get("journal_entry_id")?,
        journal_date: NaiveDate::parse_from_str(&journal_date, "%Y-%m-%d")
            .with_context(|| format!("Invalid journal date {}", journal_date))?,
        user_id: row.try_get("user_id")?,
        link_type: LinkType::from_str(&link_type)?,
        created_at: from_millis(row.try_get("created_at")?)?,
        updated_at: from_millis(row.try_get("updated_at")?)?,
        metadata: metadata
            .map(|m| serde_json::from_str(&m))
            .transpose()
            .context("Invalid link metadata")?,
    })
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .with_context(|| format!("Invalid timestamp {}", ms))
}

#[async_trait]
impl LinkRepository for SqliteLinkRepository {
    async fn upsert(&self, link: &TradeJournalLink) -> Result<()> {
        let metadata = link
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO trade_journal_links
            (id, user_id, trade_id, journal_entry_id, journal_date, link_type,
             created_at, updated_at, metadata)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(user_id, id) DO UPDATE SET
                journal_entry_id = excluded.journal_entry_id,
                link_type = excluded.link_type,
                updated_at = excluded.updated_at,
                metadata = excluded.metadata
            "#,
        )
        .bind(&link.id)
        .bind(&link.user_id)
        .bind(&link.trade_id)
        .bind(&link.journal_entry_id)
        .bind(link.journal_date.format("%Y-%m-%d").to_string())
        .bind(link.link_type.to_string())
        .bind(link.created_at.timestamp_millis())
        .bind(link.updated_at.timestamp_millis())
        .bind(metadata)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to upsert link {}", link.id))?;

        Ok(())
    }

    async fn get(&self, user_id: &str, link_id: &str) -> Result<Option<TradeJournalLink>> {
        let row = sqlx::query("SELECT * FROM trade_journal_links WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(link_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query link")?;

        row.as_ref().map(map_row).transpose()
    }

    async fn delete(&self, user_id: &str, link_id: &str) -> Result<bool> {
        Ok(self.delete_where("id", user_id, link_id).await? > 0)
    }

    async fn find_by_trade(&self, user_id: &str, trade_id: &str) -> Result<Vec<TradeJournalLink>> {
        self.find_where("trade_id", user_id, trade_id.to_string())
            .await
    }

    async fn find_by_journal_date(
        &self,
        user_id: &str,
        journal_date: NaiveDate,
    ) -> Result<Vec<TradeJournalLink>> {
        self.find_where(
            "journal_date",
            user_id,
            journal_date.format("%Y-%m-%d").to_string(),
        )
        .await
    }

    async fn find_by_journal_entry(
        &self,
        user_id: &str,
        journal_entry_id: &str,
    ) -> Result<Vec<TradeJournalLink>> {
        self.find_where("journal_entry_id", user_id, journal_entry_id.to_string())
            .await
    }

    async fn delete_by_trade(&self, user_id: &str, trade_id: &str) -> Result<usize> {
        self.delete_where("trade_id", user_id, trade_id).await
    }

    async fn delete_by_journal_entry(&self, user_id: &str, journal_entry_id: &str) -> Result<usize> {
        self.delete_where("journal_entry_id", user_id, journal_entry_id)
            .await
    }
}
