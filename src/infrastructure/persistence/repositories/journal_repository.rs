use crate::domain::journal::entry::JournalEntry;
use crate::domain::ports::JournalStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

pub struct SqliteJournalRepository {
    pool: SqlitePool,
}

impl SqliteJournalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, entry: &JournalEntry) -> Result<()> {
        entry.validate()?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO journal_entries
            (id, user_id, date, completion_percentage, content, screenshots)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.user_id)
        .bind(entry.date.format("%Y-%m-%d").to_string())
        .bind(entry.completion_percentage as i64)
        .bind(&entry.content)
        .bind(serde_json::to_string(&entry.screenshots)?)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save journal entry {}", entry.id))?;

        Ok(())
    }
}

#[async_trait]
impl JournalStore for SqliteJournalRepository {
    async fn get_journal_entry(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<JournalEntry>> {
        let row = sqlx::query("SELECT * FROM journal_entries WHERE user_id = ? AND date = ?")
            .bind(user_id)
            .bind(date.format("%Y-%m-%d").to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query journal entry")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let completion: i64 = row.try_get("completion_percentage")?;
        let screenshots: String = row.try_get("screenshots")?;
        Ok(Some(JournalEntry {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            date,
            completion_percentage: completion.clamp(0, 100) as u8,
            content: row.try_get("content")?,
            screenshots: serde_json::from_str(&screenshots).context("Invalid screenshots")?,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::persistence::Database;

    #[tokio::test]
    async fn test_save_and_load_entry() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let repo = SqliteJournalRepository::new(db.pool.clone());
        let date = NaiveDate::from_ymd_opt(2024, 9, 3).unwrap();

        let mut entry = JournalEntry::new("j1", "u1", date);
        entry.completion_percentage = 60;
        entry.content = "Patient entries, early exit on the second trade".to_string();
        entry.screenshots = vec!["a.png".to_string(), "b.png".to_string()];
        repo.save(&entry).await.unwrap();

        let loaded = repo.get_journal_entry("u1", date).await.unwrap().unwrap();
        assert_eq!(loaded, entry);
        assert!(repo.get_journal_entry("u2", date).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_entry() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let repo = SqliteJournalRepository::new(db.pool.clone());
        let mut entry = JournalEntry::new("j1", "u1", NaiveDate::from_ymd_opt(2024, 9, 3).unwrap());
        entry.completion_percentage = 150;
        assert!(repo.save(&entry).await.is_err());
    }
}
