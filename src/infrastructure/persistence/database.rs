use anyhow::{Context, Result};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tokio::fs;
use tracing::info;

/// Shared SQLite pool with the journal schema applied
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        // Ensure the directory exists if it's a file path
        if let Some(path_part) = db_url.strip_prefix("sqlite://") {
            let path = Path::new(path_part);
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
                && !parent.exists()
            {
                fs::create_dir_all(parent)
                    .await
                    .context("Failed to create database directory")?;
            }
        }

        let in_memory = db_url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(db_url)
            .with_context(|| format!("Invalid database URL {}", db_url))?
            .create_if_missing(true);
        if !in_memory {
            options = options.journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
        }

        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        info!("Database: Connected to {}", db_url);

        let db = Self { pool };
        db.init().await?;

        Ok(db)
    }

    /// Initialize database schema
    async fn init(&self) -> Result<()> {
        let mut conn = self.pool.acquire().await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                side TEXT NOT NULL,
                date TEXT NOT NULL,
                entry_time TEXT,
                exit_time TEXT,
                entry_price TEXT,
                exit_price TEXT,
                lot_size TEXT NOT NULL,
                pnl TEXT,
                status TEXT NOT NULL,
                notes TEXT,
                screenshots TEXT NOT NULL DEFAULT '[]',
                PRIMARY KEY (user_id, id)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trades table")?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_user_date ON trades (user_id, date);")
            .execute(&mut *conn)
            .await
            .context("Failed to create trades index")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS journal_entries (
                id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                completion_percentage INTEGER NOT NULL DEFAULT 0,
                content TEXT NOT NULL DEFAULT '',
                screenshots TEXT NOT NULL DEFAULT '[]',
                PRIMARY KEY (user_id, date)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create journal_entries table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_journal_links (
                id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                trade_id TEXT NOT NULL,
                journal_entry_id TEXT NOT NULL,
                journal_date TEXT NOT NULL,
                link_type TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                metadata TEXT,
                PRIMARY KEY (user_id, id)
            );
            "#,
        )
        .execute(&mut *conn)
        .await
        .context("Failed to create trade_journal_links table")?;

        for (name, column) in [
            ("idx_links_trade", "trade_id"),
            ("idx_links_date", "journal_date"),
            ("idx_links_entry", "journal_entry_id"),
        ] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS {} ON trade_journal_links (user_id, {});",
                name, column
            ))
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to create index {}", name))?;
        }

        info!("Database: Schema initialized");
        Ok(())
    }
}
