//! journal-metrics - headless front end for the journal metrics engine
//!
//! Works against the SQLite database named by `DATABASE_URL` (or the
//! `database_url` key of `--config`). Results go to stdout, logs to stderr.
//!
//! # Usage
//! ```sh
//! journal-metrics import --trades trades.csv --journal journal.csv
//! journal-metrics metrics --user u1 --from 2024-03-01 --to 2024-03-31 --format csv
//! journal-metrics auto-link --user u1 --from 2024-03-01 --to 2024-03-31
//! journal-metrics links --user u1 --trade t42
//! journal-metrics watch --user u1 --date 2024-03-15
//! ```
//!
//! # Environment Variables
//! - `DATABASE_URL` - SQLite URL (default: sqlite://data/journal.db)
//! - `JOURNAL_CACHE_TTL_MS`, `JOURNAL_CHUNK_SIZE`, `JOURNAL_POLLING_INTERVAL_MS`, ...
//! - `RUST_LOG` - log filter (default: info)

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use tracing::{Level, info, warn};
use tracing_subscriber::prelude::*;

use tradejournal::application::metrics::MetricsOutcome;
use tradejournal::application::system::JournalEngine;
use tradejournal::config::EngineConfig;
use tradejournal::domain::calendar;
use tradejournal::domain::journal::entry::JournalEntry;
use tradejournal::domain::journal::link::LinkType;
use tradejournal::domain::trading::types::Trade;
use tradejournal::infrastructure::persistence::{SqliteJournalRepository, SqliteTradeRepository};

#[derive(Parser)]
#[command(author, version, about = "Daily trading metrics and trade/journal links", long_about = None)]
struct Cli {
    /// TOML config file; environment variables are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print Prometheus metrics to stderr before exiting
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load trades and journal entries from CSV files
    Import {
        #[arg(long)]
        trades: Option<PathBuf>,

        #[arg(long)]
        journal: Option<PathBuf>,
    },
    /// Compute daily metrics for an inclusive date range
    Metrics {
        #[arg(short, long)]
        user: String,

        #[arg(long, value_parser = parse_date_arg)]
        from: NaiveDate,

        #[arg(long, value_parser = parse_date_arg)]
        to: NaiveDate,

        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
    /// Link one trade to the journal entry of a date
    Link {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        trade: String,

        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,

        #[arg(long, default_value = "manual")]
        link_type: LinkType,
    },
    /// Remove the link between a trade and a journal date
    Unlink {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        trade: String,

        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
    },
    /// Auto-link trades to same-day journal entries across a range
    AutoLink {
        #[arg(short, long)]
        user: String,

        #[arg(long, value_parser = parse_date_arg)]
        from: NaiveDate,

        #[arg(long, value_parser = parse_date_arg)]
        to: NaiveDate,
    },
    /// Show the journal summary and links of a trade
    Links {
        #[arg(short, long)]
        user: String,

        #[arg(short, long)]
        trade: String,
    },
    /// Stream metrics for one day until Ctrl+C
    Watch {
        #[arg(short, long)]
        user: String,

        #[arg(long, value_parser = parse_date_arg)]
        date: NaiveDate,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Csv,
}

fn parse_date_arg(value: &str) -> Result<NaiveDate, String> {
    calendar::parse_date(value).map_err(|e| e.to_string())
}

/// Flat view of one outcome for CSV output
#[derive(Serialize)]
struct MetricsRow {
    date: String,
    source: String,
    pnl: String,
    trade_count: usize,
    win_rate: f64,
    total_volume: String,
    average_win: String,
    average_loss: String,
    max_drawdown: String,
    sharpe_ratio: Option<f64>,
    emotional_state: String,
    risk_level: String,
    has_journal_entry: bool,
    has_trade_notes: bool,
    completion_percentage: u8,
    calculation_ms: u128,
    error: Option<String>,
}

impl From<&MetricsOutcome> for MetricsRow {
    fn from(outcome: &MetricsOutcome) -> Self {
        let m = &outcome.metrics;
        Self {
            date: calendar::format_date(m.date),
            source: outcome.source.to_string(),
            pnl: m.pnl.to_string(),
            trade_count: m.trade_count,
            win_rate: m.win_rate,
            total_volume: m.total_volume.to_string(),
            average_win: m.average_win.to_string(),
            average_loss: m.average_loss.to_string(),
            max_drawdown: m.max_drawdown.to_string(),
            sharpe_ratio: m.sharpe_ratio,
            emotional_state: m.emotional_state.to_string(),
            risk_level: m.risk_level.to_string(),
            has_journal_entry: m.has_journal_entry,
            has_trade_notes: m.has_trade_notes,
            completion_percentage: m.completion_percentage,
            calculation_ms: outcome.calculation_time.as_millis(),
            error: outcome.error.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Logs on stderr so stdout stays machine-readable
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stderr_layer)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_toml_file(path)?,
        None => EngineConfig::from_env()?,
    };
    info!("journal-metrics {} starting", env!("CARGO_PKG_VERSION"));

    let engine = JournalEngine::build(config).await?;
    let result = run(&engine, cli.command).await;

    engine.shutdown();
    if cli.metrics {
        eprintln!("{}", engine.metrics.render());
    }
    result
}

async fn run(engine: &JournalEngine, command: Commands) -> Result<()> {
    match command {
        Commands::Import { trades, journal } => import(engine, trades, journal).await,
        Commands::Metrics {
            user,
            from,
            to,
            format,
        } => {
            let results = engine
                .metrics_service
                .calculate_range_metrics(&user, from, to)
                .await?;
            print_metrics(&results, format)
        }
        Commands::Link {
            user,
            trade,
            date,
            link_type,
        } => {
            let link = engine
                .link_registry
                .link(&user, &trade, date, link_type)
                .await?;
            print_json(&link)
        }
        Commands::Unlink { user, trade, date } => {
            let removed = engine.link_registry.unlink(&user, &trade, date).await?;
            if !removed {
                warn!("No link between {} and {}", trade, date);
            }
            print_json(&serde_json::json!({ "removed": removed }))
        }
        Commands::AutoLink { user, from, to } => {
            let report = engine
                .link_registry
                .batch_auto_link(&user, from, to)
                .await?;
            print_json(&report)
        }
        Commands::Links { user, trade } => {
            let summary = engine
                .link_registry
                .trade_integration_data(&user, &trade)
                .await;
            let links = engine.link_registry.links_for_trade(&user, &trade).await?;
            print_json(&serde_json::json!({ "summary": summary, "links": links }))
        }
        Commands::Watch { user, date } => {
            let subscription = engine
                .metrics_service
                .get_real_time_metrics(&user, date, |outcome| {
                    match serde_json::to_string(&outcome) {
                        Ok(line) => println!("{}", line),
                        Err(e) => warn!("Failed to encode metrics: {}", e),
                    }
                })
                .await?;

            info!("Watching {} on {}. Press Ctrl+C to stop.", user, date);
            tokio::signal::ctrl_c().await?;
            subscription.unsubscribe();
            Ok(())
        }
    }
}

async fn import(
    engine: &JournalEngine,
    trades: Option<PathBuf>,
    journal: Option<PathBuf>,
) -> Result<()> {
    let database = engine
        .database
        .as_ref()
        .context("Import requires a SQLite database")?;

    if let Some(path) = trades {
        let repo = SqliteTradeRepository::new(database.pool.clone());
        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut count = 0;
        for record in reader.deserialize::<Trade>() {
            let trade = record
                .with_context(|| format!("Invalid trade row in {}", path.display()))?
                .with_derived_pnl();
            repo.save(&trade).await?;
            engine
                .metrics_service
                .invalidate(&trade.user_id, trade.date);
            count += 1;
        }
        info!("Imported {} trades from {}", count, path.display());
    }

    if let Some(path) = journal {
        let repo = SqliteJournalRepository::new(database.pool.clone());
        let mut reader = csv::Reader::from_path(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut count = 0;
        for record in reader.deserialize::<JournalEntry>() {
            let entry =
                record.with_context(|| format!("Invalid journal row in {}", path.display()))?;
            repo.save(&entry).await?;
            engine
                .metrics_service
                .invalidate(&entry.user_id, entry.date);
            count += 1;
        }
        info!("Imported {} journal entries from {}", count, path.display());
    }

    Ok(())
}

fn print_metrics(results: &BTreeMap<NaiveDate, MetricsOutcome>, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(results),
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(std::io::stdout());
            for outcome in results.values() {
                writer.serialize(MetricsRow::from(outcome))?;
            }
            writer.flush()?;
            Ok(())
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
