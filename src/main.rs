use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use ns_disruptions::config::Config;
use ns_disruptions::metrics;
use ns_disruptions::pipeline::ingestion::{FeedSource, FileFeed, NsApiClient};
use ns_disruptions::pipeline::report::{daily_summary, DailySummary};
use ns_disruptions::pipeline::storage::Database;
use ns_disruptions::pipeline::{Pipeline, RunSummary};

#[derive(Parser)]
#[command(name = "ns_disruptions")]
#[command(about = "Clean and load NS railway disruption records")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to a TOML config file (defaults to config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the SQLite database path
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Write Prometheus metrics to this file at the end of the run
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch disruptions from the NS API, then clean and load them
    Run,
    /// Clean and load a batch from a local JSON file
    Load {
        #[arg(long)]
        file: PathBuf,
    },
    /// Print statistics for rows created on one day
    Summary {
        /// Day as YYYY-MM-DD (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let _guard = ns_disruptions::logging::init_logging(Path::new("logs"));

    let cli = Cli::parse();
    let prometheus = cli.metrics_file.as_ref().and_then(|_| metrics::install_recorder());

    let result = run(&cli).await;

    if let (Some(handle), Some(path)) = (prometheus.as_ref(), cli.metrics_file.as_ref()) {
        if let Err(e) = metrics::write_textfile(handle, path) {
            warn!("Failed to write metrics file: {:#}", e);
        }
    }

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Run failed: {:#}", e);
            println!("❌ Run failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(path) = &cli.database {
        config.database_path = path.clone();
    }

    match &cli.command {
        Commands::Run => {
            println!("🚆 Fetching disruptions from the NS API...");
            let api_key = config.require_api_key()?.to_string();
            let client = NsApiClient::new(&config.feed, api_key)?;
            load_from(&config, &client, cli.json).await
        }
        Commands::Load { file } => {
            println!("📂 Loading disruptions from {}...", file.display());
            let feed = FileFeed::new(file);
            load_from(&config, &feed, cli.json).await
        }
        Commands::Summary { date } => {
            let day = date.unwrap_or_else(|| Utc::now().date_naive());
            let db = Database::open(&config.database_path)?;
            let summary = daily_summary(db.connection(), day)?;
            print_daily(&summary, cli.json)
        }
    }
}

async fn load_from(config: &Config, feed: &dyn FeedSource, json: bool) -> anyhow::Result<()> {
    let mut pipeline = Pipeline::from_config(config)?;
    let summary = pipeline.run(feed).await?;
    print_run(&summary, json)?;

    let today = Utc::now().date_naive();
    match daily_summary(pipeline.database().connection(), today) {
        Ok(daily) => info!(
            total = daily.total,
            avg_duration_minutes = ?daily.avg_duration_minutes,
            max_impact = ?daily.max_impact,
            by_type = ?daily.by_type,
            "Daily statistics"
        ),
        Err(e) => warn!("Failed to compute daily statistics: {}", e),
    }
    Ok(())
}

fn print_run(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!("\n📊 Run results:");
    println!("   Received: {}", summary.received);
    println!("   Inserted: {}", summary.inserted);
    println!("   Updated: {}", summary.updated);
    println!("   Skipped: {}", summary.skipped);
    println!(
        "   Raw payloads: {} new, {} already stored",
        summary.raw_inserted, summary.raw_skipped
    );
    Ok(())
}

fn print_daily(summary: &DailySummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }
    println!("\n📅 Disruptions created on {}:", summary.date);
    println!("   Total: {}", summary.total);
    for (kind, count) in &summary.by_type {
        println!("   {}: {}", kind, count);
    }
    match summary.avg_duration_minutes {
        Some(avg) => println!("   Average duration: {:.1} min", avg),
        None => println!("   Average duration: n/a"),
    }
    match summary.max_impact {
        Some(level) => println!("   Max impact: {}", level),
        None => println!("   Max impact: n/a"),
    }
    Ok(())
}
