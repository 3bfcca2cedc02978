use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info, instrument};

use crate::config::Config;
use crate::error::Result;
use crate::metrics::RunMetrics;

use super::ingestion::{mirror_batch_or_warn, write_snapshot_or_warn, FeedSource};
use super::processing::Cleaner;
use super::storage::Database;

/// Result of one ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub received: usize,
    pub inserted: usize,
    pub updated: usize,
    /// Dropped during cleaning plus rows whose upsert failed
    pub skipped: usize,
    pub raw_inserted: usize,
    pub raw_skipped: usize,
}

/// Source of write timestamps for the normalized store
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Clean-and-load pipeline over one database.
pub struct Pipeline {
    db: Database,
    cleaner: Cleaner,
    mirror_dir: Option<PathBuf>,
    processed_dir: Option<PathBuf>,
    clock: Clock,
}

impl Pipeline {
    pub fn new(db: Database, cleaner: Cleaner) -> Self {
        Self {
            db,
            cleaner,
            mirror_dir: None,
            processed_dir: None,
            clock: Box::new(Utc::now),
        }
    }

    /// Open the configured database and build the cleaner from config.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db = Database::open(&config.database_path)?;
        let cleaner = Cleaner::from_config(&config.cleaning, &config.severity);
        let mut pipeline = Self::new(db, cleaner);
        if config.mirror.enabled {
            pipeline.mirror_dir = Some(config.mirror.dir.clone());
            pipeline.processed_dir = config.mirror.processed_dir.clone();
        }
        Ok(pipeline)
    }

    pub fn with_mirror_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.mirror_dir = Some(dir.into());
        self
    }

    pub fn with_processed_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.processed_dir = Some(dir.into());
        self
    }

    /// Replace the wall clock used to stamp `created_at`/`updated_at`.
    pub fn with_clock(
        mut self,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn database_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Fetch a batch, mirror it, then clean and load it.
    #[instrument(skip(self, feed), fields(feed = feed.name()))]
    pub async fn run(&mut self, feed: &dyn FeedSource) -> Result<RunSummary> {
        let records = match feed.fetch_disruptions().await {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Fetch failed, nothing loaded");
                RunMetrics::record_failure();
                return Err(e);
            }
        };
        let fetched_at = Utc::now();

        if let Some(dir) = &self.mirror_dir {
            mirror_batch_or_warn(dir, &records, fetched_at);
        }

        self.run_batch(&Value::Array(records), fetched_at)
    }

    /// Clean `batch` and persist it: raw payloads first, then canonical rows.
    /// A batch that is not a list fails before anything is written.
    #[instrument(skip(self, batch))]
    pub fn run_batch(&mut self, batch: &Value, fetched_at: DateTime<Utc>) -> Result<RunSummary> {
        let started = Instant::now();
        match self.load(batch, fetched_at) {
            Ok(summary) => {
                info!(
                    received = summary.received,
                    inserted = summary.inserted,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Run finished"
                );
                RunMetrics::record_success();
                Ok(summary)
            }
            Err(e) => {
                error!(error = %e, "Run failed");
                RunMetrics::record_failure();
                Err(e)
            }
        }
    }

    fn load(&mut self, batch: &Value, fetched_at: DateTime<Utc>) -> Result<RunSummary> {
        let outcome = self.cleaner.clean(batch, fetched_at)?;
        let records = batch.as_array().map(Vec::as_slice).unwrap_or(&[]);
        if records.is_empty() {
            info!("Empty batch, nothing to load");
            return Ok(RunSummary::default());
        }

        if let Some(dir) = &self.processed_dir {
            write_snapshot_or_warn(dir, &outcome.rows, fetched_at);
        }

        let raw = self.db.raw_store().insert_if_absent(records, fetched_at)?;
        let upserted = self
            .db
            .normalized_store()
            .upsert_batch(&outcome.rows, (self.clock)())?;

        Ok(RunSummary {
            received: records.len(),
            inserted: upserted.inserted,
            updated: upserted.updated,
            skipped: outcome.dropped + upserted.failed,
            raw_inserted: raw.inserted,
            raw_skipped: raw.skipped,
        })
    }
}
