// Relational store: raw payloads and normalized disruptions in one SQLite file.

pub mod in_memory;
pub mod normalized;
pub mod raw;
pub mod traits;

pub use in_memory::InMemoryDisruptionTable;
pub use normalized::{NormalizedStore, SqliteDisruptionTable};
pub use raw::{RawInsertSummary, RawStore};
pub use traits::{upsert_rows, DisruptionTable, UpsertOutcome, UpsertSummary};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

use crate::constants::{SQL_TIMESTAMP_FORMAT, SQL_TIMESTAMP_PARSE_FORMAT};
use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS raw_disruptions (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    disruption_id TEXT NOT NULL UNIQUE,
    raw_json      TEXT NOT NULL,
    fetched_at    TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS disruptions (
    id                INTEGER PRIMARY KEY AUTOINCREMENT,
    disruption_id     TEXT NOT NULL UNIQUE,
    type              TEXT,
    title             TEXT,
    description       TEXT,
    start_time        TEXT,
    end_time          TEXT,
    duration_minutes  REAL CHECK (duration_minutes IS NULL OR duration_minutes >= 0),
    impact_level      INTEGER NOT NULL CHECK (impact_level BETWEEN 1 AND 5),
    affected_stations TEXT,
    is_resolved       INTEGER NOT NULL DEFAULT 0,
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_disruptions_start_time ON disruptions (start_time);
CREATE INDEX IF NOT EXISTS idx_disruptions_type ON disruptions (type);
"#;

/// Owns the SQLite connection and hands out the two stores.
pub struct Database {
    conn: Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        debug!("journal_mode={}", mode);
        init_schema(&conn)?;
        info!("Opened database at {}", path.display());
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn raw_store(&mut self) -> RawStore<'_> {
        RawStore::new(&mut self.conn)
    }

    pub fn normalized_store(&mut self) -> NormalizedStore<'_> {
        NormalizedStore::new(&mut self.conn)
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(SQL_TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn parse_stored_timestamp(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, SQL_TIMESTAMP_PARSE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_schema_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        init_schema(db.connection()).unwrap();
        let tables: i64 = db
            .connection()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('raw_disruptions', 'disruptions')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[test]
    fn test_sqlite_date_reads_fractional_text() {
        let db = Database::open_in_memory().unwrap();
        let ts = Utc.with_ymd_and_hms(2025, 2, 14, 23, 59, 59).unwrap();
        let day: String = db
            .connection()
            .query_row("SELECT DATE(?1)", [format_timestamp(&ts)], |row| row.get(0))
            .unwrap();
        assert_eq!(day, "2025-02-14");
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("rail.db");
        Database::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_timestamp_text_round_trip() {
        let ts = Utc.with_ymd_and_hms(2025, 2, 14, 7, 30, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "2025-02-14 07:30:00.000000");
        assert_eq!(parse_stored_timestamp("2025-02-14 07:30:00.000000"), Some(ts));
        assert_eq!(parse_stored_timestamp("2025-02-14 07:30:00"), Some(ts));
        assert_eq!(parse_stored_timestamp("garbage"), None);

        let precise = ts + chrono::Duration::microseconds(250);
        assert_eq!(parse_stored_timestamp(&format_timestamp(&precise)), Some(precise));
    }
}
