use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::traits::{upsert_rows, DisruptionTable, UpsertSummary};
use super::{format_timestamp, parse_stored_timestamp};
use crate::constants::{CANONICAL_COLUMNS, NORMALIZED_TABLE};
use crate::error::{PipelineError, Result};
use crate::metrics::StoreMetrics;
use crate::types::CanonicalDisruption;

/// [`DisruptionTable`] over an open SQLite connection or transaction.
pub struct SqliteDisruptionTable<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteDisruptionTable<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl DisruptionTable for SqliteDisruptionTable<'_> {
    fn exists(&mut self, disruption_id: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT id FROM disruptions WHERE disruption_id = ?1",
                params![disruption_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn insert(&mut self, row: &CanonicalDisruption) -> Result<()> {
        self.conn.execute(
            "INSERT INTO disruptions (
                disruption_id, type, title, description,
                start_time, end_time, duration_minutes,
                impact_level, affected_stations,
                is_resolved, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                row.disruption_id,
                row.kind,
                row.title,
                row.description,
                row.start_time.as_ref().map(format_timestamp),
                row.end_time.as_ref().map(format_timestamp),
                row.duration_minutes,
                row.impact_level,
                row.affected_stations,
                row.is_resolved,
                format_timestamp(&row.created_at),
                format_timestamp(&row.updated_at),
            ],
        )?;
        Ok(())
    }

    fn update(&mut self, row: &CanonicalDisruption) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE disruptions SET
                type = ?1,
                title = ?2,
                description = ?3,
                start_time = ?4,
                end_time = ?5,
                duration_minutes = ?6,
                impact_level = ?7,
                affected_stations = ?8,
                updated_at = ?9
            WHERE disruption_id = ?10",
            params![
                row.kind,
                row.title,
                row.description,
                row.start_time.as_ref().map(format_timestamp),
                row.end_time.as_ref().map(format_timestamp),
                row.duration_minutes,
                row.impact_level,
                row.affected_stations,
                format_timestamp(&row.updated_at),
                row.disruption_id,
            ],
        )?;
        if changed == 0 {
            return Err(PipelineError::Storage {
                message: format!("no disruption with id {}", row.disruption_id),
            });
        }
        Ok(())
    }
}

/// Upsert store for canonical rows, keyed by `disruption_id`.
pub struct NormalizedStore<'c> {
    conn: &'c mut Connection,
}

impl<'c> NormalizedStore<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self { conn }
    }

    /// Upsert the batch inside one transaction, committed at the end. Rows
    /// that fail are logged and counted; they do not roll back the others.
    ///
    /// Every row is stamped with `written_at`: it becomes `updated_at` on
    /// both paths and `created_at` only for rows that are new.
    pub fn upsert_batch(
        &mut self,
        rows: &[CanonicalDisruption],
        written_at: DateTime<Utc>,
    ) -> Result<UpsertSummary> {
        let stamped: Vec<CanonicalDisruption> = rows
            .iter()
            .map(|row| CanonicalDisruption {
                created_at: written_at,
                updated_at: written_at,
                ..row.clone()
            })
            .collect();

        let tx = self.conn.transaction()?;
        let summary = {
            let mut table = SqliteDisruptionTable::new(&tx);
            upsert_rows(&mut table, &stamped)
        };
        tx.commit()?;

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            failed = summary.failed,
            "Normalized records saved"
        );
        StoreMetrics::record_normalized(summary.inserted, summary.updated, summary.failed);
        Ok(summary)
    }

    pub fn get(&self, disruption_id: &str) -> Result<Option<CanonicalDisruption>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE disruption_id = ?1",
            CANONICAL_COLUMNS.join(", "),
            NORMALIZED_TABLE
        );
        let row = self
            .conn
            .query_row(&sql, params![disruption_id], row_to_disruption)
            .optional()?;
        Ok(row)
    }

    pub fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", NORMALIZED_TABLE);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn row_to_disruption(row: &Row<'_>) -> rusqlite::Result<CanonicalDisruption> {
    let start_time: Option<String> = row.get(4)?;
    let end_time: Option<String> = row.get(5)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(CanonicalDisruption {
        disruption_id: row.get(0)?,
        kind: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        start_time: start_time.as_deref().and_then(parse_stored_timestamp),
        end_time: end_time.as_deref().and_then(parse_stored_timestamp),
        duration_minutes: row.get(6)?,
        impact_level: row.get(7)?,
        affected_stations: row.get(8)?,
        is_resolved: row.get(9)?,
        created_at: stored_instant(10, &created_at)?,
        updated_at: stored_instant(11, &updated_at)?,
    })
}

fn stored_instant(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    parse_stored_timestamp(text).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            rusqlite::types::Type::Text,
            format!("invalid timestamp '{}'", text).into(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::storage::Database;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 14, 12, 0, 0).unwrap()
    }

    fn row(id: &str) -> CanonicalDisruption {
        CanonicalDisruption {
            disruption_id: id.to_string(),
            kind: Some("maintenance".to_string()),
            title: Some("Werkzaamheden Rotterdam".to_string()),
            description: Some("Onderhoud spoor".to_string()),
            start_time: Some(t0() - Duration::hours(6)),
            end_time: Some(t0() + Duration::hours(6)),
            duration_minutes: Some(720.0),
            impact_level: 4,
            affected_stations: Some("RTD".to_string()),
            is_resolved: false,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    #[test]
    fn test_insert_and_read_back() {
        let mut db = Database::open_in_memory().unwrap();
        let summary = db.normalized_store().upsert_batch(&[row("a")], t0()).unwrap();
        assert_eq!(summary, UpsertSummary { inserted: 1, updated: 0, failed: 0 });

        let stored = db.normalized_store().get("a").unwrap().unwrap();
        assert_eq!(stored, row("a"));
    }

    #[test]
    fn test_identical_batch_twice_refreshes_updated_at() {
        let mut db = Database::open_in_memory().unwrap();
        let rows = vec![row("a"), row("b")];
        let t1 = t0() + Duration::milliseconds(1);

        db.normalized_store().upsert_batch(&rows, t0()).unwrap();
        let second = db.normalized_store().upsert_batch(&rows, t1).unwrap();

        assert_eq!(second, UpsertSummary { inserted: 0, updated: 2, failed: 0 });
        assert_eq!(db.normalized_store().count().unwrap(), 2);
        let stored = db.normalized_store().get("a").unwrap().unwrap();
        assert_eq!(stored.created_at, t0());
        assert_eq!(stored.updated_at, t1);
        assert!(stored.updated_at > stored.created_at);
    }

    #[test]
    fn test_write_time_overrides_cleaning_stamp() {
        let mut db = Database::open_in_memory().unwrap();
        let written_at = t0() + Duration::minutes(3);

        db.normalized_store().upsert_batch(&[row("a")], written_at).unwrap();

        let stored = db.normalized_store().get("a").unwrap().unwrap();
        assert_eq!(stored.created_at, written_at);
        assert_eq!(stored.updated_at, written_at);
    }

    #[test]
    fn test_second_upsert_updates_in_place() {
        let mut db = Database::open_in_memory().unwrap();
        db.normalized_store().upsert_batch(&[row("a")], t0()).unwrap();

        let t1 = t0() + Duration::minutes(10);
        let mut revised = row("a");
        revised.title = None;
        revised.impact_level = 3;
        let summary = db.normalized_store().upsert_batch(&[revised], t1).unwrap();

        assert_eq!(summary, UpsertSummary { inserted: 0, updated: 1, failed: 0 });
        assert_eq!(db.normalized_store().count().unwrap(), 1);

        let stored = db.normalized_store().get("a").unwrap().unwrap();
        assert_eq!(stored.title, None);
        assert_eq!(stored.impact_level, 3);
        assert_eq!(stored.created_at, t0());
        assert_eq!(stored.updated_at, t1);
    }

    #[test]
    fn test_update_does_not_touch_resolution() {
        let mut db = Database::open_in_memory().unwrap();
        db.normalized_store().upsert_batch(&[row("a")], t0()).unwrap();
        db.connection()
            .execute("UPDATE disruptions SET is_resolved = 1 WHERE disruption_id = 'a'", [])
            .unwrap();

        db.normalized_store()
            .upsert_batch(&[row("a")], t0() + Duration::minutes(5))
            .unwrap();

        assert!(db.normalized_store().get("a").unwrap().unwrap().is_resolved);
    }

    #[test]
    fn test_constraint_failure_is_counted_not_fatal() {
        let mut db = Database::open_in_memory().unwrap();
        let mut bad = row("bad");
        bad.duration_minutes = Some(-5.0);

        let summary = db
            .normalized_store()
            .upsert_batch(&[row("a"), bad, row("b")], t0())
            .unwrap();

        assert_eq!(summary, UpsertSummary { inserted: 2, updated: 0, failed: 1 });
        assert_eq!(db.normalized_store().count().unwrap(), 2);
    }

    #[test]
    fn test_missing_row_is_none() {
        let mut db = Database::open_in_memory().unwrap();
        assert!(db.normalized_store().get("nope").unwrap().is_none());
    }
}
