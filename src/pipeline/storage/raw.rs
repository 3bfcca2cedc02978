use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::format_timestamp;
use crate::constants::RAW_TABLE;
use crate::error::Result;
use crate::metrics::StoreMetrics;
use crate::pipeline::processing::fields::extract_id;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RawInsertSummary {
    pub inserted: usize,
    /// Key already present; raw history is never rewritten
    pub skipped: usize,
    /// No usable key, or the write itself failed
    pub rejected: usize,
}

/// Append-only store of verbatim feed payloads, one row per business key.
pub struct RawStore<'c> {
    conn: &'c mut Connection,
}

impl<'c> RawStore<'c> {
    pub fn new(conn: &'c mut Connection) -> Self {
        Self { conn }
    }

    /// Insert each payload unless its key is already stored. The whole batch
    /// is committed once at the end.
    pub fn insert_if_absent(
        &mut self,
        batch: &[Value],
        fetched_at: DateTime<Utc>,
    ) -> Result<RawInsertSummary> {
        let mut summary = RawInsertSummary::default();
        let fetched_at = format_timestamp(&fetched_at);
        let tx = self.conn.transaction()?;

        for item in batch {
            let Some(disruption_id) = item.as_object().and_then(extract_id) else {
                debug!("Raw payload without disruption_id, not stored");
                summary.rejected += 1;
                continue;
            };

            let raw_json = match serde_json::to_string(item) {
                Ok(json) => json,
                Err(e) => {
                    warn!(disruption_id = %disruption_id, error = %e, "Failed to serialize raw payload");
                    summary.rejected += 1;
                    continue;
                }
            };

            let result = tx.execute(
                "INSERT INTO raw_disruptions (disruption_id, raw_json, fetched_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(disruption_id) DO NOTHING",
                params![disruption_id, raw_json, fetched_at],
            );
            match result {
                Ok(0) => summary.skipped += 1,
                Ok(_) => summary.inserted += 1,
                Err(e) => {
                    warn!(disruption_id = %disruption_id, error = %e, "Failed to save raw payload");
                    summary.rejected += 1;
                }
            }
        }

        tx.commit()?;
        info!(
            inserted = summary.inserted,
            skipped = summary.skipped,
            rejected = summary.rejected,
            "Raw payloads saved"
        );
        StoreMetrics::record_raw(summary.inserted, summary.skipped, summary.rejected);
        Ok(summary)
    }

    /// The stored payload for a key, parsed back into JSON.
    pub fn get(&self, disruption_id: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT raw_json FROM raw_disruptions WHERE disruption_id = ?1",
                params![disruption_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", RAW_TABLE);
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
