//! End-of-run statistics read back from the normalized table.

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::Result;

/// Rows created on one UTC day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    pub total: usize,
    /// Count per canonical type; rows without a type are under `"unknown"`
    pub by_type: BTreeMap<String, usize>,
    pub avg_duration_minutes: Option<f64>,
    pub max_impact: Option<u8>,
}

pub fn daily_summary(conn: &Connection, day: NaiveDate) -> Result<DailySummary> {
    let date = day.format("%Y-%m-%d").to_string();

    let mut stmt = conn.prepare(
        "SELECT COALESCE(type, 'unknown'), COUNT(*)
         FROM disruptions
         WHERE DATE(created_at) = ?1
         GROUP BY COALESCE(type, 'unknown')",
    )?;
    let rows = stmt.query_map(params![date], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut by_type = BTreeMap::new();
    let mut total = 0;
    for row in rows {
        let (kind, count) = row?;
        total += count as usize;
        by_type.insert(kind, count as usize);
    }

    let (avg_duration_minutes, max_impact): (Option<f64>, Option<u8>) = conn.query_row(
        "SELECT ROUND(AVG(duration_minutes), 1), MAX(impact_level)
         FROM disruptions
         WHERE DATE(created_at) = ?1",
        params![date],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(DailySummary {
        date: day,
        total,
        by_type,
        avg_duration_minutes,
        max_impact,
    })
}
