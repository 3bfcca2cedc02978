use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::types::CanonicalDisruption;

/// Write the cleaned rows to `dir/cleaned_YYYYMMDD_HHMMSS.csv`, one header
/// row plus one line per canonical row.
pub fn write_snapshot(
    dir: &Path,
    rows: &[CanonicalDisruption],
    at: DateTime<Utc>,
) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("cleaned_{}.csv", at.format("%Y%m%d_%H%M%S")));
    let mut writer = csv::Writer::from_path(&path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(path)
}

/// Snapshot the cleaned rows, logging instead of failing on error.
pub fn write_snapshot_or_warn(
    dir: &Path,
    rows: &[CanonicalDisruption],
    at: DateTime<Utc>,
) -> Option<PathBuf> {
    match write_snapshot(dir, rows, at) {
        Ok(path) => {
            info!("Cleaned batch ({} rows) saved to {}", rows.len(), path.display());
            Some(path)
        }
        Err(e) => {
            warn!(error = %e, dir = %dir.display(), "Failed to write cleaned snapshot");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn row(id: &str, stations: Option<&str>) -> CanonicalDisruption {
        let at = Utc.with_ymd_and_hms(2025, 2, 14, 12, 0, 0).unwrap();
        CanonicalDisruption {
            disruption_id: id.to_string(),
            kind: Some("disruption".to_string()),
            title: Some("Storing tussen Amsterdam en Utrecht".to_string()),
            description: None,
            start_time: Some(at - Duration::minutes(90)),
            end_time: Some(at),
            duration_minutes: Some(90.0),
            impact_level: 3,
            affected_stations: stations.map(str::to_string),
            is_resolved: false,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_snapshot_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 2, 14, 15, 30, 45).unwrap();

        let path = write_snapshot(
            dir.path(),
            &[row("prio-1", Some("ASD,UTR")), row("prio-2", None)],
            at,
        )
        .unwrap();

        assert_eq!(path.file_name().unwrap(), "cleaned_20250214_153045.csv");
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.get(0), Some("disruption_id"));
        assert_eq!(headers.get(1), Some("type"));

        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get(0), Some("prio-1"));
        // Comma-joined stations stay in one quoted field
        assert_eq!(records[0].get(8), Some("ASD,UTR"));
        assert_eq!(records[1].get(8), Some(""));
    }

    #[test]
    fn test_snapshot_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "file").unwrap();

        let at = Utc.with_ymd_and_hms(2025, 2, 14, 15, 30, 45).unwrap();
        assert!(write_snapshot_or_warn(&blocker, &[row("prio-1", None)], at).is_none());
    }
}
