use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use tracing::debug;

use crate::types::WorkingRecord;

/// Layouts carrying an explicit offset, e.g. `2025-02-14T08:30:00+0100`.
const OFFSET_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%z",
];

/// Layouts without an offset; these are read as UTC.
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Resolves start/end text into UTC instants and marks ongoing records.
#[derive(Debug, Clone)]
pub struct TimeReconciler {
    ongoing_horizon: Duration,
}

impl TimeReconciler {
    pub fn new(ongoing_horizon: Duration) -> Self {
        Self { ongoing_horizon }
    }

    pub fn ongoing_horizon(&self) -> Duration {
        self.ongoing_horizon
    }

    /// A record without a usable end time is ongoing and gets
    /// `fetched_at + horizon` as a provisional end. That value is a
    /// placeholder and flows straight into the duration.
    pub fn reconcile(&self, record: &mut WorkingRecord, fetched_at: DateTime<Utc>) {
        record.start_time = record.start_text.as_deref().and_then(parse_timestamp);
        record.end_time = record.end_text.as_deref().and_then(parse_timestamp);

        if record.end_time.is_none() {
            record.is_ongoing = true;
            record.end_time = fetched_at.checked_add_signed(self.ongoing_horizon);
            if record.end_time.is_none() {
                debug!("Provisional end time out of range, left empty");
            }
        }
    }
}

impl Default for TimeReconciler {
    fn default() -> Self {
        Self::new(Duration::hours(2))
    }
}

/// Parse a feed timestamp into UTC. Unparsable text yields `None`.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(text, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    debug!(value = %text, "Unparsable timestamp");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_horizon_overflow_leaves_end_empty() {
        let reconciler = TimeReconciler::new(Duration::days(100_000_000));
        let mut record = WorkingRecord {
            start_text: Some("2025-02-14T11:00:00Z".to_string()),
            ..WorkingRecord::default()
        };

        reconciler.reconcile(&mut record, utc(2025, 2, 14, 12, 0));

        assert!(record.is_ongoing);
        assert_eq!(record.end_time, None);
        assert_eq!(record.start_time, Some(utc(2025, 2, 14, 11, 0)));
    }

    #[test]
    fn test_parse_offset_without_colon() {
        assert_eq!(
            parse_timestamp("2025-02-14T08:30:00+0100"),
            Some(utc(2025, 2, 14, 7, 30))
        );
    }

    #[test]
    fn test_parse_rfc3339_variants() {
        assert_eq!(
            parse_timestamp("2025-02-14T08:30:00+01:00"),
            Some(utc(2025, 2, 14, 7, 30))
        );
        assert_eq!(
            parse_timestamp("2025-02-14T08:30:00Z"),
            Some(utc(2025, 2, 14, 8, 30))
        );
    }

    #[test]
    fn test_parse_naive_is_utc() {
        assert_eq!(
            parse_timestamp("2025-02-14 08:30:00"),
            Some(utc(2025, 2, 14, 8, 30))
        );
        assert_eq!(parse_timestamp("2025-02-14"), Some(utc(2025, 2, 14, 0, 0)));
    }

    #[test]
    fn test_garbage_is_none() {
        assert_eq!(parse_timestamp("tomorrow-ish"), None);
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("2025-13-45T99:00:00"), None);
    }

    #[test]
    fn test_missing_end_marks_ongoing() {
        let fetched_at = utc(2025, 2, 14, 12, 0);
        let mut record = WorkingRecord {
            start_text: Some("2025-02-14T10:00:00Z".to_string()),
            ..WorkingRecord::default()
        };

        TimeReconciler::default().reconcile(&mut record, fetched_at);

        assert!(record.is_ongoing);
        assert_eq!(record.start_time, Some(utc(2025, 2, 14, 10, 0)));
        assert_eq!(record.end_time, Some(utc(2025, 2, 14, 14, 0)));
    }

    #[test]
    fn test_unparsable_end_also_marks_ongoing() {
        let fetched_at = utc(2025, 2, 14, 12, 0);
        let mut record = WorkingRecord {
            start_text: Some("2025-02-14T10:00:00Z".to_string()),
            end_text: Some("soon".to_string()),
            ..WorkingRecord::default()
        };

        TimeReconciler::new(Duration::hours(3)).reconcile(&mut record, fetched_at);

        assert!(record.is_ongoing);
        assert_eq!(record.end_time, Some(utc(2025, 2, 14, 15, 0)));
    }

    #[test]
    fn test_reported_end_is_kept() {
        let mut record = WorkingRecord {
            start_text: Some("2025-02-14T08:30:00+0100".to_string()),
            end_text: Some("2025-02-14T10:00:00+0100".to_string()),
            ..WorkingRecord::default()
        };

        TimeReconciler::default().reconcile(&mut record, utc(2025, 2, 14, 12, 0));

        assert!(!record.is_ongoing);
        assert_eq!(record.end_time, Some(utc(2025, 2, 14, 9, 0)));
    }
}
