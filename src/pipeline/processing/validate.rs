use chrono::{DateTime, Utc};
use std::fmt;

use crate::constants::{MAX_IMPACT_LEVEL, MIN_IMPACT_LEVEL};
use crate::types::{CanonicalDisruption, WorkingRecord};

/// Why a record did not make it into the canonical batch.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    MissingId,
    /// No severity rule recognized the type and the policy rejects such records.
    UnclassifiedType(Option<String>),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::MissingId => write!(f, "missing disruption_id"),
            DropReason::UnclassifiedType(Some(kind)) => write!(f, "unclassified type '{}'", kind),
            DropReason::UnclassifiedType(None) => write!(f, "missing type"),
        }
    }
}

/// Last cleaning stage: rejects unusable rows and projects the rest onto the
/// canonical columns, stamped as unresolved and created/updated at `now`.
#[derive(Debug, Clone, Default)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        record: WorkingRecord,
        now: DateTime<Utc>,
    ) -> Result<CanonicalDisruption, DropReason> {
        let disruption_id = match record.disruption_id {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Err(DropReason::MissingId),
        };
        let impact_level = match record.impact_level {
            Some(level) => clamp_impact(level),
            None => return Err(DropReason::UnclassifiedType(record.kind)),
        };

        Ok(CanonicalDisruption {
            disruption_id,
            kind: record.kind,
            title: record.title,
            description: record.description,
            start_time: record.start_time,
            end_time: record.end_time,
            duration_minutes: record.duration_minutes.filter(|d| *d >= 0.0 && d.is_finite()),
            impact_level,
            affected_stations: record.affected_stations,
            is_resolved: false,
            created_at: now,
            updated_at: now,
        })
    }
}

pub fn clamp_impact(level: i32) -> u8 {
    level.clamp(i32::from(MIN_IMPACT_LEVEL), i32::from(MAX_IMPACT_LEVEL)) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 14, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_clamp_impact() {
        assert_eq!(clamp_impact(-3), 1);
        assert_eq!(clamp_impact(0), 1);
        assert_eq!(clamp_impact(3), 3);
        assert_eq!(clamp_impact(99), 5);
    }

    #[test]
    fn test_missing_id_is_dropped() {
        let record = WorkingRecord {
            impact_level: Some(2),
            ..WorkingRecord::default()
        };
        assert_eq!(
            RecordValidator::new().validate(record, now()),
            Err(DropReason::MissingId)
        );

        let blank = WorkingRecord {
            disruption_id: Some(" ".to_string()),
            impact_level: Some(2),
            ..WorkingRecord::default()
        };
        assert_eq!(
            RecordValidator::new().validate(blank, now()),
            Err(DropReason::MissingId)
        );
    }

    #[test]
    fn test_unclassified_type_is_dropped() {
        let record = WorkingRecord {
            disruption_id: Some("x".to_string()),
            kind: Some("foo".to_string()),
            impact_level: None,
            ..WorkingRecord::default()
        };
        assert_eq!(
            RecordValidator::new().validate(record, now()),
            Err(DropReason::UnclassifiedType(Some("foo".to_string())))
        );
    }

    #[test]
    fn test_projection_stamps_metadata() {
        let record = WorkingRecord {
            disruption_id: Some("prio-1".to_string()),
            kind: Some("disruption".to_string()),
            impact_level: Some(42),
            duration_minutes: Some(30.0),
            ..WorkingRecord::default()
        };

        let row = RecordValidator::new().validate(record, now()).unwrap();

        assert_eq!(row.disruption_id, "prio-1");
        assert_eq!(row.impact_level, 5);
        assert!(!row.is_resolved);
        assert_eq!(row.created_at, now());
        assert_eq!(row.updated_at, now());
        assert_eq!(row.title, None);
        assert_eq!(row.affected_stations, None);
    }
}
