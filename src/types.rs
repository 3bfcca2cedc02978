use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A record exactly as the feed delivered it.
pub type RawRecord = Map<String, Value>;

/// Intermediate row carried through the cleaning stages.
///
/// Every stage fills in or rewrites some of these fields; nothing here is
/// guaranteed until the validator has projected it into a
/// [`CanonicalDisruption`].
#[derive(Debug, Clone, Default)]
pub struct WorkingRecord {
    pub disruption_id: Option<String>,
    pub kind: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_text: Option<String>,
    pub end_text: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Set when the feed reported no usable end time; `end_time` is then synthetic.
    pub is_ongoing: bool,
    pub duration_minutes: Option<f64>,
    /// `None` when no severity rule matched and unknown types are rejected.
    pub impact_level: Option<i32>,
    pub affected_stations: Option<String>,
    /// The source mapping, kept for the nested station lookups.
    pub source: RawRecord,
}

/// A normalized disruption row, keyed by `disruption_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDisruption {
    pub disruption_id: String,
    /// Canonical label (`disruption`, `maintenance`, `calamity`) or the
    /// lower-cased source label when it is not in the mapping.
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    /// For ongoing disruptions this is a provisional fetch time + horizon,
    /// not a reported end.
    pub end_time: Option<DateTime<Utc>>,
    /// Unknown when `None`; never negative.
    pub duration_minutes: Option<f64>,
    pub impact_level: u8,
    /// Sorted, comma-joined, de-duplicated station codes.
    pub affected_stations: Option<String>,
    pub is_resolved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CanonicalDisruption {
    /// Station codes as a list, split back out of the stored string.
    pub fn station_codes(&self) -> Vec<&str> {
        self.affected_stations
            .as_deref()
            .map(|s| s.split(',').filter(|c| !c.is_empty()).collect())
            .unwrap_or_default()
    }
}
