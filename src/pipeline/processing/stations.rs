//! Affected-station extraction
//!
//! The feed delivers station references in two different nested shapes, and
//! sometimes not at all. Each shape is handled by an independent strategy;
//! the extractor tries them in order and keeps the first non-empty result.
//! A strategy that trips over an unexpected shape never aborts the batch:
//! its error is logged and the next strategy gets a turn.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

use crate::constants::{FIELD_SECTION, FIELD_TIMESPANS};
use crate::metrics::CleanerMetrics;
use crate::types::WorkingRecord;

/// Bare upper-case tokens of 2-5 letters, a stand-in for station codes.
static STATION_CODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z]{2,5}\b").expect("valid regex"));

#[derive(Debug, Error)]
pub enum StationShapeError {
    #[error("field '{field}' has an unexpected shape: expected {expected}")]
    UnexpectedShape {
        field: String,
        expected: &'static str,
    },
}

pub type StationSet = BTreeSet<String>;

/// One way of finding station codes in a record.
pub trait StationStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, record: &WorkingRecord) -> Result<StationSet, StationShapeError>;
}

/// `section.stations[*].<code_field>`
#[derive(Debug, Clone)]
pub struct SectionStations {
    code_field: String,
}

impl SectionStations {
    pub fn new(code_field: impl Into<String>) -> Self {
        Self {
            code_field: code_field.into(),
        }
    }
}

impl Default for SectionStations {
    fn default() -> Self {
        Self::new("uicCode")
    }
}

impl StationStrategy for SectionStations {
    fn name(&self) -> &'static str {
        "section"
    }

    fn extract(&self, record: &WorkingRecord) -> Result<StationSet, StationShapeError> {
        let mut codes = StationSet::new();
        let Some(section) = record.source.get(FIELD_SECTION).and_then(Value::as_object) else {
            return Ok(codes);
        };
        let stations = stations_list(section.get("stations"), "section.stations")?;
        for station in stations {
            if let Some(code) = station.get(&self.code_field).and_then(code_value) {
                codes.insert(code);
            }
        }
        Ok(codes)
    }
}

/// `timespans[*].situation.stations[*].<code_field>`
#[derive(Debug, Clone)]
pub struct TimespanStations {
    code_field: String,
}

impl TimespanStations {
    pub fn new(code_field: impl Into<String>) -> Self {
        Self {
            code_field: code_field.into(),
        }
    }
}

impl Default for TimespanStations {
    fn default() -> Self {
        Self::new("stationCode")
    }
}

impl StationStrategy for TimespanStations {
    fn name(&self) -> &'static str {
        "timespans"
    }

    fn extract(&self, record: &WorkingRecord) -> Result<StationSet, StationShapeError> {
        let mut codes = StationSet::new();
        let Some(timespans) = record.source.get(FIELD_TIMESPANS).and_then(Value::as_array) else {
            return Ok(codes);
        };
        for timespan in timespans {
            let Some(situation) = timespan.get("situation").and_then(Value::as_object) else {
                continue;
            };
            let stations = stations_list(situation.get("stations"), "timespans.situation.stations")?;
            for station in stations {
                if let Some(code) = station.get(&self.code_field).and_then(code_value) {
                    codes.insert(code);
                }
            }
        }
        Ok(codes)
    }
}

/// Upper-case tokens in the (normalized) title.
#[derive(Debug, Clone, Default)]
pub struct TitleCodes;

impl StationStrategy for TitleCodes {
    fn name(&self) -> &'static str {
        "title"
    }

    fn extract(&self, record: &WorkingRecord) -> Result<StationSet, StationShapeError> {
        let Some(title) = record.title.as_deref() else {
            return Ok(StationSet::new());
        };
        Ok(STATION_CODE_RE
            .find_iter(title)
            .map(|m| m.as_str().to_string())
            .collect())
    }
}

pub struct StationExtractor {
    strategies: Vec<Box<dyn StationStrategy>>,
}

impl std::fmt::Debug for StationExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.strategies.iter().map(|s| s.name()).collect();
        f.debug_struct("StationExtractor")
            .field("strategies", &names)
            .finish()
    }
}

impl StationExtractor {
    pub fn with_strategies(strategies: Vec<Box<dyn StationStrategy>>) -> Self {
        Self { strategies }
    }

    /// Section, then timespans, then the title fallback.
    pub fn ns_default() -> Self {
        Self::with_strategies(vec![
            Box::new(SectionStations::default()),
            Box::new(TimespanStations::default()),
            Box::new(TitleCodes),
        ])
    }

    /// First non-empty strategy result, sorted and comma-joined.
    pub fn extract(&self, record: &WorkingRecord) -> Option<String> {
        for strategy in &self.strategies {
            match strategy.extract(record) {
                Ok(codes) if !codes.is_empty() => {
                    return Some(codes.into_iter().collect::<Vec<_>>().join(","));
                }
                Ok(_) => {}
                Err(e) => {
                    CleanerMetrics::record_station_strategy_error();
                    debug!(
                        disruption_id = ?record.disruption_id,
                        strategy = strategy.name(),
                        error = %e,
                        "Station strategy failed, falling through"
                    );
                }
            }
        }
        None
    }

    pub fn apply(&self, record: &mut WorkingRecord) {
        record.affected_stations = self.extract(record);
    }
}

impl Default for StationExtractor {
    fn default() -> Self {
        Self::ns_default()
    }
}

fn stations_list<'a>(
    value: Option<&'a Value>,
    field: &str,
) -> Result<&'a [Value], StationShapeError> {
    match value {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(items)) => Ok(items.as_slice()),
        Some(_) => Err(StationShapeError::UnexpectedShape {
            field: field.to_string(),
            expected: "a list of stations",
        }),
    }
}

fn code_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
