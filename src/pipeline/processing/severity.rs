use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::SeverityConfig;
use crate::constants::{TYPE_CALAMITY, TYPE_DISRUPTION, TYPE_MAINTENANCE};
use crate::types::WorkingRecord;

/// Condition side of a severity rule, evaluated against the canonical type
/// label and the duration in minutes (unknown duration counts as 0).
#[derive(Debug, Clone, PartialEq)]
pub enum RuleCondition {
    TypeIs(String),
    /// Case-insensitive substring match on the type label
    TypeContains(String),
    TypeIsWithDurationAbove { kind: String, minutes: f64 },
}

impl RuleCondition {
    pub fn matches(&self, kind: &str, duration_minutes: f64) -> bool {
        match self {
            RuleCondition::TypeIs(expected) => kind == expected,
            RuleCondition::TypeContains(needle) => {
                kind.to_lowercase().contains(&needle.to_lowercase())
            }
            RuleCondition::TypeIsWithDurationAbove { kind: expected, minutes } => {
                kind == expected && duration_minutes > *minutes
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeverityRule {
    pub condition: RuleCondition,
    pub level: i32,
}

impl SeverityRule {
    pub fn new(condition: RuleCondition, level: i32) -> Self {
        Self { condition, level }
    }
}

/// Priority-ordered severity rules; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct SeverityTable {
    rules: Vec<SeverityRule>,
}

impl SeverityTable {
    pub fn new(rules: Vec<SeverityRule>) -> Self {
        Self { rules }
    }

    /// Classification used for the NS feed.
    pub fn ns_default() -> Self {
        use RuleCondition::*;
        Self::new(vec![
            SeverityRule::new(TypeIs(TYPE_CALAMITY.to_string()), 5),
            SeverityRule::new(TypeContains("cancel".to_string()), 5),
            SeverityRule::new(
                TypeIsWithDurationAbove {
                    kind: TYPE_MAINTENANCE.to_string(),
                    minutes: 240.0,
                },
                4,
            ),
            SeverityRule::new(TypeIs(TYPE_MAINTENANCE.to_string()), 3),
            SeverityRule::new(
                TypeIsWithDurationAbove {
                    kind: TYPE_DISRUPTION.to_string(),
                    minutes: 120.0,
                },
                4,
            ),
            SeverityRule::new(
                TypeIsWithDurationAbove {
                    kind: TYPE_DISRUPTION.to_string(),
                    minutes: 60.0,
                },
                3,
            ),
            SeverityRule::new(TypeIs(TYPE_DISRUPTION.to_string()), 2),
        ])
    }

    pub fn rules(&self) -> &[SeverityRule] {
        &self.rules
    }

    /// Level of the first matching rule, or `None` when no rule applies.
    pub fn classify(&self, kind: Option<&str>, duration_minutes: Option<f64>) -> Option<i32> {
        let kind = kind.unwrap_or("");
        let duration = duration_minutes.unwrap_or(0.0);
        self.rules
            .iter()
            .find(|rule| rule.condition.matches(kind, duration))
            .map(|rule| rule.level)
    }
}

impl Default for SeverityTable {
    fn default() -> Self {
        Self::ns_default()
    }
}

/// What to do with a record whose type no rule recognizes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnknownTypePolicy {
    Fallback(i32),
    Reject,
}

impl From<&SeverityConfig> for UnknownTypePolicy {
    fn from(config: &SeverityConfig) -> Self {
        if config.reject_unknown_types {
            UnknownTypePolicy::Reject
        } else {
            UnknownTypePolicy::Fallback(config.unknown_type_level)
        }
    }
}

/// Computes duration and impact level for a reconciled record.
#[derive(Debug, Clone)]
pub struct MetricsDeriver {
    table: SeverityTable,
    unknown_type: UnknownTypePolicy,
}

impl MetricsDeriver {
    pub fn new(table: SeverityTable, unknown_type: UnknownTypePolicy) -> Self {
        Self {
            table,
            unknown_type,
        }
    }

    pub fn derive(&self, record: &mut WorkingRecord) {
        record.duration_minutes = duration_minutes(record.start_time, record.end_time);
        record.impact_level = self.impact_level(record.kind.as_deref(), record.duration_minutes);
    }

    pub fn impact_level(&self, kind: Option<&str>, duration_minutes: Option<f64>) -> Option<i32> {
        match self.table.classify(kind, duration_minutes) {
            Some(level) => Some(level),
            None => match self.unknown_type {
                UnknownTypePolicy::Fallback(level) => Some(level),
                UnknownTypePolicy::Reject => {
                    debug!(kind = ?kind, "No severity rule for type");
                    None
                }
            },
        }
    }
}

impl Default for MetricsDeriver {
    fn default() -> Self {
        Self::new(SeverityTable::ns_default(), UnknownTypePolicy::Fallback(2))
    }
}

/// Minutes between two instants; `None` if either is missing or the span is negative.
pub fn duration_minutes(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<f64> {
    let (start, end) = (start?, end?);
    let minutes = (end - start).num_milliseconds() as f64 / 60_000.0;
    if minutes < 0.0 {
        None
    } else {
        Some(minutes)
    }
}
