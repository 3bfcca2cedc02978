use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{CleaningConfig, SeverityConfig};
use crate::constants::MAX_ONGOING_HORIZON_HOURS;
use crate::error::{PipelineError, Result};
use crate::metrics::CleanerMetrics;
use crate::types::CanonicalDisruption;

use super::fields::{FieldNormalizer, TypeMapping};
use super::severity::{MetricsDeriver, SeverityTable, UnknownTypePolicy};
use super::stations::StationExtractor;
use super::timestamps::TimeReconciler;
use super::validate::RecordValidator;

/// Result of cleaning one batch
#[derive(Debug, Clone, Default)]
pub struct CleanOutcome {
    pub rows: Vec<CanonicalDisruption>,
    /// Records removed by validation (missing key, non-mapping entries, rejected types)
    pub dropped: usize,
    /// Kept records whose end time is provisional
    pub ongoing: usize,
}

/// Runs the cleaning stages over a batch: fields, timestamps, metrics,
/// stations, validation.
#[derive(Debug)]
pub struct Cleaner {
    fields: FieldNormalizer,
    times: TimeReconciler,
    metrics: MetricsDeriver,
    stations: StationExtractor,
    validator: RecordValidator,
}

impl Cleaner {
    pub fn new(
        fields: FieldNormalizer,
        times: TimeReconciler,
        metrics: MetricsDeriver,
        stations: StationExtractor,
        validator: RecordValidator,
    ) -> Self {
        Self {
            fields,
            times,
            metrics,
            stations,
            validator,
        }
    }

    pub fn from_config(cleaning: &CleaningConfig, severity: &SeverityConfig) -> Self {
        Self::new(
            FieldNormalizer::new(TypeMapping::ns_default(), cleaning.min_title_len),
            TimeReconciler::new(Duration::hours(
                cleaning
                    .ongoing_horizon_hours
                    .clamp(0, MAX_ONGOING_HORIZON_HOURS),
            )),
            MetricsDeriver::new(SeverityTable::ns_default(), UnknownTypePolicy::from(severity)),
            StationExtractor::ns_default(),
            RecordValidator::new(),
        )
    }

    /// Clean a batch as received from the feed. Anything but a JSON array is
    /// a batch-level error.
    #[instrument(skip(self, batch))]
    pub fn clean(&self, batch: &Value, now: DateTime<Utc>) -> Result<CleanOutcome> {
        let records = batch.as_array().ok_or_else(|| {
            PipelineError::MalformedBatch(format!(
                "expected a list of records, got {}",
                json_kind(batch)
            ))
        })?;
        Ok(self.clean_records(records, now))
    }

    /// `now` is both the fetch instant (for provisional end times) and the
    /// created/updated stamp.
    pub fn clean_records(&self, records: &[Value], now: DateTime<Utc>) -> CleanOutcome {
        let started = Instant::now();
        let mut outcome = CleanOutcome::default();
        if records.is_empty() {
            debug!("Nothing to clean");
            return outcome;
        }

        info!("Cleaning {} records", records.len());
        for (index, value) in records.iter().enumerate() {
            let Some(source) = value.as_object() else {
                warn!(index, "Dropping record that is not a mapping");
                outcome.dropped += 1;
                continue;
            };

            let mut record = self.fields.normalize(source.clone());
            self.times.reconcile(&mut record, now);
            self.metrics.derive(&mut record);
            self.stations.apply(&mut record);

            let ongoing = record.is_ongoing;
            match self.validator.validate(record, now) {
                Ok(row) => {
                    if ongoing {
                        outcome.ongoing += 1;
                    }
                    outcome.rows.push(row);
                }
                Err(reason) => {
                    warn!(index, reason = %reason, "Dropping record");
                    outcome.dropped += 1;
                }
            }
        }

        if outcome.dropped > 0 {
            warn!("Dropped {} records during validation", outcome.dropped);
        }
        info!(
            kept = outcome.rows.len(),
            dropped = outcome.dropped,
            ongoing = outcome.ongoing,
            "Cleaning finished"
        );
        CleanerMetrics::record_batch(
            records.len(),
            outcome.rows.len(),
            outcome.dropped,
            started.elapsed().as_secs_f64(),
        );
        outcome
    }
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::from_config(&CleaningConfig::default(), &SeverityConfig::default())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "a mapping",
    }
}
