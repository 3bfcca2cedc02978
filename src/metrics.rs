//! Pipeline metrics
//!
//! Counters go through the `metrics` facade, so they are no-ops unless a
//! recorder is installed. The binary installs a Prometheus recorder only when
//! asked to write a textfile at the end of the run.

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Cleaning-stage metrics
pub struct CleanerMetrics;

impl CleanerMetrics {
    pub fn record_batch(received: usize, kept: usize, dropped: usize, duration_secs: f64) {
        ::metrics::counter!("ns_cleaner_records_received_total").increment(received as u64);
        ::metrics::counter!("ns_cleaner_records_kept_total").increment(kept as u64);
        ::metrics::counter!("ns_cleaner_records_dropped_total").increment(dropped as u64);
        ::metrics::histogram!("ns_cleaner_batch_duration_seconds").record(duration_secs);
    }

    pub fn record_station_strategy_error() {
        ::metrics::counter!("ns_cleaner_station_strategy_errors_total").increment(1);
    }
}

/// Persistence-stage metrics
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_raw(inserted: usize, skipped: usize, rejected: usize) {
        ::metrics::counter!("ns_raw_inserted_total").increment(inserted as u64);
        ::metrics::counter!("ns_raw_skipped_total").increment(skipped as u64);
        ::metrics::counter!("ns_raw_rejected_total").increment(rejected as u64);
    }

    pub fn record_normalized(inserted: usize, updated: usize, failed: usize) {
        ::metrics::counter!("ns_normalized_inserted_total").increment(inserted as u64);
        ::metrics::counter!("ns_normalized_updated_total").increment(updated as u64);
        ::metrics::counter!("ns_normalized_failed_total").increment(failed as u64);
    }
}

/// Run-level metrics
pub struct RunMetrics;

impl RunMetrics {
    pub fn record_success() {
        ::metrics::counter!("ns_pipeline_runs_total", "result" => "success").increment(1);
    }

    pub fn record_failure() {
        ::metrics::counter!("ns_pipeline_runs_total", "result" => "failure").increment(1);
    }
}

/// Install the global Prometheus recorder. Returns `None` if one is already set.
pub fn install_recorder() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Failed to install Prometheus recorder: {}", e);
            None
        }
    }
}

/// Write the current exposition text to `path` (node-exporter textfile style).
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let body = handle.render();
    // Write-then-rename so a collector never sees a half-written file
    let tmp = path.with_extension("prom.tmp");
    fs::write(&tmp, body).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("renaming to {}", path.display()))?;
    info!("Wrote metrics to {}", path.display());
    Ok(())
}
