use chrono::{DateTime, Utc};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Write the verbatim batch to `dir/disruptions_YYYYMMDD_HHMMSS.json`.
pub fn mirror_batch(dir: &Path, batch: &[Value], at: DateTime<Utc>) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("disruptions_{}.json", at.format("%Y%m%d_%H%M%S")));
    let body = serde_json::to_string_pretty(batch)?;
    fs::write(&path, body)?;
    Ok(path)
}

/// Mirror the batch, logging instead of failing on error.
pub fn mirror_batch_or_warn(dir: &Path, batch: &[Value], at: DateTime<Utc>) -> Option<PathBuf> {
    match mirror_batch(dir, batch, at) {
        Ok(path) => {
            info!("Raw batch mirrored to {}", path.display());
            Some(path)
        }
        Err(e) => {
            warn!(error = %e, dir = %dir.display(), "Failed to mirror raw batch");
            None
        }
    }
}
