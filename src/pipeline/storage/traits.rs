use serde::Serialize;
use tracing::{debug, warn};

use crate::error::Result;
use crate::types::CanonicalDisruption;

/// Keyed table of canonical disruptions, written through an explicit
/// two-phase contract: `exists`, then `insert` or `update`.
///
/// The check and the write are separate steps, so two writers racing on the
/// same key can both see "absent" and both insert. Callers must ensure a
/// single ingestion process at a time. An implementation with a native
/// conditional write may override [`DisruptionTable::upsert`] without
/// changing what callers observe.
pub trait DisruptionTable {
    fn exists(&mut self, disruption_id: &str) -> Result<bool>;

    /// Insert a row with every canonical column.
    fn insert(&mut self, row: &CanonicalDisruption) -> Result<()>;

    /// Overwrite every mutable column of an existing row. The business key,
    /// `created_at` and `is_resolved` are left alone.
    fn update(&mut self, row: &CanonicalDisruption) -> Result<()>;

    fn upsert(&mut self, row: &CanonicalDisruption) -> Result<UpsertOutcome> {
        if self.exists(&row.disruption_id)? {
            self.update(row)?;
            Ok(UpsertOutcome::Updated)
        } else {
            self.insert(row)?;
            Ok(UpsertOutcome::Inserted)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub updated: usize,
    pub failed: usize,
}

/// Upsert every row; a failing row is logged and counted, the rest proceed.
pub fn upsert_rows<T>(table: &mut T, rows: &[CanonicalDisruption]) -> UpsertSummary
where
    T: DisruptionTable + ?Sized,
{
    let mut summary = UpsertSummary::default();
    for row in rows {
        match table.upsert(row) {
            Ok(UpsertOutcome::Inserted) => {
                debug!(disruption_id = %row.disruption_id, "Inserted");
                summary.inserted += 1;
            }
            Ok(UpsertOutcome::Updated) => {
                debug!(disruption_id = %row.disruption_id, "Updated");
                summary.updated += 1;
            }
            Err(e) => {
                warn!(disruption_id = %row.disruption_id, error = %e, "Failed to save record");
                summary.failed += 1;
            }
        }
    }
    summary
}
