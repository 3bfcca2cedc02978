use super::traits::DisruptionTable;
use crate::error::{PipelineError, Result};
use crate::types::CanonicalDisruption;
use std::collections::HashMap;
use tracing::debug;

/// In-memory disruption table for development/testing
#[derive(Debug, Default)]
pub struct InMemoryDisruptionTable {
    rows: HashMap<String, CanonicalDisruption>,
}

impl InMemoryDisruptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, disruption_id: &str) -> Option<&CanonicalDisruption> {
        self.rows.get(disruption_id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl DisruptionTable for InMemoryDisruptionTable {
    fn exists(&mut self, disruption_id: &str) -> Result<bool> {
        Ok(self.rows.contains_key(disruption_id))
    }

    fn insert(&mut self, row: &CanonicalDisruption) -> Result<()> {
        if self.rows.contains_key(&row.disruption_id) {
            return Err(PipelineError::Storage {
                message: format!("duplicate disruption_id {}", row.disruption_id),
            });
        }
        self.rows.insert(row.disruption_id.clone(), row.clone());
        debug!("Created disruption {}", row.disruption_id);
        Ok(())
    }

    fn update(&mut self, row: &CanonicalDisruption) -> Result<()> {
        let existing = self
            .rows
            .get_mut(&row.disruption_id)
            .ok_or_else(|| PipelineError::Storage {
                message: format!("no disruption with id {}", row.disruption_id),
            })?;

        existing.kind = row.kind.clone();
        existing.title = row.title.clone();
        existing.description = row.description.clone();
        existing.start_time = row.start_time;
        existing.end_time = row.end_time;
        existing.duration_minutes = row.duration_minutes;
        existing.impact_level = row.impact_level;
        existing.affected_stations = row.affected_stations.clone();
        existing.updated_at = row.updated_at;

        debug!("Updated disruption {}", row.disruption_id);
        Ok(())
    }
}
