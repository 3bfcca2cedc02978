use serde_json::Value;
use tracing::debug;

use crate::constants::{
    DEFAULT_TYPE_MAPPING, FIELD_DESCRIPTION, FIELD_DISRUPTION_ID, FIELD_END, FIELD_ID,
    FIELD_START, FIELD_TITLE, FIELD_TYPE,
};
use crate::types::{RawRecord, WorkingRecord};

/// Ordered lookup from lower-cased source type labels to canonical labels.
///
/// The mapping is open: labels that are not listed pass through unchanged.
#[derive(Debug, Clone)]
pub struct TypeMapping {
    entries: Vec<(String, String)>,
}

impl TypeMapping {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(from, to)| (from.into().to_lowercase(), to.into()))
                .collect(),
        }
    }

    /// The NS feed vocabulary (Dutch labels)
    pub fn ns_default() -> Self {
        Self::new(DEFAULT_TYPE_MAPPING)
    }

    pub fn lookup(&self, lowered: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(from, _)| from == lowered)
            .map(|(_, to)| to.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }
}

/// Maps raw feed vocabulary onto the working schema.
#[derive(Debug, Clone)]
pub struct FieldNormalizer {
    type_mapping: TypeMapping,
    min_title_len: usize,
}

impl FieldNormalizer {
    pub fn new(type_mapping: TypeMapping, min_title_len: usize) -> Self {
        Self {
            type_mapping,
            min_title_len,
        }
    }

    pub fn normalize(&self, source: RawRecord) -> WorkingRecord {
        let disruption_id = extract_id(&source);
        let kind = source
            .get(FIELD_TYPE)
            .and_then(Value::as_str)
            .map(|t| self.normalize_type(t));
        let title = source
            .get(FIELD_TITLE)
            .and_then(Value::as_str)
            .and_then(|t| self.normalize_title(t));
        let description = text_field(&source, FIELD_DESCRIPTION);
        let start_text = text_field(&source, FIELD_START);
        let end_text = text_field(&source, FIELD_END);

        WorkingRecord {
            disruption_id,
            kind,
            title,
            description,
            start_text,
            end_text,
            source,
            ..WorkingRecord::default()
        }
    }

    /// Lower-case, then map; unknown labels come back lower-cased but otherwise untouched.
    pub fn normalize_type(&self, raw: &str) -> String {
        let lowered = raw.to_lowercase();
        match self.type_mapping.lookup(&lowered) {
            Some(canonical) => canonical.to_string(),
            None => lowered,
        }
    }

    /// Trim, and drop titles too short to be anything but placeholders.
    pub fn normalize_title(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < self.min_title_len {
            debug!(title = %trimmed, "Discarding short title");
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new(TypeMapping::ns_default(), 5)
    }
}

/// The business key, under either of its names. Numeric ids are stringified.
/// A non-scalar `disruption_id` falls back to `id`.
pub fn extract_id(source: &RawRecord) -> Option<String> {
    let value = source
        .get(FIELD_DISRUPTION_ID)
        .filter(|v| matches!(v, Value::String(_) | Value::Number(_)))
        .or_else(|| source.get(FIELD_ID))?;

    let id = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

fn text_field(source: &RawRecord, field: &str) -> Option<String> {
    match source.get(field) {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Null) | None => None,
        Some(other) => {
            debug!(field, value = %other, "Ignoring non-text field value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> RawRecord {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_known_type_labels_are_mapped() {
        let normalizer = FieldNormalizer::default();
        assert_eq!(normalizer.normalize_type("verstoring"), "disruption");
        assert_eq!(normalizer.normalize_type("STORING"), "disruption");
        assert_eq!(normalizer.normalize_type("Werkzaamheden"), "maintenance");
        assert_eq!(normalizer.normalize_type("calamiteit"), "calamity");
    }

    #[test]
    fn test_unknown_type_passes_through() {
        let normalizer = FieldNormalizer::default();
        assert_eq!(normalizer.normalize_type("foo"), "foo");
        assert_eq!(normalizer.normalize_type("Cancellation"), "cancellation");
    }

    #[test]
    fn test_id_is_renamed() {
        let normalizer = FieldNormalizer::default();
        let working = normalizer.normalize(record(json!({"id": "prio-12345"})));
        assert_eq!(working.disruption_id.as_deref(), Some("prio-12345"));
    }

    #[test]
    fn test_disruption_id_preferred_over_id() {
        let source = record(json!({"disruption_id": "a", "id": "b"}));
        assert_eq!(extract_id(&source).as_deref(), Some("a"));
    }

    #[test]
    fn test_non_scalar_disruption_id_falls_back_to_id() {
        for shadow in [json!({}), json!([]), json!(true), json!(null)] {
            let source = record(json!({"disruption_id": shadow, "id": "abc"}));
            assert_eq!(extract_id(&source).as_deref(), Some("abc"));
        }
    }

    #[test]
    fn test_numeric_and_blank_ids() {
        assert_eq!(extract_id(&record(json!({"id": 42}))).as_deref(), Some("42"));
        assert_eq!(extract_id(&record(json!({"id": "  "}))), None);
        assert_eq!(extract_id(&record(json!({"id": {"nested": 1}}))), None);
        assert_eq!(extract_id(&record(json!({"title": "no id"}))), None);
    }

    #[test]
    fn test_title_is_trimmed_and_short_titles_dropped() {
        let normalizer = FieldNormalizer::default();
        assert_eq!(
            normalizer.normalize_title("  Storing tussen ASD en UTR  ").as_deref(),
            Some("Storing tussen ASD en UTR")
        );
        assert_eq!(normalizer.normalize_title(" test "), None);
        assert_eq!(normalizer.normalize_title("abcde").as_deref(), Some("abcde"));
    }

    #[test]
    fn test_non_text_fields_become_none() {
        let normalizer = FieldNormalizer::default();
        let working = normalizer.normalize(record(json!({
            "id": "x",
            "type": 7,
            "description": ["not", "text"],
            "start": 1700000000
        })));
        assert_eq!(working.kind, None);
        assert_eq!(working.description, None);
        assert_eq!(working.start_text, None);
    }
}
