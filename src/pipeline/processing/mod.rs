// Record cleaning: field normalization, timestamps, derived metrics,
// station extraction and validation, sequenced by the cleaner.

pub mod cleaner;
pub mod fields;
pub mod severity;
pub mod stations;
pub mod timestamps;
pub mod validate;

pub use cleaner::{CleanOutcome, Cleaner};
