// Data processing pipeline: ingestion, processing, storage and reporting

pub mod ingestion;
pub mod pipeline;
pub mod processing;
pub mod report;
pub mod storage;

pub use pipeline::{Pipeline, RunSummary};
