// Pipeline ingestion: feed sources, the raw payload mirror and cleaned-batch snapshots

pub mod feed;
pub mod processed_snapshot;
pub mod raw_mirror;

pub use feed::{batch_from_body, FeedSource, FileFeed, NsApiClient};
pub use processed_snapshot::{write_snapshot, write_snapshot_or_warn};
pub use raw_mirror::{mirror_batch, mirror_batch_or_warn};
