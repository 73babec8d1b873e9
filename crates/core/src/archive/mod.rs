//! Archive aggregator: bundles a batch's artifacts into one zip file.
//!
//! Archives are written under `<storage_root>/<archive_dir>/` as
//! `batch-<UTC timestamp>-<id>.zip`. Entries are named by file name only,
//! so artifacts from different groups share one flat namespace; a repeated
//! name gets a ` (n)` suffix before its extension.

mod aggregator;
mod error;

pub use aggregator::{entry_names, ArchiveAggregator};
pub use error::ArchiveError;
