//! Grail dataset model
//!
//! The user's tracked item-progress collection plus its portable snapshot
//! format for export and offline comparison.

mod dataset;
mod snapshot;

pub use dataset::{CountMode, Dataset, EditOp, GrailGroup, Progress};
pub use snapshot::{Snapshot, SNAPSHOT_SCHEMA_VERSION};
