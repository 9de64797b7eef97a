//! Portable dataset snapshots
//!
//! Deterministic serialization of a dataset for export and offline comparison.
//! Key order is stable (lexicographic, via BTreeMap) so local and server
//! snapshots can be diffed byte-for-byte by external tools.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::dataset::{CountMode, Dataset, Progress};

/// Current snapshot schema version.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// A serialized, portable copy of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub schema_version: u32,
    pub mode: CountMode,
    pub normal_data: BTreeMap<String, Progress>,
    pub eth_data: BTreeMap<String, Progress>,
    pub runeword_data: BTreeMap<String, Progress>,
}

impl Snapshot {
    /// Capture a dataset. Never mutates the source.
    pub fn from_dataset(dataset: &Dataset) -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            mode: dataset.mode,
            normal_data: dataset.normal.clone(),
            eth_data: dataset.eth.clone(),
            runeword_data: dataset.runeword.clone(),
        }
    }

    /// Rebuild the dataset this snapshot was taken from.
    pub fn into_dataset(self) -> Dataset {
        Dataset {
            mode: self.mode,
            normal: self.normal_data,
            eth: self.eth_data,
            runeword: self.runeword_data,
        }
    }

    /// Deterministic JSON encoding.
    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Exact inverse of [`encode`](Self::encode).
    pub fn decode(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Write the snapshot to `<label>.json` under `dir`, returning the path.
    ///
    /// The label is caller-supplied, e.g. "Local Data" or "Server Data".
    pub fn write_to_file(&self, dir: &Path, label: &str) -> anyhow::Result<PathBuf> {
        let path = dir.join(format!("{}.json", label));
        std::fs::write(&path, self.encode()?)?;
        tracing::info!("Exported snapshot to {}", path.display());
        Ok(path)
    }
}
