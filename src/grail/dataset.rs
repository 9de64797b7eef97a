//! Item progress dataset
//!
//! A dataset holds three item groups (normal, eth, runeword) mapping item
//! identifiers to progress. BTreeMap keys give stable lexicographic ordering
//! so serialized datasets are byte-for-byte comparable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Progress for a single tracked item.
///
/// Both fields are always carried so the UI can switch between checkbox and
/// counter display modes without data loss.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Whether the item has been found at least once
    pub found: bool,
    /// How many times the item has been found
    pub count: u32,
}

/// Display mode for item progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    #[default]
    Checkbox,
    Counter,
}

/// The three semantic item groups of a grail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GrailGroup {
    Normal,
    Eth,
    Runeword,
}

/// A local edit to the dataset.
///
/// Edits apply in call order; edits to distinct items commute, same-item edits
/// are last-write-wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EditOp {
    /// Flip the found flag for an item
    ToggleFound { group: GrailGroup, item: String },
    /// Set the find count for an item
    SetCount {
        group: GrailGroup,
        item: String,
        count: u32,
    },
}

/// The full tracked collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub mode: CountMode,
    pub normal: BTreeMap<String, Progress>,
    pub eth: BTreeMap<String, Progress>,
    pub runeword: BTreeMap<String, Progress>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a single edit in place.
    pub fn apply(&mut self, edit: &EditOp) {
        match edit {
            EditOp::ToggleFound { group, item } => {
                let entry = self.group_mut(*group).entry(item.clone()).or_default();
                entry.found = !entry.found;
                if entry.found && entry.count == 0 {
                    entry.count = 1;
                } else if !entry.found {
                    entry.count = 0;
                }
            }
            EditOp::SetCount { group, item, count } => {
                let entry = self.group_mut(*group).entry(item.clone()).or_default();
                entry.count = *count;
                entry.found = *count > 0;
            }
        }
    }

    /// Apply a batch of edits in order.
    pub fn apply_all<'a>(&mut self, edits: impl IntoIterator<Item = &'a EditOp>) {
        for edit in edits {
            self.apply(edit);
        }
    }

    /// Look up progress for an item.
    pub fn progress(&self, group: GrailGroup, item: &str) -> Option<Progress> {
        self.group(group).get(item).copied()
    }

    /// Total number of tracked items across all groups.
    pub fn len(&self) -> usize {
        self.normal.len() + self.eth.len() + self.runeword.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn group(&self, group: GrailGroup) -> &BTreeMap<String, Progress> {
        match group {
            GrailGroup::Normal => &self.normal,
            GrailGroup::Eth => &self.eth,
            GrailGroup::Runeword => &self.runeword,
        }
    }

    fn group_mut(&mut self, group: GrailGroup) -> &mut BTreeMap<String, Progress> {
        match group {
            GrailGroup::Normal => &mut self.normal,
            GrailGroup::Eth => &mut self.eth,
            GrailGroup::Runeword => &mut self.runeword,
        }
    }
}
