//! Sync data types
//!
//! Version tokens, conflict records and the wire types shared by the client
//! engine and the server routes.

use serde::{Deserialize, Serialize};

use crate::grail::{CountMode, Dataset, Snapshot};

/// Opaque marker of a server-accepted dataset state.
///
/// Issued server-side, one fresh token per accepted write. Clients compare
/// tokens only for equality and hold at most one last-synced token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Issue a fresh token.
    pub fn issue() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for VersionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for VersionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local and server state captured when a commit is rejected.
///
/// Produced once per rejected commit and consumed by exactly one resolution
/// action; it must not be dropped until the user picks one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRecord {
    /// The dataset with pending local edits
    pub local: Dataset,
    /// The server's current dataset
    pub server: Dataset,
    /// The server's current token
    pub server_token: VersionToken,
}

impl ConflictRecord {
    /// Snapshot either side for offline comparison. Pure; never mutates
    /// anything.
    pub fn export_snapshot(&self, side: SnapshotSide) -> Snapshot {
        match side {
            SnapshotSide::Local => Snapshot::from_dataset(&self.local),
            SnapshotSide::Server => Snapshot::from_dataset(&self.server),
        }
    }
}

/// Which dataset of a conflict record to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotSide {
    Local,
    Server,
}

/// Response body for `GET /grail/:address`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrailResponse {
    pub data: Dataset,
    pub token: VersionToken,
}

/// Request body for `PUT /grail/:address`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub data: Dataset,
    /// Last token the client saw; `None` when creating a fresh grail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<VersionToken>,
}

/// Success body for `PUT /grail/:address`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitAccepted {
    pub token: VersionToken,
}

/// 409 body carrying the server state the client diverged from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictBody {
    pub server_data: Dataset,
    pub server_token: VersionToken,
}

/// Per-address settings, a parallel resource with its own save action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrailSettings {
    pub use_item_count_mode: bool,
}

impl GrailSettings {
    /// Display mode implied by these settings.
    pub fn display_mode(&self) -> CountMode {
        if self.use_item_count_mode {
            CountMode::Counter
        } else {
            CountMode::Checkbox
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_unique() {
        assert_ne!(VersionToken::issue(), VersionToken::issue());
    }

    #[test]
    fn test_token_serializes_transparent() {
        let token = VersionToken::from("t-1".to_string());
        assert_eq!(serde_json::to_string(&token).unwrap(), "\"t-1\"");
    }

    #[test]
    fn test_commit_request_omits_missing_token() {
        let request = CommitRequest {
            data: Dataset::new(),
            token: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(!json.contains("token"));
    }

    #[test]
    fn test_conflict_body_field_names() {
        let body = ConflictBody {
            server_data: Dataset::new(),
            server_token: VersionToken::from("t-2".to_string()),
        };

        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("serverData"));
        assert!(json.contains("serverToken"));
    }
}
