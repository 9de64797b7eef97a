//! Conflict detection
//!
//! Pure classification of fetch and commit outcomes against the local store
//! state. The one tie-break rule: a token mismatch only becomes a conflict
//! when local edits are pending; a clean store just adopts the server state.

use crate::grail::Dataset;

use super::remote::{FetchOutcome, WriteOutcome};
use super::types::{ConflictRecord, GrailResponse, VersionToken};

/// Classified outcome of a fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchClass {
    /// Adopt the server state (initial load, or clean refresh)
    Adopt(GrailResponse),
    /// Server state unchanged since last sync; local edits stay
    KeepLocal,
    /// Server moved on while local edits are pending
    Conflict(ConflictRecord),
    /// No dataset exists for this address
    Missing,
}

/// Classified outcome of a commit.
#[derive(Debug, Clone, PartialEq)]
pub enum CommitClass {
    /// Write accepted, adopt the new token
    Accepted(VersionToken),
    /// Stale token with pending edits; the user must resolve
    Conflict(ConflictRecord),
    /// Stale token but nothing to lose; adopt the server state
    Adopt(GrailResponse),
}

/// Classify a fetch response.
pub fn classify_fetch(
    dirty: bool,
    last_token: Option<&VersionToken>,
    local: &Dataset,
    outcome: FetchOutcome,
) -> FetchClass {
    match outcome {
        FetchOutcome::Missing => FetchClass::Missing,
        FetchOutcome::Found(response) => {
            if !dirty {
                return FetchClass::Adopt(response);
            }
            match last_token {
                Some(token) if *token == response.token => FetchClass::KeepLocal,
                _ => FetchClass::Conflict(ConflictRecord {
                    local: local.clone(),
                    server: response.data,
                    server_token: response.token,
                }),
            }
        }
    }
}

/// Classify a commit response.
pub fn classify_commit(dirty: bool, local: &Dataset, outcome: WriteOutcome) -> CommitClass {
    match outcome {
        WriteOutcome::Accepted(accepted) => CommitClass::Accepted(accepted.token),
        WriteOutcome::Rejected(body) => {
            if dirty {
                CommitClass::Conflict(ConflictRecord {
                    local: local.clone(),
                    server: body.server_data,
                    server_token: body.server_token,
                })
            } else {
                CommitClass::Adopt(GrailResponse {
                    data: body.server_data,
                    token: body.server_token,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grail::{EditOp, GrailGroup};
    use crate::sync::types::{CommitAccepted, ConflictBody};

    fn edited_dataset() -> Dataset {
        let mut dataset = Dataset::new();
        dataset.apply(&EditOp::ToggleFound {
            group: GrailGroup::Normal,
            item: "x".to_string(),
        });
        dataset
    }

    fn server_response(token: &str) -> GrailResponse {
        GrailResponse {
            data: Dataset::new(),
            token: VersionToken::from(token.to_string()),
        }
    }

    #[test]
    fn test_clean_fetch_adopts() {
        let class = classify_fetch(false, None, &Dataset::new(), FetchOutcome::Found(server_response("t2")));
        assert!(matches!(class, FetchClass::Adopt(_)));
    }

    #[test]
    fn test_clean_fetch_adopts_even_on_token_change() {
        let old = VersionToken::from("t1".to_string());
        let class = classify_fetch(
            false,
            Some(&old),
            &Dataset::new(),
            FetchOutcome::Found(server_response("t2")),
        );
        assert!(matches!(class, FetchClass::Adopt(_)));
    }

    #[test]
    fn test_dirty_fetch_same_token_keeps_local() {
        let token = VersionToken::from("t1".to_string());
        let class = classify_fetch(
            true,
            Some(&token),
            &edited_dataset(),
            FetchOutcome::Found(server_response("t1")),
        );
        assert_eq!(class, FetchClass::KeepLocal);
    }

    #[test]
    fn test_dirty_fetch_new_token_conflicts() {
        let token = VersionToken::from("t1".to_string());
        let local = edited_dataset();
        let class = classify_fetch(
            true,
            Some(&token),
            &local,
            FetchOutcome::Found(server_response("t2")),
        );

        match class {
            FetchClass::Conflict(record) => {
                assert_eq!(record.local, local);
                assert_eq!(record.server_token.as_str(), "t2");
            }
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_commit_accepted() {
        let outcome = WriteOutcome::Accepted(CommitAccepted {
            token: VersionToken::from("t3".to_string()),
        });
        let class = classify_commit(true, &edited_dataset(), outcome);
        assert!(matches!(class, CommitClass::Accepted(t) if t.as_str() == "t3"));
    }

    #[test]
    fn test_dirty_commit_rejection_conflicts() {
        let outcome = WriteOutcome::Rejected(ConflictBody {
            server_data: Dataset::new(),
            server_token: VersionToken::from("t2".to_string()),
        });
        let class = classify_commit(true, &edited_dataset(), outcome);
        assert!(matches!(class, CommitClass::Conflict(_)));
    }

    #[test]
    fn test_clean_commit_rejection_adopts() {
        let outcome = WriteOutcome::Rejected(ConflictBody {
            server_data: Dataset::new(),
            server_token: VersionToken::from("t2".to_string()),
        });
        let class = classify_commit(false, &Dataset::new(), outcome);
        assert!(matches!(class, CommitClass::Adopt(_)));
    }
}
