//! Client-side sync engine
//!
//! Provides:
//! - A versioned local store with optimistic edits
//! - Conflict detection against the server's version token
//! - Explicit, idempotent resolution actions
//!
//! # Sync protocol
//!
//! 1. Client loads `{dataset, token}` from the server
//! 2. Local edits apply immediately and mark the store dirty
//! 3. `commit` sends the dataset tagged with the last-synced token
//! 4. A stale token while dirty yields a [`ConflictRecord`] the user must
//!    resolve (discard local, force overwrite, or export both for offline diff)
//!
//! # Conflict rules
//!
//! - A clean store adopts new server state silently; only pending local edits
//!   make a token mismatch a conflict
//! - Resolution is all-or-nothing; there is no field-level merge
//! - A conflict during force-overwrite surfaces again, it is never auto-retried

mod detector;
mod remote;
mod store;
mod types;

pub use detector::{classify_commit, classify_fetch, CommitClass, FetchClass};
pub use remote::{FetchOutcome, HttpRemote, Remote, WriteOutcome};
pub use store::{CancelHandle, GrailStore, SyncError};
pub use types::{
    CommitAccepted, CommitRequest, ConflictBody, ConflictRecord, GrailResponse, GrailSettings,
    SnapshotSide, VersionToken,
};
