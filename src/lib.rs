//! Grail Sync
//!
//! A self-hosted Holy Grail item tracker with conflict-aware multi-device sync.
//! The server half persists per-address datasets behind an optimistic-concurrency
//! token scheme; the client half keeps a local working copy, detects divergence
//! from the server and exposes explicit resolution actions.
//!
//! # Modules
//!
//! - `grail`: dataset model and portable snapshot export
//! - `sync`: client-side versioned store, conflict detection and resolution
//! - `db`, `routes`: server-side persistence and HTTP API
//!
//! # Example
//!
//! ```no_run
//! use grail_sync::config::Config;
//! use grail_sync::grail::{EditOp, GrailGroup};
//! use grail_sync::sync::{GrailStore, HttpRemote};
//!
//! # async fn run() -> Result<(), grail_sync::sync::SyncError> {
//! let config = Config::from_env();
//! let remote = HttpRemote::new(config.remote.base_url.clone());
//!
//! let mut store = GrailStore::new(remote, "my-grail");
//! store.load().await?;
//! store.mutate(&EditOp::ToggleFound {
//!     group: GrailGroup::Normal,
//!     item: "windforce".to_string(),
//! });
//! store.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod grail;
pub mod routes;
pub mod state;
pub mod sync;
