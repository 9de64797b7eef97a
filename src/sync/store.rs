//! Client-side versioned dataset store
//!
//! Holds the local working copy plus the last server-accepted token. Edits
//! apply immediately without network I/O; `commit` pushes the dataset under
//! the last-synced token and surfaces a [`ConflictRecord`] when the server
//! has moved on.
//!
//! Only one commit may be in flight per store; the slot is released by an
//! RAII guard so a dropped commit future cannot wedge the store. Responses
//! that complete after the store moved on are discarded via a monotonically
//! increasing request sequence number.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::grail::{Dataset, EditOp, Snapshot};

use super::detector::{classify_commit, classify_fetch, CommitClass, FetchClass};
use super::remote::{Remote, WriteOutcome};
use super::types::{CommitRequest, ConflictRecord, GrailSettings, VersionToken};

/// Sync engine errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("No Holy Grail for the address '{address}' exists!")]
    NotFound { address: String },

    /// The server data changed while local edits are pending. Carries the
    /// recoverable state; must not be dropped until a resolution is picked.
    #[error("the server data changed, but you also have local changes")]
    Conflict(Box<ConflictRecord>),

    /// The server token advanced a second time between conflict detection and
    /// the overwrite. Re-surfaced as a fresh conflict, never retried silently.
    #[error("the server data changed again before the overwrite was accepted")]
    StaleAgain(Box<ConflictRecord>),

    #[error("a commit is already in flight for this grail")]
    CommitInProgress,

    /// The response arrived after the store moved on and was discarded.
    #[error("the pending request was cancelled")]
    Cancelled,

    #[error("sync request failed: {0}")]
    Generic(String),
}

/// Cancels whatever request is currently in flight for a store.
///
/// Bumping the sequence number makes the store discard the pending response
/// instead of applying it.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<AtomicU64>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Releases the commit slot on drop.
struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    fn acquire(slot: &Arc<AtomicBool>) -> Option<Self> {
        slot.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(Arc::clone(slot)))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The local working copy of a grail, with sync state.
pub struct GrailStore<R: Remote> {
    remote: R,
    address: String,
    dataset: Dataset,
    settings: GrailSettings,
    /// Token of the last server-accepted state we synced against
    token: Option<VersionToken>,
    /// Whether uncommitted local edits exist
    dirty: bool,
    in_flight: Arc<AtomicBool>,
    seq: Arc<AtomicU64>,
}

impl<R: Remote> GrailStore<R> {
    pub fn new(remote: R, address: impl Into<String>) -> Self {
        Self {
            remote,
            address: address.into(),
            dataset: Dataset::new(),
            settings: GrailSettings::default(),
            token: None,
            dirty: false,
            in_flight: Arc::new(AtomicBool::new(false)),
            seq: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Local edits are visible here before any network round-trip.
    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn token(&self) -> Option<&VersionToken> {
        self.token.as_ref()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn settings(&self) -> GrailSettings {
        self.settings
    }

    /// Handle for cancelling the currently pending request.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.seq))
    }

    fn current_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Any applied state change invalidates responses issued before it.
    fn bump_seq(&self) {
        self.seq.fetch_add(1, Ordering::SeqCst);
    }

    fn adopt(&mut self, data: Dataset, token: VersionToken) {
        self.dataset = data;
        self.token = Some(token);
        self.dirty = false;
        self.bump_seq();
    }

    /// Fetch the server state for this address.
    ///
    /// A clean store adopts whatever the server holds. A dirty store keeps its
    /// edits when the token is unchanged and fails with [`SyncError::Conflict`]
    /// when the server moved on, so pending edits are never silently lost.
    pub async fn load(&mut self) -> Result<(), SyncError> {
        let issued = self.current_seq();
        let outcome = self
            .remote
            .fetch_grail(&self.address)
            .await
            .map_err(|e| SyncError::Generic(e.to_string()))?;

        if issued != self.current_seq() {
            return Err(SyncError::Cancelled);
        }

        match classify_fetch(self.dirty, self.token.as_ref(), &self.dataset, outcome) {
            FetchClass::Adopt(response) => {
                self.adopt(response.data, response.token);
                Ok(())
            }
            FetchClass::KeepLocal => Ok(()),
            FetchClass::Conflict(record) => Err(SyncError::Conflict(Box::new(record))),
            FetchClass::Missing => Err(SyncError::NotFound {
                address: self.address.clone(),
            }),
        }
    }

    /// Apply a local edit. No network I/O; marks the store dirty.
    pub fn mutate(&mut self, edit: &EditOp) {
        self.dataset.apply(edit);
        self.dirty = true;
        self.bump_seq();
    }

    /// Attempt to persist the local dataset under the last-synced token.
    ///
    /// Fails fast with [`SyncError::CommitInProgress`] while another commit is
    /// outstanding. A stale token with pending edits yields
    /// [`SyncError::Conflict`]; a stale token on a clean store just adopts the
    /// server state.
    pub async fn commit(&mut self) -> Result<VersionToken, SyncError> {
        if !self.dirty {
            if let Some(token) = &self.token {
                return Ok(token.clone());
            }
        }

        let expected = self.token.clone();
        let class = self.push(expected).await?;

        match class {
            CommitClass::Accepted(token) => {
                self.token = Some(token.clone());
                self.dirty = false;
                self.bump_seq();
                Ok(token)
            }
            CommitClass::Conflict(record) => Err(SyncError::Conflict(Box::new(record))),
            CommitClass::Adopt(response) => {
                let token = response.token.clone();
                self.adopt(response.data, response.token);
                Ok(token)
            }
        }
    }

    /// Replace the local dataset with the server's, adopting its token.
    ///
    /// Always succeeds locally; never touches the network. Idempotent.
    pub fn discard_local(&mut self, record: &ConflictRecord) {
        self.adopt(record.server.clone(), record.server_token.clone());
        tracing::info!(address = %self.address, "discarded local changes in favor of server data");
    }

    /// Resend the local dataset tagged with the server's current token so the
    /// write is accepted over the diverged state.
    ///
    /// If the server token advanced again in the meantime the result is
    /// [`SyncError::StaleAgain`] carrying a fresh conflict record; it is never
    /// retried automatically.
    pub async fn force_overwrite(
        &mut self,
        record: &ConflictRecord,
    ) -> Result<VersionToken, SyncError> {
        let class = self.push(Some(record.server_token.clone())).await?;

        match class {
            CommitClass::Accepted(token) => {
                self.token = Some(token.clone());
                self.dirty = false;
                self.bump_seq();
                Ok(token)
            }
            CommitClass::Conflict(fresh) => Err(SyncError::StaleAgain(Box::new(fresh))),
            CommitClass::Adopt(response) => {
                let token = response.token.clone();
                self.adopt(response.data, response.token);
                Ok(token)
            }
        }
    }

    /// Snapshot of the local dataset. Pure; never mutates store state.
    pub fn export_snapshot(&self) -> Snapshot {
        Snapshot::from_dataset(&self.dataset)
    }

    async fn push(&mut self, expected: Option<VersionToken>) -> Result<CommitClass, SyncError> {
        let _guard =
            InFlightGuard::acquire(&self.in_flight).ok_or(SyncError::CommitInProgress)?;

        let request = CommitRequest {
            data: self.dataset.clone(),
            token: expected,
        };

        let issued = self.current_seq();
        let outcome: WriteOutcome = self
            .remote
            .put_grail(&self.address, &request)
            .await
            .map_err(|e| SyncError::Generic(e.to_string()))?;

        if issued != self.current_seq() {
            return Err(SyncError::Cancelled);
        }

        Ok(classify_commit(self.dirty, &self.dataset, outcome))
    }

    /// Fetch the parallel settings resource.
    pub async fn load_settings(&mut self) -> Result<GrailSettings, SyncError> {
        let settings = self
            .remote
            .fetch_settings(&self.address)
            .await
            .map_err(|e| SyncError::Generic(e.to_string()))?;

        self.settings = settings;
        self.dataset.mode = settings.display_mode();
        Ok(settings)
    }

    /// Switch between checkbox and counter display. Both progress fields are
    /// always stored, so switching loses no data. Does not dirty the dataset.
    pub fn set_item_count_mode(&mut self, enabled: bool) {
        self.settings.use_item_count_mode = enabled;
        self.dataset.mode = self.settings.display_mode();
    }

    /// Persist settings. Failures are reported but leave the dataset and any
    /// conflict state untouched.
    pub async fn save_settings(&mut self) -> Result<(), SyncError> {
        self.remote
            .put_settings(&self.address, &self.settings)
            .await
            .map_err(|e| SyncError::Generic(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::*;
    use crate::grail::{EditOp, GrailGroup};
    use crate::sync::remote::{FetchOutcome, WriteOutcome};
    use crate::sync::types::{CommitAccepted, ConflictBody, GrailResponse, SnapshotSide};

    #[derive(Default)]
    struct FakeState {
        grails: HashMap<String, (Dataset, VersionToken)>,
        settings: HashMap<String, GrailSettings>,
        put_calls: usize,
        fetch_calls: usize,
        fail_settings: bool,
        cancel_on_put: Option<CancelHandle>,
    }

    /// In-memory stand-in for the server.
    #[derive(Default)]
    struct FakeRemote {
        state: Mutex<FakeState>,
    }

    impl FakeRemote {
        fn seed(&self, address: &str, dataset: Dataset) -> VersionToken {
            let token = VersionToken::issue();
            self.state
                .lock()
                .unwrap()
                .grails
                .insert(address.to_string(), (dataset, token.clone()));
            token
        }

        fn network_calls(&self) -> usize {
            let state = self.state.lock().unwrap();
            state.put_calls + state.fetch_calls
        }
    }

    #[async_trait]
    impl Remote for &FakeRemote {
        async fn fetch_grail(&self, address: &str) -> Result<FetchOutcome> {
            let mut state = self.state.lock().unwrap();
            state.fetch_calls += 1;
            Ok(match state.grails.get(address) {
                Some((data, token)) => FetchOutcome::Found(GrailResponse {
                    data: data.clone(),
                    token: token.clone(),
                }),
                None => FetchOutcome::Missing,
            })
        }

        async fn put_grail(&self, address: &str, request: &CommitRequest) -> Result<WriteOutcome> {
            let mut state = self.state.lock().unwrap();
            state.put_calls += 1;
            if let Some(handle) = &state.cancel_on_put {
                handle.cancel();
            }

            let current = state.grails.get(address).cloned();
            let matches = match (&request.token, &current) {
                (None, None) => true,
                (Some(expected), Some((_, token))) => expected == token,
                _ => false,
            };

            if matches {
                let token = VersionToken::issue();
                state
                    .grails
                    .insert(address.to_string(), (request.data.clone(), token.clone()));
                Ok(WriteOutcome::Accepted(CommitAccepted { token }))
            } else {
                let (data, token) = current.expect("mismatch implies an existing grail");
                Ok(WriteOutcome::Rejected(ConflictBody {
                    server_data: data,
                    server_token: token,
                }))
            }
        }

        async fn fetch_settings(&self, address: &str) -> Result<GrailSettings> {
            let state = self.state.lock().unwrap();
            Ok(state.settings.get(address).copied().unwrap_or_default())
        }

        async fn put_settings(&self, address: &str, settings: &GrailSettings) -> Result<()> {
            let mut state = self.state.lock().unwrap();
            if state.fail_settings {
                return Err(anyhow!("settings endpoint unavailable"));
            }
            state.settings.insert(address.to_string(), *settings);
            Ok(())
        }
    }

    fn toggle(item: &str) -> EditOp {
        EditOp::ToggleFound {
            group: GrailGroup::Normal,
            item: item.to_string(),
        }
    }

    #[tokio::test]
    async fn test_load_unknown_address_names_it() {
        let remote = FakeRemote::default();
        let mut store = GrailStore::new(&remote, "unregistered");

        let err = store.load().await.unwrap_err();
        assert!(matches!(err, SyncError::NotFound { .. }));
        assert!(err.to_string().contains("'unregistered'"));
    }

    #[tokio::test]
    async fn test_edit_then_commit_creates_grail() {
        let remote = FakeRemote::default();
        let mut store = GrailStore::new(&remote, "fresh");

        store.mutate(&toggle("windforce"));
        assert!(store.is_dirty());

        let token = store.commit().await.unwrap();
        assert!(!store.is_dirty());
        assert_eq!(store.token(), Some(&token));
    }

    #[tokio::test]
    async fn test_clean_store_adopts_new_server_state() {
        let remote = FakeRemote::default();
        remote.seed("shared", Dataset::new());

        let mut store = GrailStore::new(&remote, "shared");
        store.load().await.unwrap();
        let first_token = store.token().unwrap().clone();

        // Another client advances the server.
        let mut other = Dataset::new();
        other.apply(&toggle("shako"));
        let new_token = remote.seed("shared", other.clone());

        store.load().await.unwrap();
        assert_ne!(store.token(), Some(&first_token));
        assert_eq!(store.token(), Some(&new_token));
        assert_eq!(store.dataset(), &other);
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_dirty_commit_against_advanced_server_conflicts() {
        let remote = FakeRemote::default();
        remote.seed("shared", Dataset::new());

        let mut store = GrailStore::new(&remote, "shared");
        store.load().await.unwrap();

        store.mutate(&toggle("x"));
        let server_token = remote.seed("shared", Dataset::new());

        let err = store.commit().await.unwrap_err();
        let record = match err {
            SyncError::Conflict(record) => record,
            other => panic!("expected conflict, got {:?}", other),
        };
        assert_eq!(record.server_token, server_token);
        assert!(record.local.progress(GrailGroup::Normal, "x").is_some());

        // Local edits survive until a resolution is picked.
        assert!(store.is_dirty());
    }

    #[tokio::test]
    async fn test_discard_local_adopts_server_without_network() {
        let remote = FakeRemote::default();
        remote.seed("shared", Dataset::new());

        let mut store = GrailStore::new(&remote, "shared");
        store.load().await.unwrap();
        store.mutate(&toggle("x"));
        remote.seed("shared", Dataset::new());

        let record = match store.commit().await.unwrap_err() {
            SyncError::Conflict(record) => record,
            other => panic!("expected conflict, got {:?}", other),
        };

        let calls_before = remote.network_calls();
        store.discard_local(&record);

        assert!(!store.is_dirty());
        assert_eq!(store.dataset(), &record.server);
        assert_eq!(store.token(), Some(&record.server_token));
        assert_eq!(remote.network_calls(), calls_before);

        // Local export now equals the server export taken at conflict time.
        assert_eq!(
            store.export_snapshot(),
            record.export_snapshot(SnapshotSide::Server)
        );
    }

    #[tokio::test]
    async fn test_force_overwrite_wins_with_server_token() {
        let remote = FakeRemote::default();
        remote.seed("shared", Dataset::new());

        let mut store = GrailStore::new(&remote, "shared");
        store.load().await.unwrap();
        store.mutate(&toggle("x"));
        remote.seed("shared", Dataset::new());

        let record = match store.commit().await.unwrap_err() {
            SyncError::Conflict(record) => record,
            other => panic!("expected conflict, got {:?}", other),
        };

        let local = store.dataset().clone();
        let token = store.force_overwrite(&record).await.unwrap();

        assert!(!store.is_dirty());
        assert_eq!(store.token(), Some(&token));

        // Server now holds the local dataset.
        let mut check = GrailStore::new(&remote, "shared");
        check.load().await.unwrap();
        assert_eq!(check.dataset(), &local);
    }

    #[tokio::test]
    async fn test_force_overwrite_surfaces_stale_again() {
        let remote = FakeRemote::default();
        remote.seed("shared", Dataset::new());

        let mut store = GrailStore::new(&remote, "shared");
        store.load().await.unwrap();
        store.mutate(&toggle("x"));
        remote.seed("shared", Dataset::new());

        let record = match store.commit().await.unwrap_err() {
            SyncError::Conflict(record) => record,
            other => panic!("expected conflict, got {:?}", other),
        };

        // Server advances once more before the overwrite lands.
        let third_token = remote.seed("shared", Dataset::new());

        let err = store.force_overwrite(&record).await.unwrap_err();
        match err {
            SyncError::StaleAgain(fresh) => assert_eq!(fresh.server_token, third_token),
            other => panic!("expected stale-again, got {:?}", other),
        }
        assert!(store.is_dirty());
    }

    #[tokio::test]
    async fn test_second_commit_fails_fast_while_in_flight() {
        let remote = FakeRemote::default();
        let mut store = GrailStore::new(&remote, "busy");
        store.mutate(&toggle("x"));

        // Simulate an outstanding commit holding the slot.
        let guard = InFlightGuard::acquire(&store.in_flight).unwrap();
        let err = store.commit().await.unwrap_err();
        assert!(matches!(err, SyncError::CommitInProgress));

        drop(guard);
        store.commit().await.unwrap();
    }

    #[test]
    fn test_in_flight_guard_releases_on_drop() {
        let slot = Arc::new(AtomicBool::new(false));

        let guard = InFlightGuard::acquire(&slot).unwrap();
        assert!(InFlightGuard::acquire(&slot).is_none());

        drop(guard);
        assert!(InFlightGuard::acquire(&slot).is_some());
    }

    #[tokio::test]
    async fn test_cancelled_commit_discards_response() {
        let remote = FakeRemote::default();
        let mut store = GrailStore::new(&remote, "cancel");
        remote.state.lock().unwrap().cancel_on_put = Some(store.cancel_handle());

        store.mutate(&toggle("x"));
        let err = store.commit().await.unwrap_err();

        assert!(matches!(err, SyncError::Cancelled));
        // The accepted write was discarded, not applied.
        assert!(store.is_dirty());
        assert!(store.token().is_none());
    }

    #[tokio::test]
    async fn test_settings_failure_leaves_dataset_alone() {
        let remote = FakeRemote::default();
        remote.seed("shared", Dataset::new());
        remote.state.lock().unwrap().fail_settings = true;

        let mut store = GrailStore::new(&remote, "shared");
        store.load().await.unwrap();
        store.mutate(&toggle("x"));
        let token = store.token().cloned();

        store.set_item_count_mode(true);
        let err = store.save_settings().await.unwrap_err();
        assert!(matches!(err, SyncError::Generic(_)));

        assert!(store.is_dirty());
        assert_eq!(store.token().cloned(), token);
        assert!(store.settings().use_item_count_mode);
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let remote = FakeRemote::default();
        let mut store = GrailStore::new(&remote, "prefs");

        store.set_item_count_mode(true);
        store.save_settings().await.unwrap();

        let mut fresh = GrailStore::new(&remote, "prefs");
        let settings = fresh.load_settings().await.unwrap();
        assert!(settings.use_item_count_mode);
        assert_eq!(fresh.dataset().mode, crate::grail::CountMode::Counter);
    }
}
