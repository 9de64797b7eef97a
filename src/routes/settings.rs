//! Settings API routes
//!
//! A parallel resource with its own save action; settings failures never
//! affect dataset sync state.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::db::SettingsRepository;
use crate::error::Result;
use crate::state::AppState;
use crate::sync::GrailSettings;

/// Create the settings router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:address", get(get_settings))
        .route("/:address", put(put_settings))
}

/// Get settings for an address; defaults when never saved
async fn get_settings(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<GrailSettings>> {
    let repo = SettingsRepository::new(state.db());
    Ok(Json(repo.get(&address).await?))
}

/// Save settings for an address
async fn put_settings(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(settings): Json<GrailSettings>,
) -> Result<StatusCode> {
    let repo = SettingsRepository::new(state.db());
    repo.upsert(&address, &settings).await?;
    Ok(StatusCode::OK)
}
