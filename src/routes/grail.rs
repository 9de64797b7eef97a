//! Grail dataset API routes
//!
//! `GET` returns the dataset with its current token; `PUT` is a conditional
//! write that rejects stale tokens with a 409 carrying the server state.

use axum::{
    extract::{Path, State},
    routing::{get, put},
    Json, Router,
};

use crate::db::{GrailRepository, PutOutcome};
use crate::error::{AppError, Result};
use crate::state::AppState;
use crate::sync::{CommitAccepted, CommitRequest, ConflictBody, GrailResponse};

/// Create the grail router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/:address", get(get_grail))
        .route("/:address", put(put_grail))
}

/// Get the dataset and token for an address
async fn get_grail(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<GrailResponse>> {
    let repo = GrailRepository::new(state.db());
    let stored = repo.get(&address).await?.ok_or_else(|| {
        AppError::NotFound(format!("No Holy Grail for the address '{}' exists!", address))
    })?;

    Ok(Json(GrailResponse {
        data: stored.data,
        token: stored.token,
    }))
}

/// Conditionally replace the dataset for an address
async fn put_grail(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(request): Json<CommitRequest>,
) -> Result<Json<CommitAccepted>> {
    let repo = GrailRepository::new(state.db());

    match repo.put(&address, &request.data, request.token.as_ref()).await? {
        PutOutcome::Accepted(token) => {
            tracing::debug!(%address, %token, "grail write accepted");
            Ok(Json(CommitAccepted { token }))
        }
        PutOutcome::Stale(stored) => Err(AppError::Conflict {
            address,
            body: Box::new(ConflictBody {
                server_data: stored.data,
                server_token: stored.token,
            }),
        }),
        PutOutcome::Missing => Err(AppError::NotFound(format!(
            "No Holy Grail for the address '{}' exists!",
            address
        ))),
    }
}
