//! HTTP API routes

pub mod grail;
pub mod health;
pub mod settings;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1/grail", grail::router())
        .nest("/api/v1/settings", settings::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
