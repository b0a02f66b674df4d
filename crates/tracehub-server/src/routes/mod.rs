pub mod backfill;
pub mod devices;
pub mod health;
pub mod ingest;
pub mod prompts;
pub mod sessions;
pub mod timeline;
pub mod workspaces;
pub mod ws;

use axum::Router;
use axum::middleware as axum_middleware;
use axum::routing::{get, post};
use tracehub_types::Cursor;

use crate::auth;
use crate::error::ApiError;
use crate::middleware::log_requests;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/events/ingest", post(ingest::ingest))
        .route("/health", get(health::health))
        .route("/sessions", get(sessions::list))
        .route("/sessions/status-batch", post(sessions::status_batch))
        .route("/sessions/{id}", get(sessions::get_one).patch(sessions::patch))
        .route("/sessions/{id}/transcript", get(sessions::transcript))
        .route("/sessions/{id}/events", get(sessions::events))
        .route("/sessions/{id}/git", get(sessions::git))
        .route("/sessions/{id}/reparse", post(sessions::reparse))
        .route("/workspaces", get(workspaces::list))
        .route("/workspaces/{id}", get(workspaces::detail))
        .route("/devices", get(devices::list))
        .route("/devices/{id}", get(devices::detail))
        .route("/timeline", get(timeline::timeline))
        .route("/prompts/pending", get(prompts::pending))
        .route("/prompts/dismiss", post(prompts::dismiss))
        .route(
            "/backfill/transcripts/{session_id}",
            post(backfill::upload_transcript),
        )
        .route("/stream", get(ws::stream))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ))
        .layer(axum_middleware::from_fn(log_requests));

    Router::new().nest("/api", api).with_state(state)
}

/// Shared limit validation: 1..=250, default 50.
pub(crate) fn parse_limit(raw: Option<i64>) -> Result<i64, ApiError> {
    let limit = raw.unwrap_or(50);
    if !(1..=250).contains(&limit) {
        return Err(ApiError::invalid_request("limit must be between 1 and 250"));
    }
    Ok(limit)
}

/// Shared cursor decode: malformed cursors are a client error.
pub(crate) fn parse_cursor(raw: Option<&str>) -> Result<Option<Cursor>, ApiError> {
    raw.filter(|s| !s.is_empty())
        .map(Cursor::decode)
        .transpose()
        .map_err(|_| ApiError::invalid_request("Invalid cursor"))
}
