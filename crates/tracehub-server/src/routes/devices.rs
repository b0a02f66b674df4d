use axum::Json;
use axum::extract::{Path, State};
use serde_json::json;
use tracehub_store::queries::devices;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let rows = devices::list(&state.pool).await?;
    Ok(Json(json!({ "devices": rows })))
}

const RECENT_SESSIONS: i64 = 20;

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let device = devices::get(&state.pool, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Device not found"))?;

    let workspaces = devices::workspaces(&state.pool, &id).await?;
    let recent_sessions = devices::recent_sessions(&state.pool, &id, RECENT_SESSIONS).await?;
    let stats = devices::stats(&state.pool, &id).await?;

    Ok(Json(json!({
        "device": device,
        "workspaces": workspaces,
        "recent_sessions": recent_sessions,
        "stats": stats,
    })))
}
