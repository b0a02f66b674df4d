use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;
use tracehub_store::queries::prompts;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PendingParams {
    pub device_id: Option<String>,
}

pub async fn pending(
    State(state): State<AppState>,
    Query(params): Query<PendingParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let device_id = params
        .device_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::invalid_request("device_id is required"))?;

    let rows = prompts::pending_for_device(&state.pool, &device_id).await?;
    let prompts: Vec<_> = rows
        .into_iter()
        .map(|row| {
            json!({
                "type": "git_hooks_install",
                "workspace_id": row.workspace_id,
                "workspace_name": row.workspace_name,
                "workspace_canonical_id": row.workspace_canonical_id,
                "device_id": row.device_id,
            })
        })
        .collect();

    Ok(Json(json!({ "prompts": prompts })))
}

#[derive(Debug, Deserialize)]
pub struct DismissBody {
    pub workspace_id: String,
    pub device_id: String,
    pub action: String,
}

pub async fn dismiss(
    State(state): State<AppState>,
    Json(body): Json<DismissBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let accepted = match body.action.as_str() {
        "accepted" => true,
        "declined" => false,
        other => {
            return Err(ApiError::invalid_request(format!(
                "action must be 'accepted' or 'declined', got '{}'",
                other
            )));
        }
    };

    let dismissed =
        prompts::dismiss(&state.pool, &body.workspace_id, &body.device_id, accepted).await?;
    if !dismissed {
        return Err(ApiError::not_found("No such workspace-device association"));
    }

    Ok(Json(json!({ "dismissed": true })))
}
