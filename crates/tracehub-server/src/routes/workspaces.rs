use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;
use tracehub_store::queries::workspaces::{self, WorkspaceMatch};
use tracehub_types::Cursor;

use crate::error::ApiError;
use crate::routes::{parse_cursor, parse_limit};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = parse_limit(params.limit)?;
    let cursor = parse_cursor(params.cursor.as_deref())?;

    let mut rows = workspaces::list(&state.pool, cursor.as_ref(), limit).await?;
    let has_more = rows.len() as i64 > limit;
    if has_more {
        rows.truncate(limit as usize);
    }
    let next_cursor = if has_more {
        rows.last()
            .map(|last| Cursor::new(last.sort_key, last.id.clone()).encode())
    } else {
        None
    };

    Ok(Json(json!({
        "workspaces": rows,
        "next_cursor": next_cursor,
        "has_more": has_more,
    })))
}

const RECENT_SESSIONS: i64 = 20;

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let workspace = match workspaces::resolve_selector(&state.pool, &id).await? {
        WorkspaceMatch::One(workspace) => workspace,
        WorkspaceMatch::None => return Err(ApiError::not_found("Workspace not found")),
        WorkspaceMatch::Many(matches) => {
            let matches: Vec<_> = matches
                .iter()
                .map(|w| {
                    json!({
                        "id": w.id,
                        "display_name": w.display_name,
                        "canonical_id": w.canonical_id,
                    })
                })
                .collect();
            return Err(ApiError::invalid_request("Ambiguous workspace name")
                .with_details(json!({ "matches": matches })));
        }
    };

    let recent_sessions =
        workspaces::recent_sessions(&state.pool, &workspace.id, RECENT_SESSIONS).await?;
    let devices = workspaces::associated_devices(&state.pool, &workspace.id).await?;
    let git_summary = workspaces::git_summary(&state.pool, &workspace.id).await?;
    let stats = workspaces::stats(&state.pool, &workspace.id).await?;

    Ok(Json(json!({
        "workspace": workspace,
        "recent_sessions": recent_sessions,
        "devices": devices,
        "git_summary": git_summary,
        "stats": stats,
    })))
}
