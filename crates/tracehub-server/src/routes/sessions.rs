use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use tracehub_store::queries::{events as event_queries, git as git_queries, sessions, transcripts};
use tracehub_store::reset_session_for_reparse;
use tracehub_types::{Cursor, Lifecycle, ParseStatus};

use crate::error::ApiError;
use crate::routes::{parse_cursor, parse_limit};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub workspace_id: Option<String>,
    pub lifecycle: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let limit = parse_limit(params.limit)?;
    let cursor = parse_cursor(params.cursor.as_deref())?;

    if let Some(lifecycle) = &params.lifecycle {
        Lifecycle::parse(lifecycle)
            .map_err(|_| ApiError::invalid_request(format!("unknown lifecycle '{}'", lifecycle)))?;
    }

    let filter = sessions::SessionFilter {
        workspace_id: params.workspace_id.clone(),
        lifecycle: params.lifecycle.clone(),
        ..sessions::SessionFilter::default()
    };
    let mut rows = sessions::list(&state.pool, &filter, cursor.as_ref(), limit).await?;

    let has_more = rows.len() as i64 > limit;
    if has_more {
        rows.truncate(limit as usize);
    }
    let next_cursor = if has_more {
        rows.last()
            .map(|last| Cursor::new(last.started_at, last.id.clone()).encode())
    } else {
        None
    };

    Ok(Json(json!({
        "sessions": rows,
        "next_cursor": next_cursor,
        "has_more": has_more,
    })))
}

/// Session `:id` segments accept a full ID or a unique prefix, the same
/// rules the CLI applies client-side. Ambiguous prefixes become a 400 with
/// the match list via the store error conversion.
async fn resolve_session_id(state: &AppState, raw: &str) -> Result<String, ApiError> {
    sessions::resolve_identifier(&state.pool, raw)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))
}

pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = resolve_session_id(&state, &id).await?;
    let session = sessions::get(&state.pool, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;
    Ok(Json(json!({ "session": session })))
}

pub async fn transcript(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = resolve_session_id(&state, &id).await?;
    let messages = transcripts::list_messages(&state.pool, &id).await?;
    Ok(Json(json!({ "messages": messages })))
}

pub async fn events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = resolve_session_id(&state, &id).await?;
    let events = event_queries::list_for_session(&state.pool, &id).await?;
    Ok(Json(json!({ "events": events })))
}

pub async fn git(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = resolve_session_id(&state, &id).await?;
    let activity = git_queries::list_for_session(&state.pool, &id).await?;
    Ok(Json(json!({ "git_activity": activity })))
}

#[derive(Debug, Deserialize)]
pub struct PatchBody {
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    pub git_remote: Option<String>,
    pub model: Option<String>,
    pub summary: Option<String>,
}

pub async fn patch(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PatchBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = resolve_session_id(&state, &id).await?;
    let patch = sessions::SessionPatch {
        cwd: body.cwd,
        git_branch: body.git_branch,
        git_remote: body.git_remote,
        model: body.model,
        summary: body.summary,
    };
    let session = sessions::patch(&state.pool, &id, &patch)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;
    Ok(Json(json!({ "session": session })))
}

/// Operator-triggered reparse: reset to `ended` and requeue, with the
/// precondition ladder spelled out for each refusal.
pub async fn reparse(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = resolve_session_id(&state, &id).await?;
    let session = sessions::get(&state.pool, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Session not found"))?;

    if session.lifecycle == Lifecycle::Detected.as_str()
        || session.lifecycle == Lifecycle::Capturing.as_str()
    {
        return Err(ApiError::conflict("Session has not ended yet."));
    }
    if session.transcript_s3_key.is_none() {
        return Err(ApiError::conflict("No transcript available. Cannot reparse."));
    }
    if session.parse_status == ParseStatus::Parsing.as_str() {
        return Err(ApiError::conflict(
            "Session is currently being processed. Try again later.",
        ));
    }

    let outcome = reset_session_for_reparse(&state.pool, &id).await?;
    if !outcome.reset {
        return Err(ApiError::conflict(format!(
            "Session cannot be reparsed from its current state ({})",
            session.lifecycle
        )));
    }

    state.queue.enqueue(&id);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({ "lifecycle": Lifecycle::Ended.as_str() })),
    ))
}

#[derive(Debug, Deserialize)]
pub struct StatusBatchBody {
    pub session_ids: Vec<String>,
}

pub async fn status_batch(
    State(state): State<AppState>,
    Json(body): Json<StatusBatchBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if body.session_ids.len() > 500 {
        return Err(ApiError::invalid_request("batch exceeds 500 session ids"));
    }
    let rows = sessions::status_batch(&state.pool, &body.session_ids).await?;
    Ok(Json(json!({ "sessions": rows })))
}
