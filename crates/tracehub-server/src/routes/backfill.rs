use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

// Transcripts above this size should not ride through the API body.
const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub canonical_id: Option<String>,
}

/// Companion endpoint for the backfill CLI: store a raw transcript under the
/// canonical blob key so a synthesized `session.end` can point at it.
pub async fn upload_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let canonical_id = params
        .canonical_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::invalid_request("canonical_id is required"))?;

    if body.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::invalid_request("transcript exceeds upload limit"));
    }

    let s3_key = format!("transcripts/{}/{}/raw.jsonl", canonical_id, session_id);
    state
        .blobs
        .put(&s3_key, body.to_vec())
        .await
        .map_err(|e| {
            tracing::error!(key = %s3_key, error = %e, "transcript upload failed");
            ApiError::internal("transcript upload failed")
        })?;

    Ok(Json(json!({ "s3_key": s3_key })))
}
