use axum::Json;
use axum::extract::{Query, State};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracehub_store::queries::timeline::{self, TimelinePage, TimelineQuery};

use crate::error::ApiError;
use crate::routes::{parse_cursor, parse_limit};
use crate::state::AppState;

const GIT_ACTIVITY_TYPES: &[&str] = &["commit", "push", "checkout", "merge"];

#[derive(Debug, Deserialize)]
pub struct TimelineParams {
    pub workspace_id: Option<String>,
    pub device_id: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    /// Comma-separated git activity types.
    pub types: Option<String>,
    pub limit: Option<i64>,
    pub cursor: Option<String>,
}

pub async fn timeline(
    State(state): State<AppState>,
    Query(params): Query<TimelineParams>,
) -> Result<Json<TimelinePage>, ApiError> {
    let limit = parse_limit(params.limit)?;
    let cursor = parse_cursor(params.cursor.as_deref())?;

    let types = match &params.types {
        Some(raw) => {
            let types: Vec<String> = raw
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect();
            for t in &types {
                if !GIT_ACTIVITY_TYPES.contains(&t.as_str()) {
                    return Err(ApiError::invalid_request(format!(
                        "unknown git activity type '{}'",
                        t
                    )));
                }
            }
            if types.is_empty() { None } else { Some(types) }
        }
        None => None,
    };

    let page = timeline::assemble(
        &state.pool,
        &TimelineQuery {
            workspace_id: params.workspace_id,
            device_id: params.device_id,
            after: params.after,
            before: params.before,
            types,
            limit,
            cursor,
        },
    )
    .await?;

    Ok(Json(page))
}
