use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};

use crate::Result;
use crate::records::GitActivityRow;

/// The correlator: most recent live session for a (workspace, device) pair
/// that had already started when the git event happened. Evaluated only at
/// handler time; orphans are never retroactively linked.
pub async fn correlate_session<'e>(
    executor: impl PgExecutor<'e>,
    workspace_id: &str,
    device_id: &str,
    timestamp: DateTime<Utc>,
) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as(
        r#"
        SELECT id FROM sessions
        WHERE workspace_id = $1
          AND device_id = $2
          AND lifecycle IN ('detected', 'capturing')
          AND started_at <= $3
        ORDER BY started_at DESC
        LIMIT 1
        "#,
    )
    .bind(workspace_id)
    .bind(device_id)
    .bind(timestamp)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|(id,)| id))
}

/// One normalized git activity row, keyed by the originating event ID.
#[derive(Debug, Clone)]
pub struct NewGitActivity {
    pub id: String,
    pub workspace_id: String,
    pub device_id: String,
    pub session_id: Option<String>,
    pub activity_type: String,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub message: Option<String>,
    pub files_changed: Option<i32>,
    pub insertions: Option<i32>,
    pub deletions: Option<i32>,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

/// Insert a git activity row. The primary key is the event ID, so replays
/// leave the row count unchanged.
pub async fn insert_activity<'e>(
    executor: impl PgExecutor<'e>,
    activity: &NewGitActivity,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO git_activity
            (id, workspace_id, device_id, session_id, activity_type, branch,
             commit_sha, message, files_changed, insertions, deletions,
             activity_timestamp, data)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(&activity.id)
    .bind(&activity.workspace_id)
    .bind(&activity.device_id)
    .bind(&activity.session_id)
    .bind(&activity.activity_type)
    .bind(&activity.branch)
    .bind(&activity.commit_sha)
    .bind(&activity.message)
    .bind(activity.files_changed)
    .bind(activity.insertions)
    .bind(activity.deletions)
    .bind(activity.timestamp)
    .bind(&activity.data)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn list_for_session(pool: &PgPool, session_id: &str) -> Result<Vec<GitActivityRow>> {
    let rows = sqlx::query_as::<_, GitActivityRow>(
        "SELECT * FROM git_activity WHERE session_id = $1 ORDER BY activity_timestamp ASC, id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Activity for a set of sessions, optionally narrowed to certain types.
/// Used by the timeline assembler.
pub async fn list_for_sessions(
    pool: &PgPool,
    session_ids: &[String],
    types: Option<&[String]>,
) -> Result<Vec<GitActivityRow>> {
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = match types {
        Some(types) => {
            sqlx::query_as::<_, GitActivityRow>(
                r#"
                SELECT * FROM git_activity
                WHERE session_id = ANY($1) AND activity_type = ANY($2)
                ORDER BY activity_timestamp DESC, id DESC
                "#,
            )
            .bind(session_ids)
            .bind(types)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, GitActivityRow>(
                r#"
                SELECT * FROM git_activity
                WHERE session_id = ANY($1)
                ORDER BY activity_timestamp DESC, id DESC
                "#,
            )
            .bind(session_ids)
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}
