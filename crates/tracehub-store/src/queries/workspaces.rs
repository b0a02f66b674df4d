use serde::Serialize;
use sqlx::{FromRow, PgPool};
use tracehub_types::{Cursor, is_ulid};

use crate::Result;
use crate::records::{DeviceRow, GitSummary, SessionRow, WorkspaceListRow, WorkspaceRow, WorkspaceStats};

/// Keyset-paginated workspace listing with per-workspace session aggregates.
/// Sorted by most recent session activity (first sighting for workspaces
/// that have none yet), newest first. Fetches `limit + 1` rows.
pub async fn list(
    pool: &PgPool,
    cursor: Option<&Cursor>,
    limit: i64,
) -> Result<Vec<WorkspaceListRow>> {
    let rows = sqlx::query_as::<_, WorkspaceListRow>(
        r#"
        WITH session_stats AS (
            SELECT workspace_id,
                   COUNT(*) AS session_count,
                   COUNT(*) FILTER (WHERE lifecycle IN ('detected', 'capturing')) AS active_session_count,
                   COUNT(DISTINCT device_id) AS device_count,
                   COALESCE(SUM(cost_estimate_usd), 0)::float8 AS total_cost_usd,
                   COALESCE(SUM(duration_ms), 0)::bigint AS total_duration_ms,
                   MAX(started_at) AS last_session_at
            FROM sessions
            GROUP BY workspace_id
        )
        SELECT w.id, w.canonical_id, w.display_name, w.default_branch, w.first_seen_at,
               COALESCE(s.session_count, 0) AS session_count,
               COALESCE(s.active_session_count, 0) AS active_session_count,
               COALESCE(s.device_count, 0) AS device_count,
               COALESCE(s.total_cost_usd, 0)::float8 AS total_cost_usd,
               COALESCE(s.total_duration_ms, 0)::bigint AS total_duration_ms,
               s.last_session_at,
               COALESCE(s.last_session_at, w.first_seen_at) AS sort_key
        FROM workspaces w
        LEFT JOIN session_stats s ON s.workspace_id = w.id
        WHERE ($1::timestamptz IS NULL OR (COALESCE(s.last_session_at, w.first_seen_at), w.id) < ($1, $2))
        ORDER BY sort_key DESC, w.id DESC
        LIMIT $3
        "#,
    )
    .bind(cursor.map(|c| c.u))
    .bind(cursor.map(|c| c.i.clone()).unwrap_or_default())
    .bind(limit + 1)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Outcome of resolving a caller-supplied workspace identifier (internal
/// ULID, case-insensitive display name, canonical ID, or a unique prefix of
/// either name).
#[derive(Debug)]
pub enum WorkspaceMatch {
    None,
    One(WorkspaceRow),
    Many(Vec<WorkspaceRow>),
}

pub async fn resolve_selector(pool: &PgPool, raw: &str) -> Result<WorkspaceMatch> {
    if is_ulid(raw) {
        let row = sqlx::query_as::<_, WorkspaceRow>("SELECT * FROM workspaces WHERE id = $1")
            .bind(raw)
            .fetch_optional(pool)
            .await?;
        return Ok(match row {
            Some(row) => WorkspaceMatch::One(row),
            None => WorkspaceMatch::None,
        });
    }

    // Exact name or canonical match. Display names are compared
    // case-insensitively; canonical IDs are case-sensitive by contract.
    let exact = sqlx::query_as::<_, WorkspaceRow>(
        r#"
        SELECT * FROM workspaces
        WHERE LOWER(display_name) = LOWER($1) OR canonical_id = $1
        ORDER BY id
        LIMIT 5
        "#,
    )
    .bind(raw)
    .fetch_all(pool)
    .await?;

    if exact.len() > 1 {
        return Ok(WorkspaceMatch::Many(exact));
    }
    if let Some(row) = exact.into_iter().next() {
        return Ok(WorkspaceMatch::One(row));
    }

    let pattern = format!("{}%", raw.replace('%', "\\%").replace('_', "\\_"));
    let prefixed = sqlx::query_as::<_, WorkspaceRow>(
        r#"
        SELECT * FROM workspaces
        WHERE LOWER(display_name) LIKE LOWER($1) OR canonical_id LIKE $1
        ORDER BY id
        LIMIT 5
        "#,
    )
    .bind(&pattern)
    .fetch_all(pool)
    .await?;

    if prefixed.len() > 1 {
        return Ok(WorkspaceMatch::Many(prefixed));
    }
    Ok(match prefixed.into_iter().next() {
        Some(row) => WorkspaceMatch::One(row),
        None => WorkspaceMatch::None,
    })
}

/// A session row joined with the device that ran it, for detail views.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionWithDevice {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub session: SessionRow,
    pub device_name: String,
    pub device_type: String,
}

pub async fn recent_sessions(
    pool: &PgPool,
    workspace_id: &str,
    limit: i64,
) -> Result<Vec<SessionWithDevice>> {
    let rows = sqlx::query_as::<_, SessionWithDevice>(
        r#"
        SELECT s.*, d.name AS device_name, d.device_type AS device_type
        FROM sessions s
        JOIN devices d ON d.id = s.device_id
        WHERE s.workspace_id = $1
        ORDER BY s.started_at DESC, s.id DESC
        LIMIT $2
        "#,
    )
    .bind(workspace_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// A device row joined with its association to one workspace.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssociatedDevice {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub device: DeviceRow,
    pub local_path: Option<String>,
    pub git_hooks_installed: bool,
    pub last_active_at: chrono::DateTime<chrono::Utc>,
}

pub async fn associated_devices(pool: &PgPool, workspace_id: &str) -> Result<Vec<AssociatedDevice>> {
    let rows = sqlx::query_as::<_, AssociatedDevice>(
        r#"
        SELECT d.*, wd.local_path, wd.git_hooks_installed, wd.last_active_at
        FROM workspace_devices wd
        JOIN devices d ON d.id = wd.device_id
        WHERE wd.workspace_id = $1
        ORDER BY wd.last_active_at DESC
        "#,
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn git_summary(pool: &PgPool, workspace_id: &str) -> Result<GitSummary> {
    let (total_commits, total_pushes, last_commit_at): (i64, i64, Option<chrono::DateTime<chrono::Utc>>) =
        sqlx::query_as(
            r#"
            SELECT COUNT(*) FILTER (WHERE activity_type = 'commit'),
                   COUNT(*) FILTER (WHERE activity_type = 'push'),
                   MAX(activity_timestamp) FILTER (WHERE activity_type = 'commit')
            FROM git_activity
            WHERE workspace_id = $1
            "#,
        )
        .bind(workspace_id)
        .fetch_one(pool)
        .await?;

    let branches: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT branch FROM git_activity
        WHERE workspace_id = $1 AND branch IS NOT NULL
        ORDER BY branch
        LIMIT 50
        "#,
    )
    .bind(workspace_id)
    .fetch_all(pool)
    .await?;

    Ok(GitSummary {
        total_commits,
        total_pushes,
        active_branches: branches.into_iter().map(|(b,)| b).collect(),
        last_commit_at,
    })
}

pub async fn stats(pool: &PgPool, workspace_id: &str) -> Result<WorkspaceStats> {
    let stats = sqlx::query_as::<_, WorkspaceStats>(
        r#"
        SELECT COUNT(*) AS session_count,
               COUNT(*) FILTER (WHERE lifecycle IN ('detected', 'capturing')) AS active_session_count,
               COALESCE(SUM(cost_estimate_usd), 0)::float8 AS total_cost_usd,
               COALESCE(SUM(duration_ms), 0)::bigint AS total_duration_ms,
               COALESCE(SUM(tokens_in), 0)::bigint AS total_tokens_in,
               COALESCE(SUM(tokens_out), 0)::bigint AS total_tokens_out,
               COALESCE(SUM(total_messages), 0)::bigint AS total_messages
        FROM sessions
        WHERE workspace_id = $1
        "#,
    )
    .bind(workspace_id)
    .fetch_one(pool)
    .await?;
    Ok(stats)
}
