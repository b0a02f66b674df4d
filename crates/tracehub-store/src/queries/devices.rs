use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::Result;
use crate::records::{DeviceRow, DeviceSummaryRow, WorkspaceRow, WorkspaceStats};
use crate::queries::workspaces::SessionWithDevice;

/// All devices with their cross-workspace session aggregates, most recently
/// seen first.
pub async fn list(pool: &PgPool) -> Result<Vec<DeviceSummaryRow>> {
    let rows = sqlx::query_as::<_, DeviceSummaryRow>(
        r#"
        WITH session_stats AS (
            SELECT device_id,
                   COUNT(*) AS session_count,
                   COUNT(DISTINCT workspace_id) AS workspace_count,
                   COUNT(*) FILTER (WHERE lifecycle IN ('detected', 'capturing')) AS active_session_count,
                   MAX(started_at) AS last_session_at,
                   COALESCE(SUM(cost_estimate_usd), 0)::float8 AS total_cost_usd,
                   COALESCE(SUM(duration_ms), 0)::bigint AS total_duration_ms
            FROM sessions
            GROUP BY device_id
        )
        SELECT d.id, d.name, d.device_type, d.hostname, d.os, d.arch,
               d.first_seen_at, d.last_seen_at,
               COALESCE(s.session_count, 0) AS session_count,
               COALESCE(s.workspace_count, 0) AS workspace_count,
               COALESCE(s.active_session_count, 0) AS active_session_count,
               s.last_session_at,
               COALESCE(s.total_cost_usd, 0)::float8 AS total_cost_usd,
               COALESCE(s.total_duration_ms, 0)::bigint AS total_duration_ms
        FROM devices d
        LEFT JOIN session_stats s ON s.device_id = d.id
        ORDER BY d.last_seen_at DESC, d.id
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: &str) -> Result<Option<DeviceRow>> {
    let row = sqlx::query_as::<_, DeviceRow>("SELECT * FROM devices WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// A workspace this device has worked in, with the association's local path.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceWorkspace {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub workspace: WorkspaceRow,
    pub local_path: Option<String>,
    pub git_hooks_installed: bool,
    pub last_active_at: chrono::DateTime<chrono::Utc>,
}

pub async fn workspaces(pool: &PgPool, device_id: &str) -> Result<Vec<DeviceWorkspace>> {
    let rows = sqlx::query_as::<_, DeviceWorkspace>(
        r#"
        SELECT w.*, wd.local_path, wd.git_hooks_installed, wd.last_active_at
        FROM workspace_devices wd
        JOIN workspaces w ON w.id = wd.workspace_id
        WHERE wd.device_id = $1
        ORDER BY wd.last_active_at DESC
        "#,
    )
    .bind(device_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn recent_sessions(
    pool: &PgPool,
    device_id: &str,
    limit: i64,
) -> Result<Vec<SessionWithDevice>> {
    let rows = sqlx::query_as::<_, SessionWithDevice>(
        r#"
        SELECT s.*, d.name AS device_name, d.device_type AS device_type
        FROM sessions s
        JOIN devices d ON d.id = s.device_id
        WHERE s.device_id = $1
        ORDER BY s.started_at DESC, s.id DESC
        LIMIT $2
        "#,
    )
    .bind(device_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn stats(pool: &PgPool, device_id: &str) -> Result<WorkspaceStats> {
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
        WHERE device_id = $1
        "#,
    )
    .bind(device_id)
    .fetch_one(pool)
    .await?;
    Ok(stats)
}
