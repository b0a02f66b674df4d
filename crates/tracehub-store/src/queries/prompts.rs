use serde::Serialize;
use sqlx::{FromRow, PgPool};

use crate::Result;

/// One actionable git-hooks install prompt for a device.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PendingPrompt {
    pub workspace_id: String,
    pub workspace_name: String,
    pub workspace_canonical_id: String,
    pub device_id: String,
}

/// Pairs still awaiting a first git-hooks decision on this device. Installed
/// or already-prompted pairs never reappear here.
pub async fn pending_for_device(pool: &PgPool, device_id: &str) -> Result<Vec<PendingPrompt>> {
    let rows = sqlx::query_as::<_, PendingPrompt>(
        r#"
        SELECT wd.workspace_id,
               w.display_name AS workspace_name,
               w.canonical_id AS workspace_canonical_id,
               wd.device_id
        FROM workspace_devices wd
        JOIN workspaces w ON w.id = wd.workspace_id
        WHERE wd.device_id = $1
          AND wd.pending_git_hooks_prompt
          AND NOT wd.git_hooks_installed
          AND NOT wd.git_hooks_prompted
        ORDER BY wd.last_active_at DESC
        "#,
    )
    .bind(device_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Record the user's decision. Clears the pending flag, marks the pair as
/// prompted, and on acceptance marks hooks installed. Returns whether a row
/// was updated.
pub async fn dismiss(
    pool: &PgPool,
    workspace_id: &str,
    device_id: &str,
    accepted: bool,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE workspace_devices SET
            pending_git_hooks_prompt = FALSE,
            git_hooks_prompted = TRUE,
            git_hooks_installed = git_hooks_installed OR $3
        WHERE workspace_id = $1 AND device_id = $2
        "#,
    )
    .bind(workspace_id)
    .bind(device_id)
    .bind(accepted)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}
