use sqlx::{PgExecutor, PgPool};
use tracehub_types::{DeviceHints, new_workspace_id};

use crate::Result;

/// Resolve a canonical workspace identifier to the internal workspace ID,
/// creating the row on first sight. Hints (display name, default branch) are
/// applied only on insert; later events never rewrite them.
pub async fn resolve_or_create_workspace(
    pool: &PgPool,
    canonical_id: &str,
    display_name: Option<&str>,
    default_branch: Option<&str>,
) -> Result<String> {
    let display_name = match display_name {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => default_display_name(canonical_id),
    };
    let default_branch = default_branch.unwrap_or("main");

    // DO UPDATE instead of DO NOTHING so RETURNING yields the id on the
    // conflict path as well.
    let (id,): (String,) = sqlx::query_as(
        r#"
        INSERT INTO workspaces (id, canonical_id, display_name, default_branch)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (canonical_id) DO UPDATE SET updated_at = now()
        RETURNING id
        "#,
    )
    .bind(new_workspace_id())
    .bind(canonical_id)
    .bind(&display_name)
    .bind(default_branch)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Upsert a device row. Hints fill columns only on insert; `last_seen_at` is
/// refreshed on every call.
pub async fn resolve_or_create_device(
    pool: &PgPool,
    device_id: &str,
    hints: Option<&DeviceHints>,
) -> Result<String> {
    let empty = DeviceHints::default();
    let hints = hints.unwrap_or(&empty);

    let name = match hints.name.as_deref() {
        Some(name) if !name.is_empty() => name,
        _ => "unknown-device",
    };
    let device_type = hints.device_type.as_deref().unwrap_or("local");

    sqlx::query(
        r#"
        INSERT INTO devices (id, name, device_type, hostname, os, arch)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET last_seen_at = now()
        "#,
    )
    .bind(device_id)
    .bind(name)
    .bind(device_type)
    .bind(hints.hostname.as_deref())
    .bind(hints.os.as_deref())
    .bind(hints.arch.as_deref())
    .execute(pool)
    .await?;

    Ok(device_id.to_string())
}

/// Upsert the workspace-device junction, refreshing `last_active_at`.
///
/// The pending git-hooks prompt is raised only while the pair has neither
/// been prompted nor had hooks installed; once either flag is set it is
/// never re-raised.
pub async fn ensure_workspace_device_link<'e>(
    executor: impl PgExecutor<'e>,
    workspace_id: &str,
    device_id: &str,
    local_path: Option<&str>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO workspace_devices (workspace_id, device_id, local_path, pending_git_hooks_prompt)
        VALUES ($1, $2, $3, TRUE)
        ON CONFLICT (workspace_id, device_id) DO UPDATE SET
            last_active_at = now(),
            local_path = COALESCE(EXCLUDED.local_path, workspace_devices.local_path),
            pending_git_hooks_prompt = CASE
                WHEN workspace_devices.git_hooks_installed OR workspace_devices.git_hooks_prompted
                    THEN workspace_devices.pending_git_hooks_prompt
                ELSE TRUE
            END
        "#,
    )
    .bind(workspace_id)
    .bind(device_id)
    .bind(local_path)
    .execute(executor)
    .await?;

    Ok(())
}

/// Display name fallback: the last path segment of the canonical ID.
fn default_display_name(canonical_id: &str) -> String {
    canonical_id
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(canonical_id)
        .trim_end_matches(".git")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_display_name_from_remote_url() {
        assert_eq!(default_display_name("github.com/acme/widgets"), "widgets");
        assert_eq!(
            default_display_name("https://github.com/acme/widgets.git"),
            "widgets"
        );
        assert_eq!(default_display_name("github.com/acme/widgets/"), "widgets");
    }

    #[test]
    fn test_default_display_name_from_opaque_hash() {
        assert_eq!(default_display_name("a1b2c3d4"), "a1b2c3d4");
    }
}
