use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use tracehub_types::Cursor;

use crate::records::{SessionRow, SessionStatusRow};
use crate::{Error, Result};

/// Create the session row for a `session.start` event. Idempotent on the
/// caller-supplied ID; replays and duplicate deliveries are absorbed.
#[allow(clippy::too_many_arguments)]
pub async fn insert_detected<'e>(
    executor: impl PgExecutor<'e>,
    id: &str,
    workspace_id: &str,
    device_id: &str,
    cc_session_id: &str,
    cwd: Option<&str>,
    git_branch: Option<&str>,
    git_remote: Option<&str>,
    model: Option<&str>,
    started_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO sessions
            (id, workspace_id, device_id, cc_session_id, lifecycle, parse_status,
             cwd, git_branch, git_remote, model, started_at)
        VALUES ($1, $2, $3, $4, 'detected', 'pending', $5, $6, $7, $8, $9)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(id)
    .bind(workspace_id)
    .bind(device_id)
    .bind(cc_session_id)
    .bind(cwd)
    .bind(git_branch)
    .bind(git_remote)
    .bind(model)
    .bind(started_at)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get(pool: &PgPool, id: &str) -> Result<Option<SessionRow>> {
    let row = sqlx::query_as::<_, SessionRow>("SELECT * FROM sessions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

#[derive(Debug, Default)]
pub struct SessionFilter {
    pub workspace_id: Option<String>,
    pub device_id: Option<String>,
    pub lifecycle: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
}

/// Keyset-paginated session listing, newest first. Fetches `limit + 1` rows
/// so the caller can tell whether another page exists.
pub async fn list(
    pool: &PgPool,
    filter: &SessionFilter,
    cursor: Option<&Cursor>,
    limit: i64,
) -> Result<Vec<SessionRow>> {
    let mut qb = QueryBuilder::<Postgres>::new("SELECT * FROM sessions WHERE TRUE");

    if let Some(workspace_id) = &filter.workspace_id {
        qb.push(" AND workspace_id = ");
        qb.push_bind(workspace_id.clone());
    }
    if let Some(device_id) = &filter.device_id {
        qb.push(" AND device_id = ");
        qb.push_bind(device_id.clone());
    }
    if let Some(lifecycle) = &filter.lifecycle {
        qb.push(" AND lifecycle = ");
        qb.push_bind(lifecycle.clone());
    }
    if let Some(after) = filter.after {
        qb.push(" AND started_at > ");
        qb.push_bind(after);
    }
    if let Some(before) = filter.before {
        qb.push(" AND started_at < ");
        qb.push_bind(before);
    }
    if let Some(cursor) = cursor {
        qb.push(" AND (started_at, id) < (");
        qb.push_bind(cursor.u);
        qb.push(", ");
        qb.push_bind(cursor.i.clone());
        qb.push(")");
    }

    qb.push(" ORDER BY started_at DESC, id DESC LIMIT ");
    qb.push_bind(limit + 1);

    let rows = qb.build_query_as::<SessionRow>().fetch_all(pool).await?;
    Ok(rows)
}

/// Fields a PATCH may touch. Everything else on the row is owned by the
/// event handlers and the pipeline.
#[derive(Debug, Default)]
pub struct SessionPatch {
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    pub git_remote: Option<String>,
    pub model: Option<String>,
    pub summary: Option<String>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        self.cwd.is_none()
            && self.git_branch.is_none()
            && self.git_remote.is_none()
            && self.model.is_none()
            && self.summary.is_none()
    }
}

pub async fn patch(pool: &PgPool, id: &str, patch: &SessionPatch) -> Result<Option<SessionRow>> {
    if patch.is_empty() {
        return get(pool, id).await;
    }

    let mut qb = QueryBuilder::<Postgres>::new("UPDATE sessions SET updated_at = now()");
    if let Some(cwd) = &patch.cwd {
        qb.push(", cwd = ");
        qb.push_bind(cwd.clone());
    }
    if let Some(git_branch) = &patch.git_branch {
        qb.push(", git_branch = ");
        qb.push_bind(git_branch.clone());
    }
    if let Some(git_remote) = &patch.git_remote {
        qb.push(", git_remote = ");
        qb.push_bind(git_remote.clone());
    }
    if let Some(model) = &patch.model {
        qb.push(", model = ");
        qb.push_bind(model.clone());
    }
    if let Some(summary) = &patch.summary {
        qb.push(", summary = ");
        qb.push_bind(summary.clone());
    }
    qb.push(" WHERE id = ");
    qb.push_bind(id);
    qb.push(" RETURNING *");

    let row = qb
        .build_query_as::<SessionRow>()
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Batch status lookup for the backfill wait loop.
pub async fn status_batch(pool: &PgPool, ids: &[String]) -> Result<Vec<SessionStatusRow>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let rows = sqlx::query_as::<_, SessionStatusRow>(
        "SELECT id, lifecycle, parse_status FROM sessions WHERE id = ANY($1)",
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Mark a session as claimed by a pipeline worker. Best-effort: losing the
/// race here is detected later by the lifecycle CAS.
pub async fn claim_for_parsing(pool: &PgPool, id: &str) -> Result<()> {
    sqlx::query("UPDATE sessions SET parse_status = 'parsing', updated_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Resolve a caller-supplied session identifier: exact ID first, then a
/// unique ID prefix. Ambiguous prefixes surface as [`Error::Ambiguous`].
pub async fn resolve_identifier(pool: &PgPool, raw: &str) -> Result<Option<String>> {
    let exact: Option<(String,)> = sqlx::query_as("SELECT id FROM sessions WHERE id = $1")
        .bind(raw)
        .fetch_optional(pool)
        .await?;
    if let Some((id,)) = exact {
        return Ok(Some(id));
    }

    let pattern = format!("{}%", raw.replace('%', "\\%").replace('_', "\\_"));
    let matches: Vec<(String,)> =
        sqlx::query_as("SELECT id FROM sessions WHERE id LIKE $1 LIMIT 3")
            .bind(&pattern)
            .fetch_all(pool)
            .await?;

    match matches.len() {
        0 | 1 => Ok(matches.into_iter().next().map(|(id,)| id)),
        _ => Err(Error::Ambiguous {
            identifier: raw.to_string(),
            matches: matches.into_iter().map(|(id,)| id).collect(),
        }),
    }
}
