//! Timeline assembly: sessions and orphan git activity merged into one
//! time-ordered feed with keyset pagination.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracehub_types::Cursor;

use crate::Result;
use crate::queries::{git, sessions};
use crate::records::{GitActivityRow, SessionRow};

#[derive(Debug, Default)]
pub struct TimelineQuery {
    pub workspace_id: Option<String>,
    pub device_id: Option<String>,
    pub after: Option<DateTime<Utc>>,
    pub before: Option<DateTime<Utc>>,
    pub types: Option<Vec<String>>,
    pub limit: i64,
    pub cursor: Option<Cursor>,
}

/// One entry in the merged feed: either a session carrying its correlated
/// git activity, or a group of consecutive orphan git events for one
/// (workspace, device) pair.
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum TimelineItem {
    #[serde(rename = "session")]
    Session {
        #[serde(flatten)]
        session: Box<SessionRow>,
        git_activity: Vec<GitActivityRow>,
    },
    #[serde(rename = "git_activity")]
    GitActivity {
        workspace_id: String,
        workspace_name: String,
        device_id: String,
        device_name: String,
        started_at: DateTime<Utc>,
        git_activity: Vec<GitActivityRow>,
    },
}

impl TimelineItem {
    fn sort_timestamp(&self) -> DateTime<Utc> {
        match self {
            TimelineItem::Session { session, .. } => session.started_at,
            TimelineItem::GitActivity { started_at, .. } => *started_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TimelinePage {
    pub items: Vec<TimelineItem>,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// An orphan git activity row joined with display names for its workspace
/// and device.
#[derive(Debug, Clone, FromRow)]
pub struct OrphanRow {
    #[sqlx(flatten)]
    pub activity: GitActivityRow,
    pub workspace_name: String,
    pub device_name: String,
}

pub async fn assemble(pool: &PgPool, query: &TimelineQuery) -> Result<TimelinePage> {
    // 1. Page of sessions, newest first.
    let filter = sessions::SessionFilter {
        workspace_id: query.workspace_id.clone(),
        device_id: query.device_id.clone(),
        lifecycle: None,
        after: query.after,
        before: query.before,
    };
    let mut session_rows = sessions::list(pool, &filter, query.cursor.as_ref(), query.limit).await?;

    // 2. Trim the probe row and derive the cursor.
    let has_more = session_rows.len() as i64 > query.limit;
    if has_more {
        session_rows.truncate(query.limit as usize);
    }
    let next_cursor = if has_more {
        session_rows
            .last()
            .map(|last| Cursor::new(last.started_at, last.id.clone()).encode())
    } else {
        None
    };

    // 3. Correlated git activity for the returned sessions.
    let session_ids: Vec<String> = session_rows.iter().map(|s| s.id.clone()).collect();
    let correlated =
        git::list_for_sessions(pool, &session_ids, query.types.as_deref()).await?;

    // 4. Orphan git activity in the page's time window. When pagination
    // continues past this page, the window is bounded below by the oldest
    // session returned so orphans are not skipped or duplicated across pages.
    let lower = if has_more {
        session_rows.last().map(|s| s.started_at)
    } else {
        query.after
    };
    let orphans = fetch_orphans(pool, query, lower).await?;

    // 5. Merge.
    let items = merge(session_rows, correlated, group_orphans(orphans));

    Ok(TimelinePage {
        items,
        next_cursor,
        has_more,
    })
}

async fn fetch_orphans(
    pool: &PgPool,
    query: &TimelineQuery,
    lower: Option<DateTime<Utc>>,
) -> Result<Vec<OrphanRow>> {
    let mut qb = QueryBuilder::<Postgres>::new(
        r#"
        SELECT g.*, w.display_name AS workspace_name, d.name AS device_name
        FROM git_activity g
        JOIN workspaces w ON w.id = g.workspace_id
        JOIN devices d ON d.id = g.device_id
        WHERE g.session_id IS NULL
        "#,
    );

    if let Some(workspace_id) = &query.workspace_id {
        qb.push(" AND g.workspace_id = ");
        qb.push_bind(workspace_id.clone());
    }
    if let Some(device_id) = &query.device_id {
        qb.push(" AND g.device_id = ");
        qb.push_bind(device_id.clone());
    }
    if let Some(types) = &query.types {
        qb.push(" AND g.activity_type = ANY(");
        qb.push_bind(types.clone());
        qb.push(")");
    }
    if let Some(lower) = lower {
        qb.push(" AND g.activity_timestamp >= ");
        qb.push_bind(lower);
    }
    if let Some(before) = query.before {
        qb.push(" AND g.activity_timestamp < ");
        qb.push_bind(before);
    }
    // Cursor bound: orphans newer than the page window belong to earlier pages.
    if let Some(cursor) = &query.cursor {
        qb.push(" AND g.activity_timestamp < ");
        qb.push_bind(cursor.u);
    }

    qb.push(" ORDER BY g.activity_timestamp DESC, g.id DESC");

    let rows = qb.build_query_as::<OrphanRow>().fetch_all(pool).await?;
    Ok(rows)
}

/// Group consecutive orphans sharing a (workspace, device) pair. Input is
/// newest-first; each group's `started_at` is its earliest member.
fn group_orphans(rows: Vec<OrphanRow>) -> Vec<TimelineItem> {
    let mut groups: Vec<TimelineItem> = Vec::new();
    let mut current: Option<(String, String, String, String, Vec<GitActivityRow>)> = None;

    for row in rows {
        let key = (
            row.activity.workspace_id.clone(),
            row.activity.device_id.clone(),
        );
        match &mut current {
            Some((workspace_id, device_id, _, _, activities))
                if *workspace_id == key.0 && *device_id == key.1 =>
            {
                activities.push(row.activity);
            }
            _ => {
                if let Some(group) = current.take() {
                    groups.push(finish_group(group));
                }
                current = Some((
                    key.0,
                    key.1,
                    row.workspace_name,
                    row.device_name,
                    vec![row.activity],
                ));
            }
        }
    }
    if let Some(group) = current.take() {
        groups.push(finish_group(group));
    }

    groups
}

fn finish_group(
    (workspace_id, device_id, workspace_name, device_name, activities): (
        String,
        String,
        String,
        String,
        Vec<GitActivityRow>,
    ),
) -> TimelineItem {
    // Rows arrive newest-first, so the group's start is its last member.
    let started_at = activities
        .last()
        .map(|a| a.activity_timestamp)
        .unwrap_or_else(Utc::now);
    TimelineItem::GitActivity {
        workspace_id,
        workspace_name,
        device_id,
        device_name,
        started_at,
        git_activity: activities,
    }
}

/// Merge session items and orphan groups, both newest-first, into one
/// descending feed.
fn merge(
    session_rows: Vec<SessionRow>,
    correlated: Vec<GitActivityRow>,
    orphan_groups: Vec<TimelineItem>,
) -> Vec<TimelineItem> {
    let mut items: Vec<TimelineItem> = session_rows
        .into_iter()
        .map(|session| {
            let git_activity: Vec<GitActivityRow> = correlated
                .iter()
                .filter(|g| g.session_id.as_deref() == Some(session.id.as_str()))
                .cloned()
                .collect();
            TimelineItem::Session {
                session: Box::new(session),
                git_activity,
            }
        })
        .collect();

    items.extend(orphan_groups);
    items.sort_by(|a, b| b.sort_timestamp().cmp(&a.sort_timestamp()));
    items
}
