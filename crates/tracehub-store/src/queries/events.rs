use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use tracehub_types::{EventEnvelope, EventKind};

use crate::Result;
use crate::records::EventRow;

/// Pre-insert a validated batch with `ON CONFLICT DO NOTHING`. The returned
/// set holds the IDs that were newly accepted; everything else in the batch
/// was a duplicate.
///
/// Session events carry their session ID from the payload immediately; git
/// events get theirs back-filled by the correlator when a session matches.
pub async fn insert_batch(pool: &PgPool, events: &[EventEnvelope]) -> Result<Vec<String>> {
    if events.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Postgres>::new(
        "INSERT INTO events (id, event_type, event_timestamp, device_id, session_id, data) ",
    );
    qb.push_values(events, |mut b, event| {
        b.push_bind(event.id.clone())
            .push_bind(event.kind.as_str())
            .push_bind(event.timestamp)
            .push_bind(event.device_id.clone())
            .push_bind(session_id_of(event))
            .push_bind(event.data.clone());
    });
    qb.push(" ON CONFLICT (id) DO NOTHING RETURNING id");

    let accepted: Vec<(String,)> = qb.build_query_as().fetch_all(pool).await?;
    Ok(accepted.into_iter().map(|(id,)| id).collect())
}

/// Stamp the resolved workspace onto an event row once the consumer has run
/// identity resolution.
pub async fn set_workspace<'e>(
    executor: impl PgExecutor<'e>,
    event_id: &str,
    workspace_id: &str,
) -> Result<()> {
    sqlx::query("UPDATE events SET workspace_id = $2 WHERE id = $1")
        .bind(event_id)
        .bind(workspace_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// Back-fill `session_id` for an orphan event the correlator matched.
pub async fn set_session<'e>(
    executor: impl PgExecutor<'e>,
    event_id: &str,
    session_id: &str,
) -> Result<()> {
    sqlx::query("UPDATE events SET session_id = $2 WHERE id = $1")
        .bind(event_id)
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn list_for_session(pool: &PgPool, session_id: &str) -> Result<Vec<EventRow>> {
    let rows = sqlx::query_as::<_, EventRow>(
        "SELECT * FROM events WHERE session_id = $1 ORDER BY event_timestamp ASC, id ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn session_id_of(event: &EventEnvelope) -> Option<String> {
    if let Some(session_id) = &event.session_id {
        return Some(session_id.clone());
    }
    match event.kind {
        EventKind::SessionStart | EventKind::SessionEnd => event
            .data
            .get("cc_session_id")
            .and_then(|v| v.as_str())
            .map(str::to_owned),
        _ => None,
    }
}
