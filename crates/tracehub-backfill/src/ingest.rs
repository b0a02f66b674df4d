use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde_json::{Value, json};
use tracehub_types::{EventEnvelope, EventKind, WorkspaceRef};
use tracing::debug;

use crate::client::ApiClient;
use crate::scan::DiscoveredSession;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub device_id: String,
    pub concurrency: usize,
    pub throttle_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct Progress {
    pub total: usize,
    pub completed: usize,
}

#[derive(Debug, Default)]
pub struct IngestOutcome {
    /// Sessions newly accepted by the server.
    pub ingested: Vec<String>,
    /// Sessions the server already knew (both events were duplicates).
    pub skipped: usize,
    pub failed: Vec<(String, String)>,
}

/// Replay discovered transcripts through the live ingest path: upload the
/// raw body, then post a synthesized `session.start`/`session.end` pair
/// whose transcript key points at the upload. Event IDs are deterministic,
/// so re-running a backfill is a server-side no-op.
pub async fn ingest_backfill_sessions(
    client: &ApiClient,
    discovered: Vec<DiscoveredSession>,
    options: &IngestOptions,
    on_progress: &(dyn Fn(Progress) + Sync),
) -> IngestOutcome {
    let total = discovered.len();
    let mut outcome = IngestOutcome::default();
    let mut completed = 0;

    let mut results = futures::stream::iter(discovered.into_iter().map(|session| async move {
        let result = backfill_one(client, options, &session).await;
        (session.session_id.clone(), result)
    }))
    .buffer_unordered(options.concurrency.max(1));

    while let Some((session_id, result)) = results.next().await {
        completed += 1;
        on_progress(Progress { total, completed });

        match result {
            Ok(newly_ingested) => {
                if newly_ingested {
                    outcome.ingested.push(session_id);
                } else {
                    outcome.skipped += 1;
                }
            }
            Err(e) => outcome.failed.push((session_id, e.to_string())),
        }

        if options.throttle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(options.throttle_ms)).await;
        }
    }

    outcome
}

async fn backfill_one(
    client: &ApiClient,
    options: &IngestOptions,
    session: &DiscoveredSession,
) -> anyhow::Result<bool> {
    let body = tokio::fs::read(&session.transcript_path).await?;
    let s3_key = client
        .upload_transcript(&session.session_id, &session.project_key, body)
        .await?;

    let ended_at: DateTime<Utc> = session.modified_at.into();
    let events = build_session_events(session, &options.device_id, &s3_key, ended_at);
    let response = client.ingest_events(events).await?;

    debug!(
        session_id = %session.session_id,
        ingested = response.ingested,
        duplicates = response.duplicates,
        "backfill events posted"
    );

    // Both events already known means the server has seen this session.
    Ok(response.ingested > 0)
}

/// The synthesized event pair for one historical session. Deterministic IDs
/// make the whole operation idempotent against the event table.
pub fn build_session_events(
    session: &DiscoveredSession,
    device_id: &str,
    s3_key: &str,
    ended_at: DateTime<Utc>,
) -> Vec<Value> {
    let workspace = WorkspaceRef {
        canonical_id: session.project_key.clone(),
        display_name: None,
        default_branch: None,
    };

    let start = EventEnvelope {
        id: format!("bf-{}-start", session.session_id),
        kind: EventKind::SessionStart,
        timestamp: ended_at,
        device_id: device_id.to_string(),
        workspace: workspace.clone(),
        device: None,
        session_id: None,
        data: json!({
            "cc_session_id": session.session_id,
            "source": "backfill",
            "transcript_path": session.transcript_path.to_string_lossy(),
        }),
    };
    let end = EventEnvelope {
        id: format!("bf-{}-end", session.session_id),
        kind: EventKind::SessionEnd,
        timestamp: ended_at,
        device_id: device_id.to_string(),
        workspace,
        device: None,
        session_id: None,
        data: json!({
            "cc_session_id": session.session_id,
            "end_reason": "backfill",
            "transcript_path": s3_key,
        }),
    };

    [start, end]
        .into_iter()
        .filter_map(|envelope| serde_json::to_value(envelope).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::SystemTime;

    fn session() -> DiscoveredSession {
        DiscoveredSession {
            session_id: "cc-hist-1".to_string(),
            project_key: "-home-dev-widgets".to_string(),
            transcript_path: PathBuf::from("/tmp/cc-hist-1.jsonl"),
            file_size_bytes: 42,
            modified_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn test_build_session_events_shape() {
        let ended = Utc::now();
        let events = build_session_events(&session(), "dev-9", "transcripts/p/cc-hist-1/raw.jsonl", ended);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["type"], "session.start");
        assert_eq!(events[0]["id"], "bf-cc-hist-1-start");
        assert_eq!(events[0]["data"]["cc_session_id"], "cc-hist-1");
        assert_eq!(events[1]["type"], "session.end");
        assert_eq!(events[1]["id"], "bf-cc-hist-1-end");
        // session.end points at the uploaded object, not the local path.
        assert_eq!(
            events[1]["data"]["transcript_path"],
            "transcripts/p/cc-hist-1/raw.jsonl"
        );
        assert_eq!(events[0]["workspace"]["canonical_id"], "-home-dev-widgets");
    }

    #[test]
    fn test_event_ids_are_deterministic() {
        let ended = Utc::now();
        let a = build_session_events(&session(), "dev-9", "k", ended);
        let b = build_session_events(&session(), "dev-9", "k", ended);
        assert_eq!(a[0]["id"], b[0]["id"]);
        assert_eq!(a[1]["id"], b[1]["id"]);
    }
}
