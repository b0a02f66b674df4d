use chrono::{DateTime, Utc};
use serde_json::{Value, json};
use tracehub_types::{DeviceHints, EventEnvelope, EventKind, WorkspaceRef};

/// Builds event envelopes with sensible defaults for handler and ingest tests.
#[derive(Debug, Clone)]
pub struct EventFixture {
    pub canonical_id: String,
    pub device_id: String,
}

impl Default for EventFixture {
    fn default() -> Self {
        Self {
            canonical_id: "github.com/acme/widgets".to_string(),
            device_id: "dev-test-1".to_string(),
        }
    }
}

impl EventFixture {
    pub fn new(canonical_id: &str, device_id: &str) -> Self {
        Self {
            canonical_id: canonical_id.to_string(),
            device_id: device_id.to_string(),
        }
    }

    pub fn envelope(
        &self,
        id: &str,
        kind: EventKind,
        timestamp: DateTime<Utc>,
        data: Value,
    ) -> EventEnvelope {
        EventEnvelope {
            id: id.to_string(),
            kind,
            timestamp,
            device_id: self.device_id.clone(),
            workspace: WorkspaceRef {
                canonical_id: self.canonical_id.clone(),
                display_name: None,
                default_branch: None,
            },
            device: Some(DeviceHints {
                name: Some("test-laptop".to_string()),
                device_type: Some("local".to_string()),
                hostname: Some("testhost".to_string()),
                os: Some("linux".to_string()),
                arch: Some("x86_64".to_string()),
            }),
            session_id: None,
            data,
        }
    }

    pub fn session_start(&self, id: &str, cc_session_id: &str, timestamp: DateTime<Utc>) -> EventEnvelope {
        self.envelope(
            id,
            EventKind::SessionStart,
            timestamp,
            json!({
                "cc_session_id": cc_session_id,
                "cwd": "/home/dev/widgets",
                "git_branch": "main",
                "git_remote": format!("https://{}", self.canonical_id),
                "model": "claude-sonnet-4",
            }),
        )
    }

    pub fn session_end(
        &self,
        id: &str,
        cc_session_id: &str,
        timestamp: DateTime<Utc>,
        transcript_path: Option<&str>,
    ) -> EventEnvelope {
        self.envelope(
            id,
            EventKind::SessionEnd,
            timestamp,
            json!({
                "cc_session_id": cc_session_id,
                "duration_ms": 60_000,
                "end_reason": "exit",
                "transcript_path": transcript_path,
            }),
        )
    }

    pub fn git_commit(&self, id: &str, sha: &str, timestamp: DateTime<Utc>) -> EventEnvelope {
        self.envelope(
            id,
            EventKind::GitCommit,
            timestamp,
            json!({
                "hash": sha,
                "message": "fix: tighten retry loop",
                "branch": "main",
                "files_changed": 2,
                "insertions": 14,
                "deletions": 3,
            }),
        )
    }
}
