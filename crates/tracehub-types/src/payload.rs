use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Error, EventEnvelope, Result};

fn decode<T: serde::de::DeserializeOwned>(envelope: &EventEnvelope) -> Result<T> {
    serde_json::from_value(envelope.data.clone()).map_err(|e| Error::InvalidPayload {
        event_type: envelope.kind.to_string(),
        detail: e.to_string(),
    })
}

/// Payload of a `session.start` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartData {
    pub cc_session_id: String,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub git_remote: Option<String>,
    #[serde(default)]
    pub cc_version: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
}

impl SessionStartData {
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self> {
        decode(envelope)
    }
}

/// Payload of a `session.end` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEndData {
    pub cc_session_id: String,
    #[serde(default)]
    pub duration_ms: Option<i64>,
    #[serde(default)]
    pub end_reason: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
}

impl SessionEndData {
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self> {
        decode(envelope)
    }
}

/// One file touched by a commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Payload of a `git.commit` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitCommitData {
    pub hash: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub author_name: Option<String>,
    #[serde(default)]
    pub author_email: Option<String>,
    #[serde(default)]
    pub files_changed: Option<i32>,
    #[serde(default)]
    pub insertions: Option<i32>,
    #[serde(default)]
    pub deletions: Option<i32>,
    #[serde(default)]
    pub file_list: Vec<FileChange>,
}

impl GitCommitData {
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self> {
        decode(envelope)
    }
}

/// Payload of a `git.push` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitPushData {
    #[serde(default)]
    pub remote: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub commit_count: Option<i32>,
    #[serde(default)]
    pub commits: Option<Value>,
}

impl GitPushData {
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self> {
        decode(envelope)
    }
}

/// Payload of a `git.checkout` event. `to_branch` is null for detached HEAD
/// checkouts; `to_ref` always carries the target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitCheckoutData {
    #[serde(default)]
    pub from_ref: Option<String>,
    #[serde(default)]
    pub to_ref: Option<String>,
    #[serde(default)]
    pub from_branch: Option<String>,
    #[serde(default)]
    pub to_branch: Option<String>,
}

impl GitCheckoutData {
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self> {
        decode(envelope)
    }

    /// Branch column value: the target branch, falling back to the raw ref
    /// for detached HEAD checkouts.
    pub fn branch(&self) -> Option<&str> {
        self.to_branch.as_deref().or(self.to_ref.as_deref())
    }
}

/// Payload of a `git.merge` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitMergeData {
    #[serde(default)]
    pub merged_branch: Option<String>,
    #[serde(default)]
    pub into_branch: Option<String>,
    #[serde(default)]
    pub merge_commit: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub files_changed: Option<i32>,
    #[serde(default)]
    pub had_conflicts: Option<bool>,
}

impl GitMergeData {
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self> {
        decode(envelope)
    }
}

/// Validate that an envelope's `data` decodes as the payload shape registered
/// for its type. Used by the ingest endpoint to reject malformed batches with
/// a per-event diagnostic before anything touches the database.
pub fn validate_payload(envelope: &EventEnvelope) -> Result<()> {
    use crate::EventKind::*;
    match envelope.kind {
        SessionStart => SessionStartData::from_envelope(envelope).map(|_| ()),
        SessionEnd => SessionEndData::from_envelope(envelope).map(|_| ()),
        GitCommit => GitCommitData::from_envelope(envelope).map(|_| ()),
        GitPush => GitPushData::from_envelope(envelope).map(|_| ()),
        GitCheckout => GitCheckoutData::from_envelope(envelope).map(|_| ()),
        GitMerge => GitMergeData::from_envelope(envelope).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EventKind, WorkspaceRef};
    use chrono::Utc;

    fn envelope(kind: EventKind, data: Value) -> EventEnvelope {
        EventEnvelope {
            id: "evt-1".to_string(),
            kind,
            timestamp: Utc::now(),
            device_id: "dev-1".to_string(),
            workspace: WorkspaceRef {
                canonical_id: "github.com/u/r".to_string(),
                display_name: None,
                default_branch: None,
            },
            device: None,
            session_id: None,
            data,
        }
    }

    #[test]
    fn test_session_start_decode() {
        let env = envelope(
            EventKind::SessionStart,
            serde_json::json!({
                "cc_session_id": "cc-A",
                "cwd": "/home/u/r",
                "git_branch": "main",
                "model": "claude-sonnet-4"
            }),
        );
        let data = SessionStartData::from_envelope(&env).unwrap();
        assert_eq!(data.cc_session_id, "cc-A");
        assert_eq!(data.git_branch.as_deref(), Some("main"));
        assert!(data.transcript_path.is_none());
    }

    #[test]
    fn test_session_start_missing_required_field() {
        let env = envelope(EventKind::SessionStart, serde_json::json!({"cwd": "/x"}));
        let err = SessionStartData::from_envelope(&env).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("session.start"), "got: {}", msg);
    }

    #[test]
    fn test_checkout_branch_falls_back_to_ref() {
        let detached = GitCheckoutData {
            from_ref: Some("refs/heads/main".to_string()),
            to_ref: Some("abc1234".to_string()),
            from_branch: Some("main".to_string()),
            to_branch: None,
        };
        assert_eq!(detached.branch(), Some("abc1234"));

        let normal = GitCheckoutData {
            from_ref: None,
            to_ref: Some("refs/heads/feature".to_string()),
            from_branch: None,
            to_branch: Some("feature".to_string()),
        };
        assert_eq!(normal.branch(), Some("feature"));
    }

    #[test]
    fn test_validate_payload_dispatches_by_kind() {
        let good = envelope(EventKind::GitCommit, serde_json::json!({"hash": "deadbeef"}));
        assert!(validate_payload(&good).is_ok());

        let bad = envelope(EventKind::GitCommit, serde_json::json!({"message": "no hash"}));
        assert!(validate_payload(&bad).is_err());
    }
}
