use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The event types a device may post. Anything else is rejected at ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "session.start")]
    SessionStart,
    #[serde(rename = "session.end")]
    SessionEnd,
    #[serde(rename = "git.commit")]
    GitCommit,
    #[serde(rename = "git.push")]
    GitPush,
    #[serde(rename = "git.checkout")]
    GitCheckout,
    #[serde(rename = "git.merge")]
    GitMerge,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SessionStart => "session.start",
            EventKind::SessionEnd => "session.end",
            EventKind::GitCommit => "git.commit",
            EventKind::GitPush => "git.push",
            EventKind::GitCheckout => "git.checkout",
            EventKind::GitMerge => "git.merge",
        }
    }

    pub fn is_git(&self) -> bool {
        matches!(
            self,
            EventKind::GitCommit | EventKind::GitPush | EventKind::GitCheckout | EventKind::GitMerge
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workspace identity as supplied by the posting device. The canonical ID is
/// the dedupe key (a remote URL or a hash of the root path); the rest are
/// hints applied only when the workspace row is first created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub canonical_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_branch: Option<String>,
}

/// Device attributes, applied only when the device row is first created.
/// `last_seen_at` refresh happens regardless of hints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceHints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    pub device_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,
}

/// The raw envelope a device posts to the ingest endpoint and the unit that
/// travels through the stream to the consumer.
///
/// `id` is caller-supplied and is the primary dedupe key: posting the same
/// event twice must leave the database unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
    pub workspace: WorkspaceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<DeviceHints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub data: Value,
}
