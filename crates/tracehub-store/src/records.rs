use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::FromRow;

/// A workspace row. Workspaces are pure identity anchors: created on first
/// reference, never deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkspaceRow {
    pub id: String,
    pub canonical_id: String,
    pub display_name: String,
    pub default_branch: String,
    pub first_seen_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceRow {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub arch: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionRow {
    pub id: String,
    pub workspace_id: String,
    pub device_id: String,
    pub cc_session_id: String,
    pub lifecycle: String,
    pub parse_status: String,
    pub cwd: Option<String>,
    pub git_branch: Option<String>,
    pub git_remote: Option<String>,
    pub model: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub transcript_s3_key: Option<String>,
    pub parse_error: Option<String>,
    pub summary: Option<String>,
    pub total_messages: Option<i32>,
    pub user_messages: Option<i32>,
    pub assistant_messages: Option<i32>,
    pub tokens_in: Option<i64>,
    pub tokens_out: Option<i64>,
    pub cache_read_tokens: Option<i64>,
    pub cache_write_tokens: Option<i64>,
    pub tool_use_count: Option<i32>,
    pub thinking_blocks: Option<i32>,
    pub subagent_count: Option<i32>,
    pub cost_estimate_usd: Option<f64>,
    pub initial_prompt: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Slim session projection for the batch status endpoint.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SessionStatusRow {
    pub id: String,
    pub lifecycle: String,
    pub parse_status: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct EventRow {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(rename = "timestamp")]
    pub event_timestamp: DateTime<Utc>,
    pub device_id: String,
    pub workspace_id: Option<String>,
    pub session_id: Option<String>,
    pub data: Value,
    pub blob_refs: Value,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct GitActivityRow {
    pub id: String,
    pub workspace_id: String,
    pub device_id: String,
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub message: Option<String>,
    pub files_changed: Option<i32>,
    pub insertions: Option<i32>,
    pub deletions: Option<i32>,
    #[serde(rename = "timestamp")]
    pub activity_timestamp: DateTime<Utc>,
    pub data: Value,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TranscriptMessageRow {
    pub id: String,
    pub session_id: String,
    pub line_number: i64,
    pub ordinal: i32,
    pub message_type: String,
    pub role: Option<String>,
    pub model: Option<String>,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub cost_usd: f64,
    pub message_timestamp: Option<DateTime<Utc>>,
    pub has_text: bool,
    pub has_thinking: bool,
    pub has_tool_use: bool,
    pub has_tool_result: bool,
    pub raw_message: Value,
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ContentBlockRow {
    pub id: String,
    pub message_id: String,
    pub session_id: String,
    pub block_order: i32,
    pub block_type: String,
    pub content_text: Option<String>,
    pub thinking_text: Option<String>,
    pub tool_name: Option<String>,
    pub tool_use_id: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_result_id: Option<String>,
    pub is_error: bool,
    pub result_text: Option<String>,
    pub metadata: Option<Value>,
}

/// Workspace list entry: the workspace row with its session aggregates.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct WorkspaceListRow {
    pub id: String,
    pub canonical_id: String,
    pub display_name: String,
    pub default_branch: String,
    pub first_seen_at: DateTime<Utc>,
    pub session_count: i64,
    pub active_session_count: i64,
    pub device_count: i64,
    pub total_cost_usd: f64,
    pub total_duration_ms: i64,
    pub last_session_at: Option<DateTime<Utc>>,
    /// Keyset sort key: last_session_at falling back to first_seen_at.
    #[serde(skip)]
    pub sort_key: DateTime<Utc>,
}

/// Flat aggregate block on workspace and device detail responses.
#[derive(Debug, Clone, Default, FromRow, Serialize)]
pub struct WorkspaceStats {
    pub session_count: i64,
    pub active_session_count: i64,
    pub total_cost_usd: f64,
    pub total_duration_ms: i64,
    pub total_tokens_in: i64,
    pub total_tokens_out: i64,
    pub total_messages: i64,
}

/// Flat git summary block on the workspace detail response.
#[derive(Debug, Clone, Default, Serialize)]
pub struct GitSummary {
    pub total_commits: i64,
    pub total_pushes: i64,
    pub active_branches: Vec<String>,
    pub last_commit_at: Option<DateTime<Utc>>,
}

/// Device list entry with cross-workspace aggregates.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DeviceSummaryRow {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub hostname: Option<String>,
    pub os: Option<String>,
    pub arch: Option<String>,
    pub first_seen_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    pub session_count: i64,
    pub workspace_count: i64,
    pub active_session_count: i64,
    pub last_session_at: Option<DateTime<Utc>>,
    pub total_cost_usd: f64,
    pub total_duration_ms: i64,
}
