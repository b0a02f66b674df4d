use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::stats::SessionStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    User,
    Assistant,
    System,
    Summary,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::User => "user",
            MessageType::Assistant => "assistant",
            MessageType::System => "system",
            MessageType::Summary => "summary",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Text,
    Thinking,
    ToolUse,
    ToolResult,
}

impl BlockKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockKind::Text => "text",
            BlockKind::Thinking => "thinking",
            BlockKind::ToolUse => "tool_use",
            BlockKind::ToolResult => "tool_result",
        }
    }
}

/// One logical message. Consecutive assistant lines sharing a provider
/// message id are merged into a single `ParsedMessage` whose blocks span the
/// whole group and whose usage comes from the group's last line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedMessage {
    /// Source line (1-based) of the first line contributing to this message.
    pub line_number: i64,
    /// 0-based position within the session.
    pub ordinal: i32,
    pub message_type: MessageType,
    pub role: Option<String>,
    pub model: Option<String>,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub cost_usd: f64,
    pub timestamp: Option<DateTime<Utc>>,
    pub has_text: bool,
    pub has_thinking: bool,
    pub has_tool_use: bool,
    pub has_tool_result: bool,
    /// Original JSON of the first source line of the group.
    pub raw_message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One structural subunit of a message's content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedBlock {
    /// Ordinal of the message this block belongs to.
    pub message_ordinal: i32,
    /// 0-based position within the message.
    pub block_order: i32,
    pub kind: BlockKind,
    pub content_text: Option<String>,
    pub thinking_text: Option<String>,
    pub tool_name: Option<String>,
    pub tool_use_id: Option<String>,
    pub tool_input: Option<Value>,
    pub tool_result_id: Option<String>,
    pub is_error: bool,
    pub result_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// A line-level diagnostic. Bad lines never abort the parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineError {
    pub line_number: i64,
    pub message: String,
}

/// Session-level fields captured from the transcript itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranscriptMeta {
    pub session_id: Option<String>,
    pub cwd: Option<String>,
    pub version: Option<String>,
    pub git_branch: Option<String>,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

/// Everything the parser produces for one transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseOutcome {
    pub messages: Vec<ParsedMessage>,
    pub blocks: Vec<ParsedBlock>,
    pub errors: Vec<LineError>,
    pub stats: SessionStats,
    pub metadata: TranscriptMeta,
}
