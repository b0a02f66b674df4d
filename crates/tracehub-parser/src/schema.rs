//! Raw line shapes of the transcript JSONL format.
//!
//! Deliberately loose: unknown fields are ignored, most fields are optional,
//! and content arrays tolerate unrecognized block types. The raw log is the
//! source of truth; this schema only needs to be right about the parts we
//! index.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserLine {
    pub session_id: Option<String>,
    pub timestamp: Option<String>,
    pub message: Option<UserMessage>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "deserialize_content")]
    pub content: Option<Vec<ContentItem>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AssistantLine {
    pub session_id: Option<String>,
    pub timestamp: Option<String>,
    pub message: Option<AssistantMessage>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssistantMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "deserialize_content")]
    pub content: Option<Vec<ContentItem>>,
    #[serde(default)]
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SystemLine {
    pub session_id: Option<String>,
    pub timestamp: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SummaryLine {
    pub session_id: Option<String>,
    pub timestamp: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// One element of a message's `content` array. A bare-string content value is
/// folded into a single `Text` item by [`deserialize_content`].
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
#[serde(rename_all = "snake_case")]
pub(crate) enum ContentItem {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Option<Value>,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<Value>,
        #[serde(default)]
        is_error: bool,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub(crate) struct Usage {
    #[serde(default)]
    pub input_tokens: i64,
    #[serde(default)]
    pub output_tokens: i64,
    #[serde(default)]
    pub cache_read_input_tokens: Option<i64>,
    #[serde(default)]
    pub cache_creation_input_tokens: Option<i64>,
}

fn deserialize_content<'de, D>(deserializer: D) -> Result<Option<Vec<ContentItem>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrArray {
        String(String),
        Array(Vec<ContentItem>),
    }

    match Option::<StringOrArray>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrArray::String(s)) => Ok(Some(vec![ContentItem::Text { text: s }])),
        Some(StringOrArray::Array(items)) => Ok(Some(items)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_content_becomes_text_item() {
        let raw = r#"{"role": "user", "content": "hello there"}"#;
        let msg: UserMessage = serde_json::from_str(raw).unwrap();
        let content = msg.content.unwrap();
        assert_eq!(content.len(), 1);
        assert!(matches!(&content[0], ContentItem::Text { text } if text == "hello there"));
    }

    #[test]
    fn test_null_content_is_none() {
        let raw = r#"{"role": "user", "content": null}"#;
        let msg: UserMessage = serde_json::from_str(raw).unwrap();
        assert!(msg.content.is_none());
    }

    #[test]
    fn test_unknown_content_item_tolerated() {
        let raw = r#"{"role": "assistant", "content": [
            {"type": "text", "text": "hi"},
            {"type": "server_tool_use", "id": "x"}
        ]}"#;
        let msg: UserMessage = serde_json::from_str(raw).unwrap();
        let content = msg.content.unwrap();
        assert_eq!(content.len(), 2);
        assert!(matches!(&content[1], ContentItem::Unknown));
    }

    #[test]
    fn test_usage_defaults() {
        let usage: Usage = serde_json::from_str(r#"{"input_tokens": 10, "output_tokens": 5}"#).unwrap();
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.cache_read_input_tokens, None);
    }
}
