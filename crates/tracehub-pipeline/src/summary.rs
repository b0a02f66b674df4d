//! Best-effort session summaries via an external model.
//!
//! The generator renders a compact transcript view (text and tool names
//! only), sends it to the configured model, and hands back a short summary.
//! It can fail or be skipped freely: the pipeline never regresses a session
//! because of it.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracehub_parser::{BlockKind, MessageType, ParsedBlock, ParsedMessage};

// Rendering caps, tuned by eye.
const BODY_BUDGET_CHARS: usize = 8000;
const HEAD_WINDOW_CHARS: usize = 6000;
const TAIL_WINDOW_CHARS: usize = 1500;

const SUMMARY_SYSTEM_PROMPT: &str = "Summarize this coding session in 1-2 sentences. \
Focus on what was accomplished. Plain text, no preamble.";

#[derive(Debug, Clone)]
pub struct SummaryConfig {
    pub enabled: bool,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f64,
    pub max_output_tokens: u32,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: None,
            model: "claude-3-5-haiku-latest".to_string(),
            temperature: 0.2,
            max_output_tokens: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SummaryOutcome {
    pub success: bool,
    pub summary: Option<String>,
    pub error: Option<String>,
}

impl SummaryOutcome {
    fn ok(summary: Option<String>) -> Self {
        Self {
            success: true,
            summary,
            error: None,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: None,
            error: Some(error.into()),
        }
    }
}

/// The model-call seam. Production uses [`AnthropicModel`]; tests stub it.
#[async_trait]
pub trait SummaryModel: Send + Sync {
    async fn complete(
        &self,
        config: &SummaryConfig,
        prompt: &str,
    ) -> std::result::Result<String, String>;
}

pub async fn generate_summary(
    messages: &[ParsedMessage],
    blocks: &[ParsedBlock],
    config: &SummaryConfig,
    model: &dyn SummaryModel,
) -> SummaryOutcome {
    if !config.enabled {
        return SummaryOutcome::ok(None);
    }
    if messages.is_empty() {
        return SummaryOutcome::ok(Some("Empty session.".to_string()));
    }
    if config.api_key.is_none() {
        return SummaryOutcome::failed("ANTHROPIC_API_KEY not configured");
    }

    let prompt = render_transcript(messages, blocks);
    match model.complete(config, &prompt).await {
        Ok(summary) => SummaryOutcome::ok(Some(summary)),
        Err(error) => SummaryOutcome::failed(error),
    }
}

/// Render the transcript view sent to the model: a stats header, then one
/// line per text block or tool use. Thinking and tool results are excluded.
/// Long sessions keep a head and tail window with a truncation marker in
/// between.
pub fn render_transcript(messages: &[ParsedMessage], blocks: &[ParsedBlock]) -> String {
    let user_count = messages
        .iter()
        .filter(|m| m.message_type == MessageType::User)
        .count();
    let assistant_count = messages
        .iter()
        .filter(|m| m.message_type == MessageType::Assistant)
        .count();
    let tool_uses = blocks.iter().filter(|b| b.kind == BlockKind::ToolUse).count();
    let duration = match (
        messages.iter().filter_map(|m| m.timestamp).next(),
        messages.iter().filter_map(|m| m.timestamp).next_back(),
    ) {
        (Some(first), Some(last)) => format!("{}s", (last - first).num_seconds()),
        _ => "unknown".to_string(),
    };

    let header = format!(
        "Session: {} user messages, {} assistant messages, {} tool uses, duration {}\n\n",
        user_count, assistant_count, tool_uses, duration
    );

    let rendered: Vec<String> = messages
        .iter()
        .filter_map(|message| render_message(message, blocks))
        .collect();

    let body = if rendered.iter().map(String::len).sum::<usize>() <= BODY_BUDGET_CHARS {
        rendered.join("\n")
    } else {
        truncate_body(&rendered)
    };

    format!("{}{}", header, body)
}

fn render_message(message: &ParsedMessage, blocks: &[ParsedBlock]) -> Option<String> {
    let label = match message.message_type {
        MessageType::User => "User",
        MessageType::Assistant => "Assistant",
        MessageType::System => "System",
        MessageType::Summary => "Summary",
    };

    let mut parts: Vec<String> = Vec::new();
    for block in blocks.iter().filter(|b| b.message_ordinal == message.ordinal) {
        match block.kind {
            BlockKind::Text => {
                if let Some(text) = &block.content_text {
                    if !text.trim().is_empty() {
                        parts.push(text.trim().to_string());
                    }
                }
            }
            BlockKind::ToolUse => {
                if let Some(name) = &block.tool_name {
                    parts.push(format!("[tool: {}]", name));
                }
            }
            BlockKind::Thinking | BlockKind::ToolResult => {}
        }
    }

    if parts.is_empty() {
        return None;
    }
    Some(format!("{}: {}", label, parts.join(" ")))
}

fn truncate_body(rendered: &[String]) -> String {
    let mut head: Vec<&str> = Vec::new();
    let mut head_len = 0;
    for line in rendered {
        if head_len + line.len() > HEAD_WINDOW_CHARS {
            break;
        }
        head_len += line.len();
        head.push(line);
    }

    let mut tail: Vec<&str> = Vec::new();
    let mut tail_len = 0;
    for line in rendered.iter().rev() {
        if tail_len + line.len() > TAIL_WINDOW_CHARS {
            break;
        }
        tail_len += line.len();
        tail.push(line);
    }
    tail.reverse();

    // Never let the windows overlap on short-but-over-budget inputs.
    let tail_start = rendered.len() - tail.len();
    let head = &head[..head.len().min(tail_start)];
    let omitted = rendered.len() - head.len() - tail.len();

    let mut out = head.to_vec();
    out.push("");
    let marker = format!("... [truncated {} messages] ...", omitted);
    let mut body: Vec<String> = out.iter().map(|s| s.to_string()).collect();
    body.push(marker);
    body.push(String::new());
    body.extend(tail.iter().map(|s| s.to_string()));
    body.join("\n")
}

/// Anthropic-style messages API client.
pub struct AnthropicModel {
    client: reqwest::Client,
    base_url: String,
}

impl AnthropicModel {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

impl Default for AnthropicModel {
    fn default() -> Self {
        Self::new("https://api.anthropic.com")
    }
}

#[async_trait]
impl SummaryModel for AnthropicModel {
    async fn complete(
        &self,
        config: &SummaryConfig,
        prompt: &str,
    ) -> std::result::Result<String, String> {
        let api_key = config.api_key.as_deref().ok_or("missing api key")?;

        let body = json!({
            "model": config.model,
            "max_tokens": config.max_output_tokens,
            "temperature": config.temperature,
            "system": SUMMARY_SYSTEM_PROMPT,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .timeout(Duration::from_secs(60))
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("summary request failed: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("summary model returned {}", response.status()));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("summary response decode failed: {}", e))?;

        payload["content"][0]["text"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| "summary response had no text content".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(ordinal: i32, message_type: MessageType) -> ParsedMessage {
        ParsedMessage {
            line_number: ordinal as i64 + 1,
            ordinal,
            message_type,
            role: None,
            model: None,
            tokens_in: 0,
            tokens_out: 0,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            cost_usd: 0.0,
            timestamp: None,
            has_text: true,
            has_thinking: false,
            has_tool_use: false,
            has_tool_result: false,
            raw_message: json!({}),
            metadata: None,
        }
    }

    fn text_block(ordinal: i32, text: &str) -> ParsedBlock {
        ParsedBlock {
            message_ordinal: ordinal,
            block_order: 0,
            kind: BlockKind::Text,
            content_text: Some(text.to_string()),
            thinking_text: None,
            tool_name: None,
            tool_use_id: None,
            tool_input: None,
            tool_result_id: None,
            is_error: false,
            result_text: None,
            metadata: None,
        }
    }

    fn thinking_block(ordinal: i32) -> ParsedBlock {
        ParsedBlock {
            message_ordinal: ordinal,
            block_order: 1,
            kind: BlockKind::Thinking,
            content_text: None,
            thinking_text: Some("secret reasoning".to_string()),
            tool_name: None,
            tool_use_id: None,
            tool_input: None,
            tool_result_id: None,
            is_error: false,
            result_text: None,
            metadata: None,
        }
    }

    struct StubModel {
        response: std::result::Result<String, String>,
    }

    #[async_trait]
    impl SummaryModel for StubModel {
        async fn complete(
            &self,
            _config: &SummaryConfig,
            _prompt: &str,
        ) -> std::result::Result<String, String> {
            self.response.clone()
        }
    }

    fn enabled_config() -> SummaryConfig {
        SummaryConfig {
            enabled: true,
            api_key: Some("sk-test".to_string()),
            ..SummaryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_disabled_config_skips() {
        let config = SummaryConfig::default();
        let model = StubModel {
            response: Err("should not be called".to_string()),
        };
        let outcome = generate_summary(&[], &[], &config, &model).await;
        assert!(outcome.success);
        assert!(outcome.summary.is_none());
    }

    #[tokio::test]
    async fn test_empty_session_short_circuits() {
        let model = StubModel {
            response: Err("should not be called".to_string()),
        };
        let outcome = generate_summary(&[], &[], &enabled_config(), &model).await;
        assert!(outcome.success);
        assert_eq!(outcome.summary.as_deref(), Some("Empty session."));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails() {
        let config = SummaryConfig {
            enabled: true,
            api_key: None,
            ..SummaryConfig::default()
        };
        let model = StubModel {
            response: Ok("unused".to_string()),
        };
        let messages = vec![message(0, MessageType::User)];
        let outcome = generate_summary(&messages, &[], &config, &model).await;
        assert!(!outcome.success);
        assert!(outcome.error.as_deref().unwrap_or("").contains("not configured"));
    }

    #[tokio::test]
    async fn test_model_result_passed_through() {
        let model = StubModel {
            response: Ok("Refactored the parser.".to_string()),
        };
        let messages = vec![message(0, MessageType::User)];
        let blocks = vec![text_block(0, "please refactor")];
        let outcome = generate_summary(&messages, &blocks, &enabled_config(), &model).await;
        assert!(outcome.success);
        assert_eq!(outcome.summary.as_deref(), Some("Refactored the parser."));
    }

    #[test]
    fn test_render_excludes_thinking_and_tool_results() {
        let messages = vec![message(0, MessageType::User), message(1, MessageType::Assistant)];
        let blocks = vec![
            text_block(0, "fix the bug"),
            text_block(1, "done"),
            thinking_block(1),
        ];

        let rendered = render_transcript(&messages, &blocks);
        assert!(rendered.contains("User: fix the bug"));
        assert!(rendered.contains("Assistant: done"));
        assert!(!rendered.contains("secret reasoning"));
    }

    #[test]
    fn test_render_includes_tool_names() {
        let messages = vec![message(0, MessageType::Assistant)];
        let blocks = vec![ParsedBlock {
            message_ordinal: 0,
            block_order: 0,
            kind: BlockKind::ToolUse,
            content_text: None,
            thinking_text: None,
            tool_name: Some("Bash".to_string()),
            tool_use_id: Some("toolu_1".to_string()),
            tool_input: Some(json!({"command": "ls"})),
            tool_result_id: None,
            is_error: false,
            result_text: None,
            metadata: None,
        }];

        let rendered = render_transcript(&messages, &blocks);
        assert!(rendered.contains("[tool: Bash]"));
        // Tool inputs are not rendered.
        assert!(!rendered.contains("ls"));
    }

    #[test]
    fn test_render_truncates_long_sessions() {
        let count = 400;
        let mut messages = Vec::new();
        let mut blocks = Vec::new();
        for i in 0..count {
            messages.push(message(i, MessageType::User));
            blocks.push(text_block(i, &format!("message number {} {}", i, "pad".repeat(20))));
        }

        let rendered = render_transcript(&messages, &blocks);
        assert!(rendered.contains("[truncated"));
        // Head and tail survive.
        assert!(rendered.contains("message number 0 "));
        assert!(rendered.contains(&format!("message number {} ", count - 1)));
        // Budget respected within slack for header and marker.
        assert!(rendered.len() < BODY_BUDGET_CHARS + 1000);
    }
}
