use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::output::{
    BlockKind, LineError, MessageType, ParseOutcome, ParsedBlock, ParsedMessage, TranscriptMeta,
};
use crate::schema::{AssistantLine, ContentItem, SummaryLine, SystemLine, Usage, UserLine};
use crate::stats;

const DEFAULT_MAX_LINE_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_MAX_INLINE_CONTENT_BYTES: usize = 256 * 1024;

// Line types that exist in the log for bookkeeping we don't index. Neither
// messages nor errors.
const IGNORED_LINE_TYPES: &[&str] = &["progress", "file-history-snapshot", "queue-operation"];

#[derive(Debug, Clone)]
pub struct ParserConfig {
    pub max_line_bytes: usize,
    pub max_inline_content_bytes: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            max_inline_content_bytes: DEFAULT_MAX_INLINE_CONTENT_BYTES,
        }
    }
}

/// Parse a complete transcript body.
pub fn parse_transcript(text: &str, config: &ParserConfig) -> ParseOutcome {
    parse_transcript_lines(text.split('\n'), config)
}

/// Parse a transcript from an iterator of lines (chunked readers feed this
/// directly without assembling one big string).
pub fn parse_transcript_lines<'a, I>(lines: I, config: &ParserConfig) -> ParseOutcome
where
    I: IntoIterator<Item = &'a str>,
{
    let mut state = ParseState::new(config);

    for (idx, line) in lines.into_iter().enumerate() {
        state.push_line(idx as i64 + 1, line);
    }

    state.finish()
}

/// Assistant lines streaming one logical message arrive as consecutive lines
/// sharing a provider message id; they accumulate here until a different
/// message shows up.
struct PendingAssistant {
    group_id: String,
    message: ParsedMessage,
    blocks: Vec<ParsedBlock>,
}

struct ParseState<'c> {
    config: &'c ParserConfig,
    messages: Vec<ParsedMessage>,
    blocks: Vec<ParsedBlock>,
    errors: Vec<LineError>,
    meta: TranscriptMeta,
    pending: Option<PendingAssistant>,
    next_ordinal: i32,
}

impl<'c> ParseState<'c> {
    fn new(config: &'c ParserConfig) -> Self {
        Self {
            config,
            messages: Vec::new(),
            blocks: Vec::new(),
            errors: Vec::new(),
            meta: TranscriptMeta::default(),
            pending: None,
            next_ordinal: 0,
        }
    }

    fn push_line(&mut self, line_number: i64, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if line.len() > self.config.max_line_bytes {
            self.errors.push(LineError {
                line_number,
                message: "Line exceeds max size".to_string(),
            });
            return;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(_) => {
                self.errors.push(LineError {
                    line_number,
                    message: "Invalid JSON".to_string(),
                });
                return;
            }
        };

        let Some(line_type) = value.get("type").and_then(Value::as_str).map(str::to_owned)
        else {
            self.errors.push(LineError {
                line_number,
                message: "Missing type field".to_string(),
            });
            return;
        };

        if IGNORED_LINE_TYPES.contains(&line_type.as_str()) {
            return;
        }

        match line_type.as_str() {
            "user" => self.push_user(line_number, value),
            "assistant" => self.push_assistant(line_number, value),
            "system" => self.push_system(line_number, value),
            "summary" => self.push_summary(line_number, value),
            _ => {
                self.errors.push(LineError {
                    line_number,
                    message: "Unknown line type".to_string(),
                });
            }
        }
    }

    fn finish(mut self) -> ParseOutcome {
        self.flush_pending();
        let stats = stats::aggregate(&self.messages, &self.blocks, &self.meta);
        ParseOutcome {
            messages: self.messages,
            blocks: self.blocks,
            errors: self.errors,
            stats,
            metadata: self.meta,
        }
    }

    fn push_user(&mut self, line_number: i64, raw: Value) {
        self.flush_pending();
        let line: UserLine = match serde_json::from_value(raw.clone()) {
            Ok(l) => l,
            Err(e) => return self.structure_error(line_number, &e),
        };

        let timestamp = parse_timestamp(line.timestamp.as_deref());
        self.capture_meta(
            line.session_id.as_deref(),
            line.cwd.as_deref(),
            line.version.as_deref(),
            line.git_branch.as_deref(),
            timestamp,
        );

        let ordinal = self.take_ordinal();
        let content = line.message.as_ref().and_then(|m| m.content.as_deref());
        let blocks = self.build_blocks(ordinal, content.unwrap_or(&[]));
        let role = line.message.as_ref().and_then(|m| m.role.clone());

        self.finalize_plain(
            line_number,
            ordinal,
            MessageType::User,
            role.or_else(|| Some("user".to_string())),
            None,
            timestamp,
            raw,
            blocks,
        );
    }

    fn push_assistant(&mut self, line_number: i64, raw: Value) {
        let line: AssistantLine = match serde_json::from_value(raw.clone()) {
            Ok(l) => l,
            Err(e) => {
                self.flush_pending();
                return self.structure_error(line_number, &e);
            }
        };

        let timestamp = parse_timestamp(line.timestamp.as_deref());
        self.capture_meta(
            line.session_id.as_deref(),
            line.cwd.as_deref(),
            line.version.as_deref(),
            line.git_branch.as_deref(),
            timestamp,
        );

        let message = line.message.as_ref();
        let group_id = message.and_then(|m| m.id.clone());
        let usage = message.and_then(|m| m.usage);
        let content = message.and_then(|m| m.content.as_deref()).unwrap_or(&[]);

        // Continuation of the current streaming group: concatenate blocks and
        // let the later line's usage win (the last line carries the most
        // complete counts).
        if let (Some(id), Some(pending)) = (group_id.as_deref(), self.pending.as_mut()) {
            if pending.group_id == id {
                let ordinal = pending.message.ordinal;
                let base_order = pending.blocks.len() as i32;
                let more = build_blocks_at(self.config, ordinal, base_order, content);
                pending.blocks.extend(more);
                if let Some(usage) = usage {
                    apply_usage(&mut pending.message, &usage);
                }
                if timestamp.is_some() {
                    pending.message.timestamp = timestamp;
                }
                return;
            }
        }

        self.flush_pending();

        let ordinal = self.take_ordinal();
        let blocks = self.build_blocks(ordinal, content);
        let mut parsed = ParsedMessage {
            line_number,
            ordinal,
            message_type: MessageType::Assistant,
            role: message
                .and_then(|m| m.role.clone())
                .or_else(|| Some("assistant".to_string())),
            model: message.and_then(|m| m.model.clone()),
            tokens_in: 0,
            tokens_out: 0,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            cost_usd: 0.0,
            timestamp,
            has_text: false,
            has_thinking: false,
            has_tool_use: false,
            has_tool_result: false,
            raw_message: raw,
            metadata: None,
        };
        if let Some(usage) = usage {
            apply_usage(&mut parsed, &usage);
        }

        match group_id {
            Some(id) => {
                self.pending = Some(PendingAssistant {
                    group_id: id,
                    message: parsed,
                    blocks,
                });
            }
            None => self.commit(parsed, blocks),
        }
    }

    fn push_system(&mut self, line_number: i64, raw: Value) {
        self.flush_pending();
        let line: SystemLine = match serde_json::from_value(raw.clone()) {
            Ok(l) => l,
            Err(e) => return self.structure_error(line_number, &e),
        };

        let timestamp = parse_timestamp(line.timestamp.as_deref());
        self.capture_meta(
            line.session_id.as_deref(),
            line.cwd.as_deref(),
            line.version.as_deref(),
            line.git_branch.as_deref(),
            timestamp,
        );

        let ordinal = self.take_ordinal();
        let blocks = match line.content {
            Some(text) => self.build_blocks(ordinal, &[ContentItem::Text { text }]),
            None => Vec::new(),
        };

        self.finalize_plain(
            line_number,
            ordinal,
            MessageType::System,
            Some("system".to_string()),
            None,
            timestamp,
            raw,
            blocks,
        );
    }

    fn push_summary(&mut self, line_number: i64, raw: Value) {
        self.flush_pending();
        let line: SummaryLine = match serde_json::from_value(raw.clone()) {
            Ok(l) => l,
            Err(e) => return self.structure_error(line_number, &e),
        };

        let timestamp = parse_timestamp(line.timestamp.as_deref());
        self.capture_meta(line.session_id.as_deref(), None, None, None, timestamp);

        let ordinal = self.take_ordinal();
        let blocks = match line.summary {
            Some(text) => self.build_blocks(ordinal, &[ContentItem::Text { text }]),
            None => Vec::new(),
        };

        self.finalize_plain(
            line_number,
            ordinal,
            MessageType::Summary,
            None,
            None,
            timestamp,
            raw,
            blocks,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn finalize_plain(
        &mut self,
        line_number: i64,
        ordinal: i32,
        message_type: MessageType,
        role: Option<String>,
        model: Option<String>,
        timestamp: Option<DateTime<Utc>>,
        raw: Value,
        blocks: Vec<ParsedBlock>,
    ) {
        let parsed = ParsedMessage {
            line_number,
            ordinal,
            message_type,
            role,
            model,
            tokens_in: 0,
            tokens_out: 0,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            cost_usd: 0.0,
            timestamp,
            has_text: false,
            has_thinking: false,
            has_tool_use: false,
            has_tool_result: false,
            raw_message: raw,
            metadata: None,
        };
        self.commit(parsed, blocks);
    }

    fn commit(&mut self, mut message: ParsedMessage, blocks: Vec<ParsedBlock>) {
        set_flags(&mut message, &blocks);
        message.cost_usd = stats::message_cost_usd(
            message.tokens_in,
            message.tokens_out,
            message.cache_read_tokens,
            message.cache_write_tokens,
        );
        self.messages.push(message);
        self.blocks.extend(blocks);
    }

    fn flush_pending(&mut self) {
        if let Some(pending) = self.pending.take() {
            self.commit(pending.message, pending.blocks);
        }
    }

    fn take_ordinal(&mut self) -> i32 {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ordinal
    }

    fn build_blocks(&self, ordinal: i32, content: &[ContentItem]) -> Vec<ParsedBlock> {
        build_blocks_at(self.config, ordinal, 0, content)
    }

    fn structure_error(&mut self, line_number: i64, err: &serde_json::Error) {
        self.errors.push(LineError {
            line_number,
            message: format!("Invalid line structure: {}", err),
        });
    }

    fn capture_meta(
        &mut self,
        session_id: Option<&str>,
        cwd: Option<&str>,
        version: Option<&str>,
        git_branch: Option<&str>,
        timestamp: Option<DateTime<Utc>>,
    ) {
        if self.meta.session_id.is_none() {
            self.meta.session_id = session_id.map(str::to_owned);
        }
        if self.meta.cwd.is_none() {
            self.meta.cwd = cwd.map(str::to_owned);
        }
        if self.meta.version.is_none() {
            self.meta.version = version.map(str::to_owned);
        }
        if self.meta.git_branch.is_none() {
            self.meta.git_branch = git_branch.map(str::to_owned);
        }
        if let Some(ts) = timestamp {
            if self.meta.first_timestamp.is_none() {
                self.meta.first_timestamp = Some(ts);
            }
            self.meta.last_timestamp = Some(ts);
        }
    }
}

fn apply_usage(message: &mut ParsedMessage, usage: &Usage) {
    message.tokens_in = usage.input_tokens;
    message.tokens_out = usage.output_tokens;
    message.cache_read_tokens = usage.cache_read_input_tokens.unwrap_or(0);
    message.cache_write_tokens = usage.cache_creation_input_tokens.unwrap_or(0);
}

fn set_flags(message: &mut ParsedMessage, blocks: &[ParsedBlock]) {
    for block in blocks {
        match block.kind {
            BlockKind::Text => message.has_text = true,
            BlockKind::Thinking => message.has_thinking = true,
            BlockKind::ToolUse => message.has_tool_use = true,
            BlockKind::ToolResult => message.has_tool_result = true,
        }
    }
}

fn build_blocks_at(
    config: &ParserConfig,
    ordinal: i32,
    base_order: i32,
    content: &[ContentItem],
) -> Vec<ParsedBlock> {
    let mut blocks = Vec::new();
    let mut order = base_order;

    for item in content {
        let block = match item {
            ContentItem::Text { text } => ParsedBlock {
                message_ordinal: ordinal,
                block_order: order,
                kind: BlockKind::Text,
                content_text: Some(text.clone()),
                thinking_text: None,
                tool_name: None,
                tool_use_id: None,
                tool_input: None,
                tool_result_id: None,
                is_error: false,
                result_text: None,
                metadata: None,
            },
            ContentItem::Thinking { thinking } => ParsedBlock {
                message_ordinal: ordinal,
                block_order: order,
                kind: BlockKind::Thinking,
                content_text: None,
                thinking_text: Some(thinking.clone()),
                tool_name: None,
                tool_use_id: None,
                tool_input: None,
                tool_result_id: None,
                is_error: false,
                result_text: None,
                metadata: None,
            },
            ContentItem::ToolUse { id, name, input } => ParsedBlock {
                message_ordinal: ordinal,
                block_order: order,
                kind: BlockKind::ToolUse,
                content_text: None,
                thinking_text: None,
                tool_name: Some(name.clone()),
                tool_use_id: Some(id.clone()),
                tool_input: input.clone(),
                tool_result_id: None,
                is_error: false,
                result_text: None,
                metadata: None,
            },
            ContentItem::ToolResult {
                tool_use_id,
                content,
                is_error,
            } => {
                let (result_text, metadata) =
                    render_tool_result(content.as_ref(), config.max_inline_content_bytes);
                ParsedBlock {
                    message_ordinal: ordinal,
                    block_order: order,
                    kind: BlockKind::ToolResult,
                    content_text: None,
                    thinking_text: None,
                    tool_name: None,
                    tool_use_id: None,
                    tool_input: None,
                    tool_result_id: Some(tool_use_id.clone()),
                    is_error: *is_error,
                    result_text,
                    metadata,
                }
            }
            ContentItem::Unknown => continue,
        };
        blocks.push(block);
        order += 1;
    }

    blocks
}

/// Flatten a tool_result's content into text and truncate oversized results,
/// recording the original length so nothing is silently lost.
fn render_tool_result(content: Option<&Value>, max_bytes: usize) -> (Option<String>, Option<Value>) {
    let text = match content {
        None | Some(Value::Null) => return (None, None),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => {
            let parts: Vec<&str> = items
                .iter()
                .filter(|item| item.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|item| item.get("text").and_then(Value::as_str))
                .collect();
            parts.join("\n")
        }
        Some(other) => other.to_string(),
    };

    if text.len() > max_bytes {
        let original = text.len();
        let prefix = truncate_at_char_boundary(&text, max_bytes);
        let metadata = serde_json::json!({
            "truncated": true,
            "original_byte_length": original,
        });
        (Some(prefix.to_string()), Some(metadata))
    } else {
        (Some(text), None)
    }
}

fn truncate_at_char_boundary(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|ts| {
        DateTime::parse_from_rfc3339(ts)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> ParseOutcome {
        parse_transcript(text, &ParserConfig::default())
    }

    #[test]
    fn test_empty_transcript() {
        let outcome = parse("");
        assert!(outcome.messages.is_empty());
        assert!(outcome.blocks.is_empty());
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.stats.total_messages, 0);
    }

    #[test]
    fn test_invalid_json_collected_not_fatal() {
        let text = "not json at all\n{\"type\": \"user\", \"message\": {\"role\": \"user\", \"content\": \"hi\"}}";
        let outcome = parse(text);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].line_number, 1);
        assert_eq!(outcome.errors[0].message, "Invalid JSON");
        assert_eq!(outcome.messages.len(), 1);
    }

    #[test]
    fn test_missing_type_field() {
        let outcome = parse("{\"message\": {}}");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].message, "Missing type field");
    }

    #[test]
    fn test_unknown_line_type() {
        let outcome = parse("{\"type\": \"telemetry\"}");
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].message, "Unknown line type");
    }

    #[test]
    fn test_ignored_line_types_are_silent() {
        let text = [
            "{\"type\": \"progress\", \"sessionId\": \"s\"}",
            "{\"type\": \"file-history-snapshot\"}",
            "{\"type\": \"queue-operation\"}",
        ]
        .join("\n");
        let outcome = parse(&text);
        assert!(outcome.messages.is_empty());
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_oversized_line_skipped() {
        let config = ParserConfig {
            max_line_bytes: 64,
            ..ParserConfig::default()
        };
        let big = format!("{{\"type\": \"user\", \"pad\": \"{}\"}}", "x".repeat(100));
        let outcome = parse_transcript(&big, &config);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].message, "Line exceeds max size");
        assert!(outcome.messages.is_empty());
    }

    #[test]
    fn test_assistant_streaming_group_merges() {
        let text = [
            r#"{"type": "assistant", "timestamp": "2026-03-01T10:00:00Z", "message": {"id": "msg_1", "role": "assistant", "model": "m", "content": [{"type": "thinking", "thinking": "hmm"}], "usage": {"input_tokens": 10, "output_tokens": 1}}}"#,
            r#"{"type": "assistant", "timestamp": "2026-03-01T10:00:01Z", "message": {"id": "msg_1", "role": "assistant", "model": "m", "content": [{"type": "text", "text": "answer"}], "usage": {"input_tokens": 10, "output_tokens": 25, "cache_read_input_tokens": 5}}}"#,
            r#"{"type": "assistant", "timestamp": "2026-03-01T10:00:02Z", "message": {"id": "msg_2", "role": "assistant", "model": "m", "content": [{"type": "text", "text": "next"}], "usage": {"input_tokens": 3, "output_tokens": 4}}}"#,
        ]
        .join("\n");

        let outcome = parse(&text);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.messages.len(), 2);

        let first = &outcome.messages[0];
        assert_eq!(first.ordinal, 0);
        // Usage from the last line of the group.
        assert_eq!(first.tokens_out, 25);
        assert_eq!(first.cache_read_tokens, 5);
        assert!(first.has_thinking);
        assert!(first.has_text);

        let first_blocks: Vec<_> = outcome
            .blocks
            .iter()
            .filter(|b| b.message_ordinal == 0)
            .collect();
        assert_eq!(first_blocks.len(), 2);
        assert_eq!(first_blocks[0].kind, BlockKind::Thinking);
        assert_eq!(first_blocks[1].kind, BlockKind::Text);
        assert_eq!(first_blocks[1].block_order, 1);

        assert_eq!(outcome.messages[1].ordinal, 1);
        assert_eq!(outcome.messages[1].tokens_out, 4);
    }

    #[test]
    fn test_user_line_breaks_assistant_group() {
        let text = [
            r#"{"type": "assistant", "message": {"id": "msg_1", "content": [{"type": "text", "text": "a"}]}}"#,
            r#"{"type": "user", "message": {"role": "user", "content": "q"}}"#,
            r#"{"type": "assistant", "message": {"id": "msg_1", "content": [{"type": "text", "text": "b"}]}}"#,
        ]
        .join("\n");

        let outcome = parse(&text);
        // Same provider id, but not consecutive: three logical messages.
        assert_eq!(outcome.messages.len(), 3);
    }

    #[test]
    fn test_string_content_single_text_block() {
        let outcome = parse(r#"{"type": "user", "message": {"role": "user", "content": "plain"}}"#);
        assert_eq!(outcome.messages.len(), 1);
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(outcome.blocks[0].kind, BlockKind::Text);
        assert_eq!(outcome.blocks[0].content_text.as_deref(), Some("plain"));
    }

    #[test]
    fn test_null_content_no_blocks() {
        let outcome = parse(r#"{"type": "user", "message": {"role": "user", "content": null}}"#);
        assert_eq!(outcome.messages.len(), 1);
        assert!(outcome.blocks.is_empty());
        assert!(!outcome.messages[0].has_text);
    }

    #[test]
    fn test_tool_result_truncation() {
        let config = ParserConfig {
            max_inline_content_bytes: 16,
            ..ParserConfig::default()
        };
        let payload = "y".repeat(64);
        let text = format!(
            r#"{{"type": "user", "message": {{"role": "user", "content": [{{"type": "tool_result", "tool_use_id": "toolu_1", "content": "{}"}}]}}}}"#,
            payload
        );
        let outcome = parse_transcript(&text, &config);

        assert_eq!(outcome.blocks.len(), 1);
        let block = &outcome.blocks[0];
        assert_eq!(block.kind, BlockKind::ToolResult);
        assert_eq!(block.result_text.as_ref().unwrap().len(), 16);
        let meta = block.metadata.as_ref().unwrap();
        assert_eq!(meta["truncated"], true);
        assert_eq!(meta["original_byte_length"], 64);
    }

    #[test]
    fn test_tool_result_array_content_joined() {
        let text = r#"{"type": "user", "message": {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "t1", "content": [{"type": "text", "text": "one"}, {"type": "text", "text": "two"}], "is_error": true}]}}"#;
        let outcome = parse(text);
        let block = &outcome.blocks[0];
        assert_eq!(block.result_text.as_deref(), Some("one\ntwo"));
        assert!(block.is_error);
        assert_eq!(block.tool_result_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_stats_and_metadata() {
        let text = [
            r#"{"type": "user", "sessionId": "cc-A", "cwd": "/w", "version": "2.1.0", "gitBranch": "main", "timestamp": "2026-03-01T10:00:00Z", "message": {"role": "user", "content": "do the thing"}}"#,
            r#"{"type": "assistant", "timestamp": "2026-03-01T10:00:05Z", "message": {"id": "m1", "model": "claude-sonnet-4", "content": [{"type": "thinking", "thinking": "t"}, {"type": "tool_use", "id": "toolu_1", "name": "Task", "input": {}}], "usage": {"input_tokens": 1000, "output_tokens": 500, "cache_read_input_tokens": 200, "cache_creation_input_tokens": 100}}}"#,
            r#"{"type": "user", "timestamp": "2026-03-01T10:00:09Z", "message": {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "toolu_1", "content": "done"}]}}"#,
            r#"{"type": "assistant", "timestamp": "2026-03-01T10:01:00Z", "message": {"id": "m2", "model": "claude-sonnet-4", "content": [{"type": "text", "text": "all done"}], "usage": {"input_tokens": 2000, "output_tokens": 100}}}"#,
        ]
        .join("\n");

        let outcome = parse(&text);
        assert!(outcome.errors.is_empty());

        let stats = &outcome.stats;
        assert_eq!(stats.total_messages, 4);
        assert_eq!(stats.user_messages, 2);
        assert_eq!(stats.assistant_messages, 2);
        assert_eq!(stats.tokens_in, 3000);
        assert_eq!(stats.tokens_out, 600);
        assert_eq!(stats.cache_read_tokens, 200);
        assert_eq!(stats.cache_write_tokens, 100);
        assert_eq!(stats.tool_use_count, 1);
        assert_eq!(stats.subagent_count, 1);
        assert_eq!(stats.thinking_blocks, 1);
        assert_eq!(stats.duration_ms, Some(60_000));
        assert_eq!(stats.initial_prompt.as_deref(), Some("do the thing"));

        // 3000 in + 600 out + 200 cache read + 100 cache write.
        let expected_cost = (3000.0 * 3.0 + 600.0 * 15.0 + 200.0 * 0.30 + 100.0 * 3.75) / 1e6;
        assert!((stats.cost_estimate_usd - expected_cost).abs() < 1e-12);

        let meta = &outcome.metadata;
        assert_eq!(meta.session_id.as_deref(), Some("cc-A"));
        assert_eq!(meta.cwd.as_deref(), Some("/w"));
        assert_eq!(meta.version.as_deref(), Some("2.1.0"));
        assert_eq!(meta.git_branch.as_deref(), Some("main"));
        assert!(meta.first_timestamp.is_some());
        assert!(meta.last_timestamp.is_some());
    }

    #[test]
    fn test_summary_and_system_lines() {
        let text = [
            r#"{"type": "summary", "summary": "Fixed the flaky test"}"#,
            r#"{"type": "system", "content": "compaction checkpoint", "timestamp": "2026-03-01T10:00:00Z"}"#,
        ]
        .join("\n");
        let outcome = parse(&text);
        assert_eq!(outcome.messages.len(), 2);
        assert_eq!(outcome.messages[0].message_type, MessageType::Summary);
        assert_eq!(outcome.messages[1].message_type, MessageType::System);
        // Neither counts toward user/assistant tallies.
        assert_eq!(outcome.stats.user_messages, 0);
        assert_eq!(outcome.stats.assistant_messages, 0);
        assert_eq!(outcome.stats.total_messages, 2);
    }

    #[test]
    fn test_line_numbers_are_one_based_source_positions() {
        let text = [
            "",
            r#"{"type": "user", "message": {"role": "user", "content": "hi"}}"#,
            "garbage",
        ]
        .join("\n");
        let outcome = parse(&text);
        assert_eq!(outcome.messages[0].line_number, 2);
        assert_eq!(outcome.errors[0].line_number, 3);
    }
}
