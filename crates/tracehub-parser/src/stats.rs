use serde::{Deserialize, Serialize};

use crate::output::{BlockKind, MessageType, ParsedBlock, ParsedMessage, TranscriptMeta};

// Pricing in USD per million tokens.
pub const PRICE_PER_MTOK_INPUT: f64 = 3.0;
pub const PRICE_PER_MTOK_OUTPUT: f64 = 15.0;
pub const PRICE_PER_MTOK_CACHE_READ: f64 = 0.30;
pub const PRICE_PER_MTOK_CACHE_WRITE: f64 = 3.75;

const INITIAL_PROMPT_MAX_CHARS: usize = 1000;

/// Per-message cost estimate from the pricing table.
pub(crate) fn message_cost_usd(
    tokens_in: i64,
    tokens_out: i64,
    cache_read: i64,
    cache_write: i64,
) -> f64 {
    (tokens_in as f64 * PRICE_PER_MTOK_INPUT
        + tokens_out as f64 * PRICE_PER_MTOK_OUTPUT
        + cache_read as f64 * PRICE_PER_MTOK_CACHE_READ
        + cache_write as f64 * PRICE_PER_MTOK_CACHE_WRITE)
        / 1_000_000.0
}

/// Aggregate statistics across a parsed transcript. Mirrors the derived stat
/// columns on the session row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_messages: i32,
    pub user_messages: i32,
    pub assistant_messages: i32,
    pub tokens_in: i64,
    pub tokens_out: i64,
    pub cache_read_tokens: i64,
    pub cache_write_tokens: i64,
    pub tool_use_count: i32,
    pub subagent_count: i32,
    pub thinking_blocks: i32,
    pub duration_ms: Option<i64>,
    pub cost_estimate_usd: f64,
    pub initial_prompt: Option<String>,
}

pub(crate) fn aggregate(
    messages: &[ParsedMessage],
    blocks: &[ParsedBlock],
    meta: &TranscriptMeta,
) -> SessionStats {
    let mut stats = SessionStats::default();

    for message in messages {
        stats.total_messages += 1;
        match message.message_type {
            MessageType::User => stats.user_messages += 1,
            MessageType::Assistant => stats.assistant_messages += 1,
            MessageType::System | MessageType::Summary => {}
        }
        stats.tokens_in += message.tokens_in;
        stats.tokens_out += message.tokens_out;
        stats.cache_read_tokens += message.cache_read_tokens;
        stats.cache_write_tokens += message.cache_write_tokens;
        stats.cost_estimate_usd += message.cost_usd;
    }

    for block in blocks {
        match block.kind {
            BlockKind::ToolUse => {
                stats.tool_use_count += 1;
                if block.tool_name.as_deref() == Some("Task") {
                    stats.subagent_count += 1;
                }
            }
            BlockKind::Thinking => stats.thinking_blocks += 1,
            BlockKind::Text | BlockKind::ToolResult => {}
        }
    }

    stats.duration_ms = match (meta.first_timestamp, meta.last_timestamp) {
        (Some(first), Some(last)) => Some((last - first).num_milliseconds()),
        _ => None,
    };

    stats.initial_prompt = initial_prompt(messages, blocks);

    stats
}

/// Text of the first user message's first text block, truncated to 1000
/// characters with a `...` suffix. None when the session has no user message
/// or its first user message carries no text block.
fn initial_prompt(messages: &[ParsedMessage], blocks: &[ParsedBlock]) -> Option<String> {
    let first_user = messages
        .iter()
        .find(|m| m.message_type == MessageType::User)?;

    let text = blocks
        .iter()
        .filter(|b| b.message_ordinal == first_user.ordinal)
        .find(|b| b.kind == BlockKind::Text)
        .and_then(|b| b.content_text.as_deref())?;

    if text.chars().count() > INITIAL_PROMPT_MAX_CHARS {
        let truncated: String = text.chars().take(INITIAL_PROMPT_MAX_CHARS).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_cost_matches_pricing_table() {
        // 1M of each bucket: 3 + 15 + 0.30 + 3.75
        let cost = message_cost_usd(1_000_000, 1_000_000, 1_000_000, 1_000_000);
        assert!((cost - 22.05).abs() < 1e-9);

        // Output dominates.
        let cost = message_cost_usd(0, 2_000_000, 0, 0);
        assert!((cost - 30.0).abs() < 1e-9);

        assert_eq!(message_cost_usd(0, 0, 0, 0), 0.0);
    }

    #[test]
    fn test_initial_prompt_truncation() {
        let long = "x".repeat(1500);
        let messages = vec![ParsedMessage {
            line_number: 1,
            ordinal: 0,
            message_type: MessageType::User,
            role: Some("user".to_string()),
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
            raw_message: serde_json::json!({}),
            metadata: None,
        }];
        let blocks = vec![ParsedBlock {
            message_ordinal: 0,
            block_order: 0,
            kind: BlockKind::Text,
            content_text: Some(long),
            thinking_text: None,
            tool_name: None,
            tool_use_id: None,
            tool_input: None,
            tool_result_id: None,
            is_error: false,
            result_text: None,
            metadata: None,
        }];

        let prompt = initial_prompt(&messages, &blocks).unwrap();
        assert_eq!(prompt.chars().count(), 1003);
        assert!(prompt.ends_with("..."));
    }

    #[test]
    fn test_initial_prompt_none_without_text_block() {
        let messages = vec![ParsedMessage {
            line_number: 1,
            ordinal: 0,
            message_type: MessageType::User,
            role: Some("user".to_string()),
            model: None,
            tokens_in: 0,
            tokens_out: 0,
            cache_read_tokens: 0,
            cache_write_tokens: 0,
            cost_usd: 0.0,
            timestamp: None,
            has_text: false,
            has_thinking: false,
            has_tool_use: false,
            has_tool_result: true,
            raw_message: serde_json::json!({}),
            metadata: None,
        }];
        let blocks = vec![ParsedBlock {
            message_ordinal: 0,
            block_order: 0,
            kind: BlockKind::ToolResult,
            content_text: None,
            thinking_text: None,
            tool_name: None,
            tool_use_id: None,
            tool_input: None,
            tool_result_id: Some("toolu_1".to_string()),
            is_error: false,
            result_text: Some("ok".to_string()),
            metadata: None,
        }];

        assert!(initial_prompt(&messages, &blocks).is_none());
    }
}
