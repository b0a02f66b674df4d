//! End-to-end parse of a realistic multi-turn transcript built with the
//! shared fixtures.

use tracehub_parser::{BlockKind, MessageType, ParserConfig, parse_transcript};
use tracehub_testing::TranscriptBuilder;

#[test]
fn test_multi_turn_session() {
    let body = TranscriptBuilder::new()
        .session_id("cc-full-1")
        .user_text("2026-03-01T09:00:00Z", "add retry logic to the uploader")
        .assistant_tool_use(
            "2026-03-01T09:00:05Z",
            "m1",
            "Read",
            serde_json::json!({"file_path": "src/upload.rs"}),
        )
        .raw_line(
            r#"{"type": "user", "timestamp": "2026-03-01T09:00:08Z", "message": {"role": "user", "content": [{"type": "tool_result", "tool_use_id": "toolu_1", "content": "fn upload() {}"}]}}"#,
        )
        .assistant_text(
            "2026-03-01T09:01:00Z",
            "m2",
            "Added exponential backoff to the uploader.",
            1200,
            340,
        )
        .build();

    let outcome = parse_transcript(&body, &ParserConfig::default());

    assert!(outcome.errors.is_empty(), "errors: {:?}", outcome.errors);
    assert_eq!(outcome.stats.total_messages, 4);
    assert_eq!(outcome.stats.user_messages, 2);
    assert_eq!(outcome.stats.assistant_messages, 2);
    assert_eq!(outcome.stats.tool_use_count, 1);
    assert_eq!(outcome.stats.duration_ms, Some(60_000));
    assert_eq!(
        outcome.stats.initial_prompt.as_deref(),
        Some("add retry logic to the uploader")
    );
    assert_eq!(outcome.metadata.session_id.as_deref(), Some("cc-full-1"));

    // Ordinals are dense and blocks point at real messages.
    for (index, message) in outcome.messages.iter().enumerate() {
        assert_eq!(message.ordinal as usize, index);
    }
    for block in &outcome.blocks {
        assert!(outcome
            .messages
            .iter()
            .any(|m| m.ordinal == block.message_ordinal));
    }

    // The tool call and its result kept their linkage fields.
    let tool_use = outcome
        .blocks
        .iter()
        .find(|b| b.kind == BlockKind::ToolUse)
        .expect("tool use block");
    assert_eq!(tool_use.tool_name.as_deref(), Some("Read"));

    let tool_result = outcome
        .blocks
        .iter()
        .find(|b| b.kind == BlockKind::ToolResult)
        .expect("tool result block");
    assert_eq!(tool_result.result_text.as_deref(), Some("fn upload() {}"));

    let final_answer = outcome
        .messages
        .iter()
        .rev()
        .find(|m| m.message_type == MessageType::Assistant)
        .expect("assistant message");
    assert_eq!(final_answer.tokens_in, 1200);
    assert_eq!(final_answer.tokens_out, 340);
}

#[test]
fn test_mixed_good_and_bad_lines() {
    let body = TranscriptBuilder::new()
        .user_text("2026-03-01T09:00:00Z", "hello")
        .raw_line("this is not json")
        .raw_line(r#"{"no_type_field": true}"#)
        .raw_line(r#"{"type": "progress", "data": {}}"#)
        .assistant_text("2026-03-01T09:00:10Z", "m1", "hi there", 10, 5)
        .build();

    let outcome = parse_transcript(&body, &ParserConfig::default());

    assert_eq!(outcome.messages.len(), 2);
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(outcome.errors[0].message, "Invalid JSON");
    assert_eq!(outcome.errors[1].message, "Missing type field");
}
