//! Wire-level tests for the Anthropic summary client against a mock server.

use tracehub_pipeline::{AnthropicModel, SummaryConfig, SummaryModel};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_with_key() -> SummaryConfig {
    SummaryConfig {
        enabled: true,
        api_key: Some("sk-test-key".to_string()),
        model: "claude-3-5-haiku-latest".to_string(),
        temperature: 0.2,
        max_output_tokens: 256,
    }
}

#[tokio::test]
async fn test_complete_extracts_text_content() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-test-key"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "msg_01",
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": "Fixed the retry loop and added tests."}],
            "model": "claude-3-5-haiku-latest",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 120, "output_tokens": 14}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let model = AnthropicModel::new(server.uri());
    let summary = model
        .complete(&config_with_key(), "User: fix the retry loop")
        .await
        .unwrap();

    assert_eq!(summary, "Fixed the retry loop and added tests.");
}

#[tokio::test]
async fn test_complete_surfaces_http_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "type": "error",
            "error": {"type": "rate_limit_error", "message": "slow down"}
        })))
        .mount(&server)
        .await;

    let model = AnthropicModel::new(server.uri());
    let error = model
        .complete(&config_with_key(), "prompt")
        .await
        .unwrap_err();

    assert!(error.contains("429"), "got: {}", error);
}

#[tokio::test]
async fn test_complete_rejects_bodies_without_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "content": []
        })))
        .mount(&server)
        .await;

    let model = AnthropicModel::new(server.uri());
    let error = model
        .complete(&config_with_key(), "prompt")
        .await
        .unwrap_err();

    assert!(error.contains("no text content"), "got: {}", error);
}
