use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tabqa_core::provider::{LlmProvider, ProviderCallError, StopReason};
use tabqa_core::types::{Message, ToolCallResult};
use tabqa_provider_claude::ClaudeProvider;

#[tokio::test]
async fn test_text_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("anthropic-version", "2023-06-01"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "Hello from Claude!" }],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 10, "output_tokens": 5 }
        })))
        .mount(&server)
        .await;

    let provider = ClaudeProvider::new("test-key", "claude-3-5-haiku-20241022", Some(&server.uri()));
    let result = provider
        .complete(&[Message::user("Hi")], &[])
        .await
        .unwrap();

    assert_eq!(result.content, "Hello from Claude!");
    assert!(result.tool_calls.is_empty());
    assert_eq!(result.stop_reason, StopReason::EndTurn);
    assert_eq!(result.usage.input_tokens, 10);
    assert_eq!(result.usage.output_tokens, 5);
    assert_eq!(result.usage.total_tokens, 15);
}

#[tokio::test]
async fn test_tool_use_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [
                { "type": "text", "text": "Let me check the file." },
                {
                    "type": "tool_use",
                    "id": "toolu_01",
                    "name": "query_table",
                    "input": { "file_path": "studies.csv", "query": "age > 60" }
                }
            ],
            "stop_reason": "tool_use",
            "usage": { "input_tokens": 30, "output_tokens": 25 }
        })))
        .mount(&server)
        .await;

    let provider = ClaudeProvider::new("test-key", "claude-3-5-haiku-20241022", Some(&server.uri()));
    let result = provider
        .complete(&[Message::user("filter by age")], &[])
        .await
        .unwrap();

    assert_eq!(result.content, "Let me check the file.");
    assert_eq!(result.stop_reason, StopReason::ToolUse);
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].id, "toolu_01");
    assert_eq!(result.tool_calls[0].name, "query_table");
    assert_eq!(result.tool_calls[0].arguments["query"], "age > 60");
}

#[tokio::test]
async fn test_transcript_round_trip_includes_tool_results() {
    // The request body must carry tool_use/tool_result blocks so the model
    // sees its own earlier calls.
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(wiremock::matchers::body_partial_json(json!({
            "messages": [
                { "role": "user", "content": "q" },
                {
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": "toolu_01",
                        "is_error": false
                    }]
                }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "21 records." }],
            "stop_reason": "end_turn",
            "usage": { "input_tokens": 50, "output_tokens": 8 }
        })))
        .mount(&server)
        .await;

    let provider = ClaudeProvider::new("test-key", "claude-3-5-haiku-20241022", Some(&server.uri()));
    let transcript = vec![
        Message::user("q"),
        Message::tool_result(ToolCallResult {
            tool_call_id: "toolu_01".into(),
            content: "{\"success\":true,\"num_rows\":21}".into(),
            is_error: false,
        }),
    ];

    let result = provider.complete(&transcript, &[]).await.unwrap();
    assert_eq!(result.content, "21 records.");
}

#[tokio::test]
async fn test_max_tokens_stop_reason() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "partial" }],
            "stop_reason": "max_tokens",
            "usage": { "input_tokens": 10, "output_tokens": 4096 }
        })))
        .mount(&server)
        .await;

    let provider = ClaudeProvider::new("test-key", "claude-3-5-haiku-20241022", Some(&server.uri()));
    let result = provider.complete(&[Message::user("q")], &[]).await.unwrap();

    assert_eq!(result.stop_reason, StopReason::MaxTokens);
}

#[tokio::test]
async fn test_http_error_carries_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid x-api-key"))
        .mount(&server)
        .await;

    let provider = ClaudeProvider::new("bad-key", "claude-3-5-haiku-20241022", Some(&server.uri()));
    let err = provider
        .complete(&[Message::user("q")], &[])
        .await
        .unwrap_err();

    let call_error = err.downcast_ref::<ProviderCallError>().unwrap();
    assert_eq!(call_error.status, Some(401));
}
