use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;

use restaurant_crew::error::CrewError;
use restaurant_crew::interfaces::providers::LlmProvider;
use restaurant_crew::providers::openai::OpenAiProvider;

fn provider(server: &MockServer) -> OpenAiProvider {
    OpenAiProvider::new(
        "test-key".to_string(),
        Some("gemini-2.0-flash".to_string()),
        Some(server.url("/v1beta/openai")),
    )
}

#[tokio::test]
async fn text_completion_sends_system_and_user_messages() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/openai/chat/completions")
                .header("authorization", "Bearer test-key")
                .body_includes("\"model\":\"gemini-2.0-flash\"")
                .body_includes("You are a curator")
                .body_includes("find bibimbap");
            then.status(200).json_body(json!({
                "choices": [{"message": {"role": "assistant", "content": "Try Gogung."}}]
            }));
        })
        .await;

    let text = provider(&server)
        .generate_text("find bibimbap", "You are a curator", None)
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(text, "Try Gogung.");
}

#[tokio::test]
async fn tool_calls_are_parsed_from_the_response() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1beta/openai/chat/completions")
                .body_includes("\"name\":\"search_internet\"");
            then.status(200).json_body(json!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "search_internet",
                            "arguments": "{\"query\":\"Gwanghwamun gukbap\"}"
                        }
                    }]
                }}]
            }));
        })
        .await;

    let tools = vec![json!({
        "type": "function",
        "name": "search_internet",
        "description": "web search",
        "parameters": {"type": "object", "properties": {"query": {"type": "string"}}}
    })];
    let response = provider(&server)
        .generate_with_tools("research", "", tools)
        .await
        .unwrap();
    assert!(response.text.is_empty());
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].name, "search_internet");
    assert_eq!(
        response.tool_calls[0].arguments,
        json!({"query": "Gwanghwamun gukbap"})
    );
}

#[tokio::test]
async fn error_status_is_an_http_error() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/v1beta/openai/chat/completions");
            then.status(429).body("quota exceeded");
        })
        .await;

    let err = provider(&server)
        .generate_text("x", "", None)
        .await
        .unwrap_err();
    // No retries.
    mock.assert_hits_async(1).await;
    match err {
        CrewError::Http(message) => {
            assert!(message.contains("429"));
            assert!(message.contains("quota exceeded"));
        }
        other => panic!("expected http error, got {other}"),
    }
}

#[tokio::test]
async fn empty_content_is_a_runtime_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1beta/openai/chat/completions");
            then.status(200)
                .json_body(json!({"choices": [{"message": {"role": "assistant"}}]}));
        })
        .await;

    let err = provider(&server)
        .generate_text("x", "", None)
        .await
        .unwrap_err();
    assert!(matches!(err, CrewError::Runtime(_)));
}
