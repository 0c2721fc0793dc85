use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;

use restaurant_crew::interfaces::tools::Tool;
use restaurant_crew::tools::{CodeExecutionTool, SearchInternetTool};

#[tokio::test]
async fn search_posts_query_with_api_key_and_formats_hits() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/search")
                .header("x-api-key", "serper-key")
                .json_body(json!({"q": "Gwanghwamun samgyetang", "num": 3, "gl": "kr"}));
            then.status(200).json_body(json!({
                "organic": [
                    {"title": "Tosokchon", "link": "https://tosokchon.example", "snippet": "Ginseng chicken soup"},
                    {"title": "Imun", "link": "https://imun.example", "snippet": "Seolnongtang"}
                ]
            }));
        })
        .await;

    let tool = SearchInternetTool::new();
    tool.configure(&json!({
        "tools": {"search_internet": {
            "api_key": "serper-key",
            "endpoint": server.url("/search"),
            "num_results": 3,
            "locale": "kr"
        }}
    }))
    .unwrap();

    let out = tool
        .execute(json!({"query": "Gwanghwamun samgyetang"}))
        .await
        .unwrap();
    mock.assert_async().await;
    assert_eq!(out["status"], json!("success"));
    let text = out["result"].as_str().unwrap();
    assert!(text.contains("[1] Tosokchon\nhttps://tosokchon.example\nGinseng chicken soup"));
    assert!(text.contains("[2] Imun"));
}

#[tokio::test]
async fn search_failures_come_back_as_error_payloads() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/search");
            then.status(403).body("bad key");
        })
        .await;

    let tool = SearchInternetTool::new();
    tool.configure(&json!({
        "tools": {"search_internet": {"api_key": "k", "endpoint": server.url("/search")}}
    }))
    .unwrap();

    let out = tool.execute(json!({"query": "x"})).await.unwrap();
    assert_eq!(out["status"], json!("error"));
    assert_eq!(out["message"], json!("Failed to search: 403"));
    assert_eq!(out["details"], json!("bad key"));
}

#[tokio::test]
async fn code_execution_runs_the_configured_interpreter() {
    let tool = CodeExecutionTool::new();
    tool.configure(&json!({
        "tools": {"execute_code": {"interpreter": "sh", "args": ["-s"], "timeout_secs": 5}}
    }))
    .unwrap();

    let out = tool
        .execute(json!({"code": "echo votes=$((12 + 8 + 5))"}))
        .await
        .unwrap();
    assert_eq!(out["status"], json!("success"));
    assert!(out["stdout"].as_str().unwrap().contains("votes=25"));
}

#[test]
fn tool_schemas_are_function_shaped() {
    let search = SearchInternetTool::new();
    let schema = search.schema();
    assert_eq!(schema["type"], json!("function"));
    assert_eq!(schema["name"], json!("search_internet"));
    assert_eq!(schema["parameters"]["required"], json!(["query"]));
    assert_eq!(CodeExecutionTool::new().name(), "execute_code");
}
