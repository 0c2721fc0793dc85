use httpmock::Method::{GET, POST};
use httpmock::MockServer;
use serde_json::json;

use restaurant_crew::error::CrewError;
use restaurant_crew::google::forms::FormData;
use restaurant_crew::google::{load_token, save_token, Authenticator, FormsClient, GoogleToken};
use restaurant_crew::services::survey::summarize_responses;

fn client(server: &MockServer) -> FormsClient {
    FormsClient::new(Authenticator::with_static_token("static-token"))
        .with_base_urls(&server.url("/v1"), &server.url("/drive/v3"))
}

fn answer(question: &str, value: &str) -> serde_json::Value {
    json!({ question: { "questionId": question, "textAnswers": { "answers": [{ "value": value }] } } })
}

#[tokio::test]
async fn responses_are_fetched_across_pages_and_summarized() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/forms/F1")
                .header("authorization", "Bearer static-token");
            then.status(200).json_body(json!({
                "formId": "F1",
                "info": {"title": "Restaurant Recommendation Survey - 2026-10-16"},
                "items": [{"title": "Which recommended restaurant do you like best?"}]
            }));
        })
        .await;
    let second_page = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/forms/F1/responses")
                .query_param("pageToken", "next-1");
            then.status(200).json_body(json!({
                "responses": [{"answers": answer("q1", "[2] Imun Seolnongtang")}]
            }));
        })
        .await;
    let first_page = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v1/forms/F1/responses")
                .query_param_missing("pageToken");
            then.status(200).json_body(json!({
                "responses": [
                    {"answers": answer("q1", "[1] Tosokchon Samgyetang")},
                    {"answers": answer("q2", "The broth was excellent but the wait was long")}
                ],
                "nextPageToken": "next-1"
            }));
        })
        .await;

    let form: FormData = client(&server).fetch_form_data("F1").await.unwrap();
    first_page.assert_async().await;
    second_page.assert_async().await;
    assert_eq!(form.total_responses, 3);
    assert_eq!(form.title, "Restaurant Recommendation Survey - 2026-10-16");
    assert_eq!(form.questions.len(), 1);

    let summary = summarize_responses(&form);
    assert_eq!(summary.total_responses, 3);
    assert_eq!(summary.restaurant_preferences["[1] Tosokchon Samgyetang"], 1);
    assert_eq!(summary.restaurant_preferences["[2] Imun Seolnongtang"], 1);
    assert_eq!(
        summary.feedback_comments,
        vec!["The broth was excellent but the wait was long".to_string()]
    );
}

#[tokio::test]
async fn rejected_credentials_map_to_auth_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/forms/F2");
            then.status(403).body("insufficient scopes");
        })
        .await;

    let err = client(&server).get_form("F2").await.unwrap_err();
    assert!(matches!(err, CrewError::Auth(ref m) if m.contains("insufficient scopes")));
}

#[tokio::test]
async fn sharing_does_not_notify_by_email() {
    let server = MockServer::start_async().await;
    let share = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/drive/v3/files/F3/permissions")
                .query_param("sendNotificationEmail", "false")
                .json_body(json!({"type": "user", "role": "writer", "emailAddress": "lead@example.com"}));
            then.status(200).json_body(json!({"id": "perm-1"}));
        })
        .await;

    client(&server)
        .share_form("F3", &["lead@example.com".to_string()])
        .await
        .unwrap();
    share.assert_async().await;
}

#[tokio::test]
async fn expired_token_is_refreshed_and_saved() {
    let server = MockServer::start_async().await;
    let refresh = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/token")
                .body_includes("grant_type=refresh_token")
                .body_includes("refresh_token=refresh-1");
            then.status(200)
                .json_body(json!({"access_token": "fresh-token", "expires_in": 3600}));
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let stale = GoogleToken {
        token: "stale-token".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        token_uri: server.url("/token"),
        client_id: "client-1".to_string(),
        client_secret: Some("secret".to_string()),
        scopes: Vec::new(),
        expiry: Some("2020-01-01T00:00:00Z".to_string()),
        account: None,
    };
    save_token(&token_path, &stale).unwrap();

    let auth = Authenticator::oauth(token_path.clone(), None);
    assert_eq!(auth.access_token().await.unwrap(), "fresh-token");
    // Cached after the first refresh.
    assert_eq!(auth.access_token().await.unwrap(), "fresh-token");
    refresh.assert_hits_async(1).await;

    let saved = load_token(&token_path).unwrap();
    assert_eq!(saved.token, "fresh-token");
    assert_eq!(saved.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn expired_token_without_consent_credentials_fails() {
    let dir = tempfile::tempdir().unwrap();
    let token_path = dir.path().join("token.json");
    let stale = GoogleToken {
        token: "stale".to_string(),
        refresh_token: None,
        token_uri: "http://127.0.0.1:9/token".to_string(),
        client_id: "client-1".to_string(),
        client_secret: None,
        scopes: Vec::new(),
        expiry: None,
        account: None,
    };
    save_token(&token_path, &stale).unwrap();

    let err = Authenticator::oauth(token_path, None)
        .access_token()
        .await
        .unwrap_err();
    assert!(matches!(err, CrewError::Auth(_)));
}
