use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::error::{CrewError, Result};
use crate::interfaces::tools::Tool;

const SERPER_ENDPOINT: &str = "https://google.serper.dev/search";

#[derive(Debug, Clone)]
struct SearchInternetState {
    api_key: Option<String>,
    endpoint: String,
    num_results: u64,
    locale: Option<String>,
}

impl Default for SearchInternetState {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: SERPER_ENDPOINT.to_string(),
            num_results: 8,
            locale: None,
        }
    }
}

/// Web search through the Serper API.
pub struct SearchInternetTool {
    state: Mutex<SearchInternetState>,
    http: Client,
}

impl Default for SearchInternetTool {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchInternetTool {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(SearchInternetState::default()),
            http: Client::new(),
        }
    }

    fn snapshot(&self) -> SearchInternetState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    fn extract_query(params: &Value) -> Option<String> {
        params
            .get("query")
            .or_else(|| params.get("search_query"))
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .filter(|v| !v.trim().is_empty())
    }

    fn format_results(data: &Value, limit: usize) -> String {
        let mut out = String::new();
        if let Some(answer) = data
            .get("answerBox")
            .and_then(|b| b.get("answer").or_else(|| b.get("snippet")))
            .and_then(|v| v.as_str())
        {
            out.push_str(&format!("Answer: {answer}\n\n"));
        }
        let organic = data
            .get("organic")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        for (idx, item) in organic.iter().take(limit).enumerate() {
            let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("");
            let link = item.get("link").and_then(|v| v.as_str()).unwrap_or("");
            let snippet = item.get("snippet").and_then(|v| v.as_str()).unwrap_or("");
            out.push_str(&format!("[{}] {title}\n{link}\n{snippet}\n\n", idx + 1));
        }
        out.trim_end().to_string()
    }
}

#[async_trait]
impl Tool for SearchInternetTool {
    fn name(&self) -> &str {
        "search_internet"
    }

    fn description(&self) -> &str {
        "Search the web for current information about places, prices, ratings and opening hours."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                }
            },
            "required": ["query"]
        })
    }

    fn configure(&self, config: &Value) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CrewError::Runtime("Failed to lock tool state".to_string()))?;
        let Some(tool_cfg) = config.get("tools").and_then(|t| t.get("search_internet")) else {
            return Ok(());
        };
        if let Some(api_key) = tool_cfg.get("api_key").and_then(|v| v.as_str()) {
            state.api_key = Some(api_key.to_string()).filter(|k| !k.trim().is_empty());
        }
        if let Some(endpoint) = tool_cfg.get("endpoint").and_then(|v| v.as_str()) {
            state.endpoint = endpoint.to_string();
        }
        if let Some(num) = tool_cfg.get("num_results").and_then(|v| v.as_u64()) {
            state.num_results = num.max(1);
        }
        if let Some(locale) = tool_cfg.get("locale").and_then(|v| v.as_str()) {
            state.locale = Some(locale.to_string());
        }
        Ok(())
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let Some(query) = Self::extract_query(&params) else {
            return Ok(json!({
                "status": "error",
                "message": "query is required"
            }));
        };
        let state = self.snapshot();
        let Some(api_key) = state.api_key.clone() else {
            return Ok(json!({
                "status": "error",
                "message": "API key not configured",
            }));
        };

        let mut payload = json!({ "q": query, "num": state.num_results });
        if let Some(locale) = &state.locale {
            payload["gl"] = json!(locale);
        }

        let response = self
            .http
            .post(&state.endpoint)
            .header("X-API-KEY", api_key)
            .json(&payload)
            .send()
            .await;
        let response = match response {
            Ok(resp) => resp,
            Err(err) => {
                return Ok(json!({
                    "status": "error",
                    "message": "Search API error",
                    "details": err.to_string(),
                }))
            }
        };

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Ok(json!({
                "status": "error",
                "message": format!("Failed to search: {status}"),
                "details": text,
            }));
        }

        let data: Value = response.json().await.unwrap_or(Value::Null);
        Ok(json!({
            "status": "success",
            "query": query,
            "result": Self::format_results(&data, state.num_results as usize),
        }))
    }
}
