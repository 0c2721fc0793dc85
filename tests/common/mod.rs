#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use restaurant_crew::config::Config;
use restaurant_crew::context::AppContext;
use restaurant_crew::error::{CrewError, Result};
use restaurant_crew::interfaces::providers::{LlmProvider, LlmResponse};
use restaurant_crew::interfaces::tools::Tool;
use restaurant_crew::session_log::SessionLogger;

pub const FALLBACK_TEXT: &str = "ok";

/// Hands out queued responses in order, then `FALLBACK_TEXT` forever.
pub struct QueueLlmProvider {
    responses: Mutex<VecDeque<LlmResponse>>,
    prompts: Mutex<Vec<String>>,
    system_prompts: Mutex<Vec<String>>,
}

impl QueueLlmProvider {
    pub fn new(responses: Vec<LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
            system_prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn texts(texts: &[&str]) -> Self {
        Self::new(
            texts
                .iter()
                .map(|text| LlmResponse {
                    text: text.to_string(),
                    tool_calls: Vec::new(),
                })
                .collect(),
        )
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn system_prompts(&self) -> Vec<String> {
        self.system_prompts.lock().unwrap().clone()
    }

    fn next(&self, prompt: &str, system_prompt: &str) -> LlmResponse {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.system_prompts
            .lock()
            .unwrap()
            .push(system_prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| LlmResponse {
                text: FALLBACK_TEXT.to_string(),
                tool_calls: Vec::new(),
            })
    }
}

#[async_trait]
impl LlmProvider for QueueLlmProvider {
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: &str,
        _tools: Option<Vec<Value>>,
    ) -> Result<String> {
        Ok(self.next(prompt, system_prompt).text)
    }

    async fn generate_with_tools(
        &self,
        prompt: &str,
        system_prompt: &str,
        _tools: Vec<Value>,
    ) -> Result<LlmResponse> {
        Ok(self.next(prompt, system_prompt))
    }

    fn model_name(&self) -> &str {
        "queue"
    }
}

pub struct FailingLlmProvider;

#[async_trait]
impl LlmProvider for FailingLlmProvider {
    async fn generate_text(&self, _: &str, _: &str, _: Option<Vec<Value>>) -> Result<String> {
        Err(CrewError::Http("model unavailable".to_string()))
    }

    async fn generate_with_tools(&self, _: &str, _: &str, _: Vec<Value>) -> Result<LlmResponse> {
        Err(CrewError::Http("model unavailable".to_string()))
    }
}

/// Returns a fixed result and remembers every argument it was called with.
pub struct DummyTool {
    name: String,
    result: Value,
    pub calls: Mutex<Vec<Value>>,
}

impl DummyTool {
    pub fn new(name: &str, result: Value) -> Self {
        Self {
            name: name.to_string(),
            result,
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Tool for DummyTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "dummy"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        self.calls.lock().unwrap().push(params);
        Ok(self.result.clone())
    }
}

pub fn test_config() -> Config {
    Config::from_json_str(r#"{"api_keys":{"gemini_api_key":"test-key"}}"#).unwrap()
}

pub fn test_context(dir: &tempfile::TempDir, llm: Arc<dyn LlmProvider>) -> AppContext {
    let session = SessionLogger::start(dir.path(), json!({"test": true})).unwrap();
    AppContext::new(test_config(), session, llm)
}

pub const RECOMMENDATIONS: &str = "\
🍽️ Top picks near Gwanghwamun

[1] Tosokchon Samgyetang
📍 Address: 5 Jahamun-ro 5-gil, Jongno-gu
💰 Price range: 20,000 KRW
⭐ Rating: 4.5
📞 Phone: 02-737-7444
💡 Why: Famous ginseng chicken soup

[2] Imun Seolnongtang
📍 Address: 38-13 Ujeongguk-ro, Jongno-gu
💰 Price range: 12,000 KRW
⭐ Rating: 4.3
💡 Why: Oldest restaurant in Seoul
";
