use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use tracing::{debug, warn};

use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
    ChatCompletionTool, ChatCompletionTools, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, FunctionObject,
};

use crate::error::{CrewError, Result};
use crate::interfaces::providers::{LlmProvider, LlmResponse, ToolCall};

/// Chat completions against any OpenAI-compatible endpoint. Gemini is reached
/// through its OpenAI compatibility base URL.
#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiProvider {
    fn is_function_name(name: &str) -> bool {
        let trimmed = name.trim();
        !trimmed.is_empty()
            && trimmed
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    }

    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            model: model.unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            http: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &crate::config::Config) -> Result<Self> {
        let key = config.require_model_credential()?;
        Ok(Self::new(
            key.to_string(),
            Some(config.llm_model()),
            Some(config.llm_base_url()),
        ))
    }

    async fn chat_completion(&self, request: &CreateChatCompletionRequest) -> Result<Value> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(model = %self.model, %url, "chat completion request");
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| CrewError::Http(format!("Chat completion transport failed: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CrewError::Http(format!("Chat completion read failed: {e}")))?;

        if status != StatusCode::OK {
            return Err(CrewError::Http(format!(
                "Chat completion failed ({status}): {body}"
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| CrewError::Serialization(format!("Chat completion decode failed: {e}")))
    }

    fn first_message(response: &Value) -> Value {
        response
            .get("choices")
            .and_then(|v| v.get(0))
            .and_then(|choice| choice.get("message"))
            .cloned()
            .unwrap_or(Value::Null)
    }

    fn extract_text(response: &Value) -> Option<String> {
        Self::first_message(response)
            .get("content")
            .and_then(|content| content.as_str())
            .map(|text| text.to_string())
    }

    fn parse_arguments(arguments: Option<&Value>) -> Value {
        match arguments {
            Some(Value::String(text)) => {
                serde_json::from_str(text).unwrap_or(Value::String(text.clone()))
            }
            Some(value) => value.clone(),
            None => Value::Null,
        }
    }

    fn extract_tool_calls(response: &Value) -> Vec<ToolCall> {
        let message = Self::first_message(response);
        let Some(calls) = message.get("tool_calls").and_then(|calls| calls.as_array()) else {
            return Vec::new();
        };

        calls
            .iter()
            .filter_map(|call| {
                let function = call.get("function")?;
                let name = function.get("name")?.as_str()?.to_string();
                Some(ToolCall {
                    name,
                    arguments: Self::parse_arguments(function.get("arguments")),
                })
            })
            .collect()
    }

    fn build_messages(
        prompt: &str,
        system_prompt: &str,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::new();
        if !system_prompt.is_empty() {
            let system = ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(|e| CrewError::Runtime(e.to_string()))?;
            messages.push(ChatCompletionRequestMessage::System(system));
        }
        let user = ChatCompletionRequestUserMessageArgs::default()
            .content(ChatCompletionRequestUserMessageContent::Text(
                prompt.to_string(),
            ))
            .build()
            .map_err(|e| CrewError::Runtime(e.to_string()))?;
        messages.push(ChatCompletionRequestMessage::User(user));
        Ok(messages)
    }

    fn convert_tools(tools: Vec<Value>) -> Vec<ChatCompletionTools> {
        tools
            .into_iter()
            .filter_map(|tool| {
                let function_obj = tool.get("function").cloned().unwrap_or(tool);
                let name = function_obj.get("name")?.as_str()?.trim().to_string();
                if !Self::is_function_name(&name) {
                    warn!(tool_name = %name, "Skipping invalid function tool name");
                    return None;
                }
                let description = function_obj
                    .get("description")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string());
                let parameters = function_obj
                    .get("parameters")
                    .cloned()
                    .filter(|value| value.is_object())
                    .or_else(|| {
                        Some(serde_json::json!({
                            "type": "object",
                            "properties": {},
                            "additionalProperties": true
                        }))
                    });
                Some(ChatCompletionTools::Function(ChatCompletionTool {
                    function: FunctionObject {
                        name,
                        description,
                        parameters,
                        strict: Some(false),
                    },
                }))
            })
            .collect()
    }

    fn build_request(
        &self,
        prompt: &str,
        system_prompt: &str,
        tools: Vec<Value>,
    ) -> Result<CreateChatCompletionRequest> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(Self::build_messages(prompt, system_prompt)?);
        let tools = Self::convert_tools(tools);
        if !tools.is_empty() {
            builder.tools(tools);
        }
        builder
            .build()
            .map_err(|e| CrewError::Runtime(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate_text(
        &self,
        prompt: &str,
        system_prompt: &str,
        tools: Option<Vec<Value>>,
    ) -> Result<String> {
        let request = self.build_request(prompt, system_prompt, tools.unwrap_or_default())?;
        let response = self.chat_completion(&request).await?;
        Self::extract_text(&response)
            .ok_or_else(|| CrewError::Runtime("Empty chat response".to_string()))
    }

    async fn generate_with_tools(
        &self,
        prompt: &str,
        system_prompt: &str,
        tools: Vec<Value>,
    ) -> Result<LlmResponse> {
        let request = self.build_request(prompt, system_prompt, tools)?;
        let response = self.chat_completion(&request).await?;
        Ok(LlmResponse {
            text: Self::extract_text(&response).unwrap_or_default(),
            tool_calls: Self::extract_tool_calls(&response),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::OpenAiProvider;
    use async_openai::types::chat::ChatCompletionTools;
    use serde_json::json;

    #[test]
    fn convert_tools_fills_missing_parameters_with_object_schema() {
        let tools = OpenAiProvider::convert_tools(vec![json!({
            "type": "function",
            "name": "search_internet"
        })]);

        assert_eq!(tools.len(), 1);
        match &tools[0] {
            ChatCompletionTools::Function(tool) => {
                assert_eq!(tool.function.name, "search_internet");
                assert_eq!(tool.function.strict, Some(false));
                let params = tool
                    .function
                    .parameters
                    .as_ref()
                    .expect("parameters required");
                assert_eq!(params.get("type").and_then(|v| v.as_str()), Some("object"));
            }
            _ => panic!("expected function tool"),
        }
    }

    #[test]
    fn convert_tools_skips_invalid_function_names() {
        let tools = OpenAiProvider::convert_tools(vec![
            json!({"type":"function","name":"web.search","parameters":{}}),
            json!({"type":"function","name":"execute_code","parameters":{}}),
        ]);

        assert_eq!(tools.len(), 1);
        match &tools[0] {
            ChatCompletionTools::Function(tool) => {
                assert_eq!(tool.function.name, "execute_code");
            }
            _ => panic!("expected function tool"),
        }
    }

    #[test]
    fn tool_call_arguments_are_decoded_from_strings() {
        let response = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "search_internet", "arguments": "{\"query\":\"bibimbap\"}"}
                }]
            }}]
        });
        let calls = OpenAiProvider::extract_tool_calls(&response);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].arguments["query"], json!("bibimbap"));
        assert!(OpenAiProvider::extract_text(&response).is_none());
    }
}
