use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters(&self) -> Value;
    fn configure(&self, _config: &Value) -> Result<()> {
        Ok(())
    }
    async fn execute(&self, params: Value) -> Result<Value>;

    /// Function-tool schema handed to the chat completion request.
    fn schema(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "name": self.name(),
            "description": self.description(),
            "parameters": self.parameters(),
        })
    }
}
