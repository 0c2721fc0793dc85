use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::{CrewError, Result};
use crate::interfaces::tools::Tool;

const OUTPUT_LIMIT: usize = 8_000;

#[derive(Debug, Clone)]
struct CodeExecutionState {
    interpreter: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for CodeExecutionState {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            args: vec!["-".to_string()],
            timeout: Duration::from_secs(30),
        }
    }
}

/// Runs a snippet by piping it to an interpreter's stdin.
pub struct CodeExecutionTool {
    state: Mutex<CodeExecutionState>,
}

impl Default for CodeExecutionTool {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeExecutionTool {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CodeExecutionState::default()),
        }
    }

    fn snapshot(&self) -> CodeExecutionState {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    fn clip(text: &[u8]) -> String {
        let text = String::from_utf8_lossy(text);
        match text.char_indices().nth(OUTPUT_LIMIT) {
            Some((idx, _)) => format!("{}...[truncated]", &text[..idx]),
            None => text.into_owned(),
        }
    }

    async fn run(state: &CodeExecutionState, code: &str) -> Result<Value> {
        let mut child = Command::new(&state.interpreter)
            .args(&state.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CrewError::Runtime(format!("cannot start {}: {e}", state.interpreter)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(code.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        match tokio::time::timeout(state.timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                Ok(json!({
                    "status": if output.status.success() { "success" } else { "error" },
                    "exit_code": output.status.code(),
                    "stdout": Self::clip(&output.stdout),
                    "stderr": Self::clip(&output.stderr),
                }))
            }
            Err(_) => Ok(json!({
                "status": "error",
                "message": format!("execution timed out after {}s", state.timeout.as_secs()),
            })),
        }
    }
}

#[async_trait]
impl Tool for CodeExecutionTool {
    fn name(&self) -> &str {
        "execute_code"
    }

    fn description(&self) -> &str {
        "Execute a short script and return its stdout and stderr. Use it for tallies and statistics."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "Source code to run"
                }
            },
            "required": ["code"]
        })
    }

    fn configure(&self, config: &Value) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CrewError::Runtime("Failed to lock tool state".to_string()))?;
        let Some(tool_cfg) = config.get("tools").and_then(|t| t.get("execute_code")) else {
            return Ok(());
        };
        if let Some(interpreter) = tool_cfg.get("interpreter").and_then(|v| v.as_str()) {
            state.interpreter = interpreter.to_string();
        }
        if let Some(args) = tool_cfg.get("args").and_then(|v| v.as_array()) {
            state.args = args
                .iter()
                .filter_map(|a| a.as_str().map(str::to_string))
                .collect();
        }
        if let Some(secs) = tool_cfg.get("timeout_secs").and_then(|v| v.as_u64()) {
            state.timeout = Duration::from_secs(secs.max(1));
        }
        Ok(())
    }

    async fn execute(&self, params: Value) -> Result<Value> {
        let Some(code) = params
            .get("code")
            .and_then(|v| v.as_str())
            .filter(|c| !c.trim().is_empty())
        else {
            return Ok(json!({
                "status": "error",
                "message": "code is required"
            }));
        };
        let state = self.snapshot();
        tracing::debug!(interpreter = %state.interpreter, "executing code snippet");
        match Self::run(&state, code).await {
            Ok(value) => Ok(value),
            Err(err) => Ok(json!({
                "status": "error",
                "message": err.to_string(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CodeExecutionTool;
    use crate::interfaces::tools::Tool;
    use serde_json::json;

    fn shell_tool(timeout: u64) -> CodeExecutionTool {
        let tool = CodeExecutionTool::new();
        tool.configure(&json!({
            "tools": {"execute_code": {"interpreter": "sh", "args": ["-s"], "timeout_secs": timeout}}
        }))
        .unwrap();
        tool
    }

    #[tokio::test]
    async fn runs_snippet_through_interpreter() {
        let tool = shell_tool(10);
        let out = tool.execute(json!({"code": "echo hi"})).await.unwrap();
        assert_eq!(out["status"], json!("success"));
        assert_eq!(out["stdout"].as_str().unwrap().trim(), "hi");
    }

    #[tokio::test]
    async fn slow_snippet_times_out() {
        let tool = shell_tool(1);
        let out = tool.execute(json!({"code": "sleep 5"})).await.unwrap();
        assert_eq!(out["status"], json!("error"));
        assert!(out["message"].as_str().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn missing_interpreter_is_reported() {
        let tool = CodeExecutionTool::new();
        tool.configure(&json!({
            "tools": {"execute_code": {"interpreter": "definitely-not-a-binary-xyz"}}
        }))
        .unwrap();
        let out = tool.execute(json!({"code": "1"})).await.unwrap();
        assert_eq!(out["status"], json!("error"));
    }
}
