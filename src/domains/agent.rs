use serde::{Deserialize, Serialize};

/// Closed set of tools an agent may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    WebSearch,
    CodeExecution,
}

#[derive(Debug, Clone)]
pub struct AgentSpec {
    pub name: String,
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub capabilities: Vec<Capability>,
}

impl AgentSpec {
    pub fn system_prompt(&self) -> String {
        format!(
            "You are {}.\nGoal: {}\nBackground: {}",
            self.role, self.goal, self.backstory
        )
    }
}

#[derive(Debug, Clone)]
pub struct TaskSpec {
    pub name: String,
    /// Prompt template; `{key}` placeholders are filled from the crew inputs.
    pub description: String,
    pub expected_output: String,
    pub agent: String,
}
