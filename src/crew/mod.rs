pub mod roster;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::context::AppContext;
use crate::domains::agent::{AgentSpec, Capability, TaskSpec};
use crate::error::{CrewError, Result};
use crate::interfaces::tools::Tool;
use crate::tools::{CodeExecutionTool, SearchInternetTool};

pub type CrewInputs = BTreeMap<String, String>;

static PLACEHOLDER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\{([^{}\s]+)\}").ok());

/// Fills `{key}` placeholders from `inputs`; unknown keys stay verbatim.
pub fn render_template(template: &str, inputs: &CrewInputs) -> String {
    let Some(re) = PLACEHOLDER.as_ref() else {
        return template.to_string();
    };
    re.replace_all(template, |caps: &Captures| {
        inputs
            .get(&caps[1])
            .cloned()
            .unwrap_or_else(|| caps[0].to_string())
    })
    .into_owned()
}

/// Capability to tool instance mapping.
#[derive(Default, Clone)]
pub struct ToolBox {
    tools: BTreeMap<Capability, Arc<dyn Tool>>,
}

impl ToolBox {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, capability: Capability, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(capability, tool);
        self
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut toolbox = Self::empty();
        match config.api_key("serper") {
            Some(key) => {
                let search = SearchInternetTool::new();
                search.configure(&json!({
                    "tools": {"search_internet": {"api_key": key}}
                }))?;
                toolbox = toolbox.with_tool(Capability::WebSearch, Arc::new(search));
            }
            None => warn!("no search key configured; researcher runs without web search"),
        }
        let settings = &config.system_settings;
        if settings.allow_code_execution {
            let code = CodeExecutionTool::new();
            code.configure(&json!({
                "tools": {"execute_code": {
                    "interpreter": settings.code_interpreter,
                    "timeout_secs": settings.code_timeout_secs,
                }}
            }))?;
            toolbox = toolbox.with_tool(Capability::CodeExecution, Arc::new(code));
        }
        Ok(toolbox)
    }

    pub fn tools_for(&self, capabilities: &[Capability]) -> Vec<Arc<dyn Tool>> {
        capabilities
            .iter()
            .filter_map(|cap| self.tools.get(cap).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TaskOutput {
    pub task: String,
    pub agent: String,
    pub prompt: String,
    pub raw: String,
}

#[derive(Debug, Clone)]
pub struct CrewOutput {
    pub raw: String,
    pub task_outputs: Vec<TaskOutput>,
}

impl fmt::Display for CrewOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A fixed list of tasks run one after another; each task sees the output
/// of the one before it.
pub struct Crew {
    name: String,
    agents: Vec<AgentSpec>,
    tasks: Vec<TaskSpec>,
    max_tool_rounds: usize,
}

impl Crew {
    pub fn new(name: &str, agents: Vec<AgentSpec>, tasks: Vec<TaskSpec>) -> Self {
        Self {
            name: name.to_string(),
            agents,
            tasks,
            max_tool_rounds: 4,
        }
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn agent(&self, name: &str) -> Result<&AgentSpec> {
        self.agents
            .iter()
            .find(|agent| agent.name == name)
            .ok_or_else(|| {
                CrewError::Config(format!("crew '{}' has no agent named '{name}'", self.name))
            })
    }

    fn compose_prompt(task: &TaskSpec, inputs: &CrewInputs, context: Option<&str>) -> String {
        let mut prompt = render_template(&task.description, inputs);
        prompt.push_str("\n\nExpected output: ");
        prompt.push_str(&task.expected_output);
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str("\n\nContext from the previous task:\n");
            prompt.push_str(context);
        }
        prompt
    }

    pub async fn kickoff(&self, ctx: &AppContext, inputs: &CrewInputs) -> Result<CrewOutput> {
        if self.tasks.is_empty() {
            return Err(CrewError::Config(format!("crew '{}' has no tasks", self.name)));
        }
        let agent_names: Vec<String> = self.agents.iter().map(|a| a.name.clone()).collect();
        let task_names: Vec<String> = self.tasks.iter().map(|t| t.name.clone()).collect();
        ctx.session
            .log_crew_execution(&self.name, &agent_names, &task_names);
        info!(crew = %self.name, tasks = task_names.len(), "crew kickoff");

        let mut outputs: Vec<TaskOutput> = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            let agent = self.agent(&task.agent)?;
            let context = outputs.last().map(|o| o.raw.as_str());
            let prompt = Self::compose_prompt(task, inputs, context);
            let tools = ctx.tools.tools_for(&agent.capabilities);
            debug!(task = %task.name, agent = %agent.name, tools = tools.len(), "running task");
            let raw = self.run_agent(ctx, agent, &prompt, &tools).await?;
            outputs.push(TaskOutput {
                task: task.name.clone(),
                agent: agent.name.clone(),
                prompt,
                raw,
            });
        }

        let raw = outputs
            .last()
            .map(|o| o.raw.clone())
            .unwrap_or_default();
        Ok(CrewOutput {
            raw,
            task_outputs: outputs,
        })
    }

    async fn run_agent(
        &self,
        ctx: &AppContext,
        agent: &AgentSpec,
        prompt: &str,
        tools: &[Arc<dyn Tool>],
    ) -> Result<String> {
        let system_prompt = agent.system_prompt();
        if tools.is_empty() {
            return ctx.llm.generate_text(prompt, &system_prompt, None).await;
        }

        let tool_specs: Vec<Value> = tools.iter().map(|t| t.schema()).collect();
        let mut prompt = prompt.to_string();
        prompt.push_str("\n\nAvailable tools:\n");
        for tool in tools {
            prompt.push_str(&format!("- {}: {}\n", tool.name(), tool.description()));
        }

        let mut last_text = String::new();
        for _ in 0..self.max_tool_rounds {
            let response = ctx
                .llm
                .generate_with_tools(&prompt, &system_prompt, tool_specs.clone())
                .await?;
            if !response.text.trim().is_empty() {
                last_text = response.text.clone();
            }
            if response.tool_calls.is_empty() {
                return Ok(last_text);
            }

            let mut results = Vec::with_capacity(response.tool_calls.len());
            for call in &response.tool_calls {
                let result = match tools.iter().find(|t| t.name() == call.name) {
                    Some(tool) => {
                        info!(agent = %agent.name, tool = %call.name, "tool call");
                        tool.execute(call.arguments.clone()).await.unwrap_or_else(|e| {
                            json!({"status": "error", "message": e.to_string()})
                        })
                    }
                    None => json!({
                        "status": "error",
                        "message": format!("unknown tool: {}", call.name),
                    }),
                };
                results.push(json!({"tool": call.name, "result": result}));
            }

            let serialized = serde_json::to_string_pretty(&results)?;
            prompt.push_str("\n\nOBSERVATION:\n");
            prompt.push_str(&serialized);
            prompt.push_str("\n\nContinue. If you have enough information, give the final answer.\n");
        }

        warn!(agent = %agent.name, rounds = self.max_tool_rounds, "tool round limit reached");
        prompt.push_str("\n\nNo more tool calls are allowed. Give the final answer now.\n");
        let text = ctx.llm.generate_text(&prompt, &system_prompt, None).await?;
        if text.trim().is_empty() {
            Ok(last_text)
        } else {
            Ok(text)
        }
    }
}
