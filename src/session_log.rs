use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{CrewError, Result};

const RESULT_LIMIT: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Started,
    Completed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Interaction {
    Prompt {
        timestamp: String,
        prompt: String,
        context: Option<Value>,
    },
    Response {
        timestamp: String,
        response: String,
        metadata: Option<Value>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub task_name: String,
    pub agent_name: String,
    pub start_time: String,
    pub end_time: Option<String>,
    pub input_data: Value,
    pub interactions: Vec<Interaction>,
    pub result: Option<String>,
    pub error: Option<String>,
    /// Seconds.
    pub execution_time: Option<f64>,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFiles {
    pub session_log: PathBuf,
    pub task_log: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub error_tasks: usize,
    pub total_execution_time: f64,
    pub log_files: LogFiles,
}

/// Per-run record of every task, prompt and response.
///
/// Writes a human-readable `session_<id>.log` as events happen and a
/// `tasks_<id>.json` document with the full task list.
pub struct SessionLogger {
    session_id: String,
    log_path: PathBuf,
    task_path: PathBuf,
    system_info: Value,
    sink: Mutex<File>,
    tasks: Mutex<Vec<TaskRecord>>,
    seq: AtomicUsize,
}

fn now_stamp() -> String {
    Local::now().to_rfc3339()
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Millisecond timestamp plus pid, suffixed until no log in `log_dir` uses it.
fn fresh_session_id(log_dir: &Path) -> String {
    let base = format!(
        "{}_{}",
        Local::now().format("%Y%m%d_%H%M%S_%3f"),
        std::process::id()
    );
    let taken = |id: &str| {
        log_dir.join(format!("session_{id}.log")).exists()
            || log_dir.join(format!("tasks_{id}.json")).exists()
    };
    let mut id = base.clone();
    let mut n = 1;
    while taken(&id) {
        id = format!("{base}_{n}");
        n += 1;
    }
    id
}

impl SessionLogger {
    pub fn start(log_dir: impl AsRef<Path>, system_info: Value) -> Result<Self> {
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir).map_err(|e| {
            CrewError::Io(format!("cannot create log dir {}: {e}", log_dir.display()))
        })?;

        let session_id = fresh_session_id(log_dir);
        let log_path = log_dir.join(format!("session_{session_id}.log"));
        let task_path = log_dir.join(format!("tasks_{session_id}.json"));
        let sink = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        let logger = Self {
            session_id,
            log_path,
            task_path,
            system_info,
            sink: Mutex::new(sink),
            tasks: Mutex::new(Vec::new()),
            seq: AtomicUsize::new(0),
        };
        logger.write_line("INFO", &format!("=== session started: {} ===", logger.session_id));
        logger.write_line("INFO", &format!("system info: {}", logger.system_info));
        tracing::info!(
            session_id = %logger.session_id,
            path = %logger.log_path.display(),
            "session log opened"
        );
        Ok(logger)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn task_path(&self) -> &Path {
        &self.task_path
    }

    fn write_line(&self, level: &str, message: &str) {
        let line = format!(
            "{} - RestaurantCrew - {level} - {message}\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        match self.sink.lock() {
            Ok(mut file) => {
                if let Err(err) = file.write_all(line.as_bytes()) {
                    tracing::warn!(error = %err, "session log write failed");
                }
            }
            Err(_) => tracing::warn!("session log sink poisoned"),
        }
    }

    fn with_task<F>(&self, task_id: &str, update: F) -> bool
    where
        F: FnOnce(&mut TaskRecord),
    {
        let Ok(mut tasks) = self.tasks.lock() else {
            tracing::warn!("task list lock poisoned");
            return false;
        };
        match tasks.iter_mut().find(|task| task.task_id == task_id) {
            Some(task) => {
                update(task);
                true
            }
            None => {
                tracing::warn!(%task_id, "unknown task id");
                false
            }
        }
    }

    pub fn note(&self, message: &str) {
        self.write_line("INFO", message);
    }

    pub fn warn(&self, message: &str) {
        self.write_line("WARNING", message);
    }

    pub fn start_task(&self, task_name: &str, agent_name: &str, input_data: Value) -> String {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let task_id = format!("{agent_name}_{task_name}_{seq:03}");
        let record = TaskRecord {
            task_id: task_id.clone(),
            task_name: task_name.to_string(),
            agent_name: agent_name.to_string(),
            start_time: now_stamp(),
            end_time: None,
            input_data: input_data.clone(),
            interactions: Vec::new(),
            result: None,
            error: None,
            execution_time: None,
            status: TaskStatus::Started,
        };
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(record);
        }
        self.write_line(
            "INFO",
            &format!("task started: {task_id} | agent: {agent_name} | task: {task_name}"),
        );
        self.write_line("INFO", &format!("input: {input_data}"));
        task_id
    }

    pub fn record_prompt(&self, task_id: &str, prompt: &str, context: Option<Value>) {
        let recorded = self.with_task(task_id, |task| {
            task.interactions.push(Interaction::Prompt {
                timestamp: now_stamp(),
                prompt: prompt.to_string(),
                context,
            })
        });
        if recorded {
            self.write_line("INFO", &format!("[{task_id}] prompt:\n{prompt}"));
        }
    }

    pub fn record_response(&self, task_id: &str, response: &str, metadata: Option<Value>) {
        let recorded = self.with_task(task_id, |task| {
            task.interactions.push(Interaction::Response {
                timestamp: now_stamp(),
                response: response.to_string(),
                metadata,
            })
        });
        if recorded {
            self.write_line("INFO", &format!("[{task_id}] response:\n{response}"));
        }
    }

    pub fn complete(&self, task_id: &str, result: &str, duration: Duration) {
        let secs = duration.as_secs_f64();
        let recorded = self.with_task(task_id, |task| {
            task.end_time = Some(now_stamp());
            task.execution_time = Some(secs);
            task.result = Some(truncate_chars(result, RESULT_LIMIT));
            task.status = TaskStatus::Completed;
        });
        if recorded {
            self.write_line(
                "INFO",
                &format!("task completed: {task_id} | elapsed: {secs:.2}s"),
            );
            self.persist_tasks(None);
        }
    }

    pub fn fail(&self, task_id: &str, error: &str, duration: Duration) {
        let secs = duration.as_secs_f64();
        let recorded = self.with_task(task_id, |task| {
            task.end_time = Some(now_stamp());
            task.execution_time = Some(secs);
            task.error = Some(error.to_string());
            task.status = TaskStatus::Error;
        });
        if recorded {
            self.write_line(
                "ERROR",
                &format!("task failed: {task_id} | error: {error} | elapsed: {secs:.2}s"),
            );
            self.persist_tasks(None);
        }
    }

    pub fn log_crew_execution(&self, crew_name: &str, agents: &[String], tasks: &[String]) {
        self.write_line(
            "INFO",
            &format!(
                "crew run: {crew_name} | agents: {} | tasks: {}",
                agents.join(", "),
                tasks.join(", ")
            ),
        );
    }

    pub fn log_api_call(&self, api_name: &str, endpoint: &str, outcome: &str) {
        self.write_line(
            "INFO",
            &format!("api call: {api_name} | {endpoint} | {outcome}"),
        );
    }

    pub fn log_email_sending(&self, recipients: &[String], subject: &str, success: bool) {
        let status = if success { "success" } else { "failure" };
        self.write_line(
            if success { "INFO" } else { "ERROR" },
            &format!(
                "email {status}: subject '{subject}' | recipients: {}",
                recipients.join(", ")
            ),
        );
    }

    pub fn log_data_analysis(&self, analysis_type: &str, data_summary: &Value, result: &str) {
        self.write_line(
            "INFO",
            &format!(
                "data analysis: {analysis_type} | data: {data_summary} | result: {}",
                truncate_chars(result, 200)
            ),
        );
    }

    pub fn tasks(&self) -> Vec<TaskRecord> {
        self.tasks
            .lock()
            .map(|tasks| tasks.clone())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> SessionSummary {
        let tasks = self.tasks();
        let completed = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        let errored = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Error)
            .count();
        SessionSummary {
            session_id: self.session_id.clone(),
            total_tasks: tasks.len(),
            completed_tasks: completed,
            error_tasks: errored,
            total_execution_time: tasks.iter().filter_map(|t| t.execution_time).sum(),
            log_files: LogFiles {
                session_log: self.log_path.clone(),
                task_log: self.task_path.clone(),
            },
        }
    }

    fn task_document(&self, results: Option<&Value>) -> Value {
        json!({
            "session_id": self.session_id,
            "system_info": self.system_info,
            "tasks": self.tasks(),
            "final_results": results,
        })
    }

    fn persist_tasks(&self, results: Option<&Value>) {
        if let Err(err) = self.write_task_file(results) {
            tracing::warn!(error = %err, "task log write failed");
        }
    }

    fn write_task_file(&self, results: Option<&Value>) -> Result<()> {
        let document = serde_json::to_string_pretty(&self.task_document(results))?;
        fs::write(&self.task_path, document)?;
        Ok(())
    }

    pub fn end(&self, results: Value) -> Result<SessionSummary> {
        let summary = self.summary();
        self.write_task_file(Some(&results))?;
        self.write_line(
            "INFO",
            &format!(
                "=== session ended: {} | tasks: {} | completed: {} | errors: {} | total: {:.2}s ===",
                summary.session_id,
                summary.total_tasks,
                summary.completed_tasks,
                summary.error_tasks,
                summary.total_execution_time
            ),
        );
        tracing::info!(
            session_id = %summary.session_id,
            total = summary.total_tasks,
            errors = summary.error_tasks,
            "session closed"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_is_truncated_on_char_boundary() {
        let text = "맛".repeat(1200);
        let cut = truncate_chars(&text, RESULT_LIMIT);
        assert_eq!(cut.chars().count(), RESULT_LIMIT);
        assert_eq!(truncate_chars("short", RESULT_LIMIT), "short");
    }

    #[test]
    fn unknown_task_ids_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SessionLogger::start(dir.path(), json!({})).unwrap();
        logger.complete("nope", "x", Duration::from_secs(1));
        assert_eq!(logger.summary().total_tasks, 0);
    }

    #[test]
    fn task_ids_stay_unique_within_a_session() {
        let dir = tempfile::tempdir().unwrap();
        let logger = SessionLogger::start(dir.path(), json!({})).unwrap();
        let a = logger.start_task("recommend", "researcher", json!({}));
        let b = logger.start_task("recommend", "researcher", json!({}));
        assert_ne!(a, b);
    }
}
