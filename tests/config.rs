use std::collections::VecDeque;
use std::io::Write;
use std::sync::Mutex;

use async_trait::async_trait;
use restaurant_crew::config::{Config, LlmBackend};
use restaurant_crew::error::{CrewError, Result};
use restaurant_crew::interfaces::confirm::Confirm;
use restaurant_crew::services::setup::run_setup;

/// Replays canned answers; an exhausted queue falls back to the default.
struct ScriptedConfirm {
    decision: bool,
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedConfirm {
    fn new(decision: bool, answers: &[&str]) -> Self {
        Self {
            decision,
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
        }
    }
}

#[async_trait]
impl Confirm for ScriptedConfirm {
    async fn confirm(&self, _question: &str) -> Result<bool> {
        Ok(self.decision)
    }

    async fn ask(&self, _question: &str, default: &str) -> Result<String> {
        let answer = self.answers.lock().unwrap().pop_front();
        Ok(answer
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| default.to_string()))
    }
}

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn minimal_file_loads_with_defaults() {
    let file = write_config(r#"{"api_keys": {"gemini_api_key": "g-key"}}"#);
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.require_model_credential().unwrap(), "g-key");
    assert!(config.email_settings.recipients.is_empty());
    assert_eq!(config.email_settings.smtp_server, "smtp.gmail.com");
    assert_eq!(config.restaurant_settings.max_recommendations, 5);
    assert!(config.survey_settings.collect_comments);
    assert!(!config.system_settings.allow_code_execution);
    assert_eq!(config.log_dir(), std::path::PathBuf::from("logs"));
}

#[test]
fn missing_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, CrewError::Config(_)));
}

#[test]
fn missing_optional_sections_only_warn() {
    let file = write_config(r#"{"api_keys": {"gemini_api_key": "g-key"}}"#);
    let config = Config::load(file.path()).unwrap();
    let warnings = config.validate();
    assert!(warnings.iter().any(|w| w.contains("recipients")));
    assert!(warnings.iter().any(|w| w.contains("serper")));
    assert!(!warnings.iter().any(|w| w.contains("gemini_api_key")));
}

#[test]
fn openai_backend_uses_its_own_key_and_model() {
    let file = write_config(
        r#"{
            "api_keys": {"openai_api_key": "sk-test", "gemini_api_key": "g"},
            "system_settings": {"llm_provider": "OpenAI", "llm_model": "gpt-4o-mini"}
        }"#,
    );
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.llm_backend(), LlmBackend::OpenAi);
    assert_eq!(config.require_model_credential().unwrap(), "sk-test");
    assert_eq!(config.llm_model(), "gpt-4o-mini");
    assert_eq!(config.llm_base_url(), "https://api.openai.com/v1");
}

#[test]
fn environment_is_populated_for_configured_keys() {
    let file = write_config(
        r#"{
            "api_keys": {
                "gemini_api_key": "g-env",
                "serper_api_key": "s-env",
                "openai_api_key": "o-env",
                "restaurant_crew_test_api_key": "x-env"
            }
        }"#,
    );
    let config = Config::load(file.path()).unwrap();
    let set = config.apply_environment();

    assert_eq!(std::env::var("GEMINI_API_KEY").unwrap(), "g-env");
    assert_eq!(std::env::var("GOOGLE_API_KEY").unwrap(), "g-env");
    assert_eq!(std::env::var("SERPER_API_KEY").unwrap(), "s-env");
    assert_eq!(
        std::env::var("RESTAURANT_CREW_TEST_API_KEY").unwrap(),
        "x-env"
    );
    assert!(!set.iter().any(|name| name == "OPENAI_API_KEY"));
}

#[test]
fn null_keys_and_mistyped_fields_still_load() {
    let file = write_config(
        r#"{
            "api_keys": {"gemini_api_key": "g-key", "sendgrid_api_key": null},
            "email_settings": {"recipients": "a@x.kr", "smtp_server": "smtp.example.kr"}
        }"#,
    );
    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.require_model_credential().unwrap(), "g-key");
    assert!(config.email_settings.recipients.is_empty());
    assert_eq!(config.email_settings.smtp_server, "smtp.example.kr");
    assert!(config.api_key("sendgrid").is_none());
    assert!(config.api_keys.other.is_empty());
    let warnings = config.validate();
    assert!(warnings
        .iter()
        .any(|w| w.starts_with("email_settings.recipients ignored")));
}

#[test]
fn example_config_round_trips_with_placeholders() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config").join("config.json");
    Config::write_example(&path).unwrap();

    let config = Config::load(&path).unwrap();
    assert!(config.require_model_credential().is_err());
    assert!(config.api_key("serper").is_none());
    assert_eq!(config.email_settings.smtp_port, 587);
    assert_eq!(config.logging.log_dir, "logs");
    assert!(!config.validate().iter().any(|w| w.contains("ignored")));
}

#[tokio::test]
async fn setup_writes_the_answers_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let confirm = ScriptedConfirm::new(
        true,
        &["openai", "sk-setup", "", "", "", "a@x.kr, b@x.kr"],
    );

    let config = run_setup(&path, &confirm).await.unwrap().unwrap();
    assert_eq!(config.llm_backend(), LlmBackend::OpenAi);
    assert_eq!(config.require_model_credential().unwrap(), "sk-setup");
    assert_eq!(
        config.email_settings.recipients,
        vec!["a@x.kr".to_string(), "b@x.kr".to_string()]
    );

    let reloaded = Config::load(&path).unwrap();
    assert_eq!(reloaded.require_model_credential().unwrap(), "sk-setup");
    assert!(reloaded.api_key("gemini").is_none());
}

#[tokio::test]
async fn setup_keeps_an_existing_file_when_declined() {
    let file = write_config(r#"{"api_keys": {"gemini_api_key": "keep-me"}}"#);
    let confirm = ScriptedConfirm::new(false, &["openai", "sk-other"]);

    assert!(run_setup(file.path(), &confirm).await.unwrap().is_none());
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.require_model_credential().unwrap(), "keep-me");
}
