use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CrewError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";
pub const DEFAULT_REQUEST: &str = "find cheap Korean food near Gwanghwamun";

const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Gemini,
    OpenAi,
}

impl LlmBackend {
    pub fn key_name(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini_api_key",
            Self::OpenAi => "openai_api_key",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.0-flash",
            Self::OpenAi => "gpt-3.5-turbo",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Gemini => GEMINI_OPENAI_BASE_URL,
            Self::OpenAi => OPENAI_BASE_URL,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiKeys {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub serper_api_key: Option<String>,
    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemSettings {
    pub llm_provider: String,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub allow_code_execution: bool,
    pub code_interpreter: String,
    pub code_timeout_secs: u64,
    pub max_tool_rounds: usize,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            llm_provider: "gemini".to_string(),
            llm_model: None,
            llm_base_url: None,
            allow_code_execution: false,
            code_interpreter: "python3".to_string(),
            code_timeout_secs: 30,
            max_tool_rounds: 4,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RestaurantSettings {
    pub default_request: String,
    pub max_recommendations: usize,
}

impl Default for RestaurantSettings {
    fn default() -> Self {
        Self {
            default_request: DEFAULT_REQUEST.to_string(),
            max_recommendations: 5,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SurveySettings {
    pub title_prefix: String,
    pub share_with: Vec<String>,
    pub collect_comments: bool,
}

impl Default for SurveySettings {
    fn default() -> Self {
        Self {
            title_prefix: "Restaurant Recommendation Survey".to_string(),
            share_with: Vec::new(),
            collect_comments: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmailSettings {
    pub sender_email: Option<String>,
    pub sender_name: String,
    pub sender_password: Option<String>,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub recipients: Vec<String>,
    pub subject: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            sender_email: None,
            sender_name: "Restaurant Crew".to_string(),
            sender_password: None,
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            recipients: Vec::new(),
            subject: "[Restaurant picks] Please take our quick survey".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GoogleCredentials {
    /// OAuth client secrets of the installed-app kind.
    pub credentials_file: Option<String>,
    pub token_file: String,
    pub service_account_file: Option<String>,
}

impl Default for GoogleCredentials {
    fn default() -> Self {
        Self {
            credentials_file: None,
            token_file: "config/token.json".to_string(),
            service_account_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub log_dir: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            log_dir: "logs".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DataAnalysisSettings {
    pub reports_dir: String,
}

impl Default for DataAnalysisSettings {
    fn default() -> Self {
        Self {
            reports_dir: "reports".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Config {
    pub api_keys: ApiKeys,
    pub system_settings: SystemSettings,
    pub restaurant_settings: RestaurantSettings,
    pub survey_settings: SurveySettings,
    pub email_settings: EmailSettings,
    pub google_credentials: GoogleCredentials,
    pub logging: LoggingSettings,
    pub data_analysis: DataAnalysisSettings,
    #[serde(skip)]
    raw: Value,
    #[serde(skip)]
    load_warnings: Vec<String>,
}

pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || (trimmed.starts_with("your-") && trimmed.ends_with("-here"))
}

fn usable(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !is_placeholder(v))
}

/// Reads one top-level section, keeping every field that deserializes and
/// dropping the rest with a warning. A missing or null section is the default.
fn lenient_section<T: DeserializeOwned + Default>(
    raw: &Value,
    name: &str,
    warnings: &mut Vec<String>,
) -> T {
    let fields = match raw.get(name) {
        None | Some(Value::Null) => return T::default(),
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            warnings.push(format!("{name} ignored: expected an object, found {other}"));
            return T::default();
        }
    };
    let mut accepted = Map::new();
    for (key, value) in fields {
        let mut candidate = accepted.clone();
        candidate.insert(key.clone(), value.clone());
        match serde_json::from_value::<T>(Value::Object(candidate)) {
            Ok(_) => {
                accepted.insert(key.clone(), value.clone());
            }
            Err(e) => warnings.push(format!("{name}.{key} ignored: {e}")),
        }
    }
    serde_json::from_value(Value::Object(accepted)).unwrap_or_default()
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            CrewError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_json_str(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Only unparseable JSON is an error. Fields of the wrong type fall back
    /// to their defaults and show up in `validate()`.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let raw: Value =
            serde_json::from_str(text).map_err(|e| CrewError::Config(e.to_string()))?;
        let mut warnings = Vec::new();
        if !raw.is_object() {
            warnings.push("configuration root is not an object; using defaults".to_string());
        }
        Ok(Self {
            api_keys: lenient_section(&raw, "api_keys", &mut warnings),
            system_settings: lenient_section(&raw, "system_settings", &mut warnings),
            restaurant_settings: lenient_section(&raw, "restaurant_settings", &mut warnings),
            survey_settings: lenient_section(&raw, "survey_settings", &mut warnings),
            email_settings: lenient_section(&raw, "email_settings", &mut warnings),
            google_credentials: lenient_section(&raw, "google_credentials", &mut warnings),
            logging: lenient_section(&raw, "logging", &mut warnings),
            data_analysis: lenient_section(&raw, "data_analysis", &mut warnings),
            raw,
            load_warnings: warnings,
        })
    }

    /// Defaults with placeholder credentials, the starting point for `--init`.
    pub fn example() -> Self {
        let mut config = Self::default();
        config.api_keys.gemini_api_key = Some("your-gemini-api-key-here".to_string());
        config.api_keys.openai_api_key = Some("your-openai-api-key-here".to_string());
        config.api_keys.serper_api_key = Some("your-serper-api-key-here".to_string());
        config.email_settings.sender_email = Some("your-sender-email-here".to_string());
        config.email_settings.sender_password = Some("your-app-password-here".to_string());
        config
    }

    /// Writes the typed sections as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), "configuration saved");
        Ok(())
    }

    pub fn write_example(path: impl AsRef<Path>) -> Result<()> {
        Self::example().save(path)
    }

    /// Dotted lookup on the document as written, e.g. `email_settings.smtp_port`.
    pub fn get(&self, dotted: &str) -> Option<&Value> {
        dotted
            .split('.')
            .try_fold(&self.raw, |value, key| value.get(key))
    }

    pub fn api_key(&self, service: &str) -> Option<&str> {
        let name = format!("{service}_api_key");
        match name.as_str() {
            "gemini_api_key" => usable(self.api_keys.gemini_api_key.as_ref()),
            "openai_api_key" => usable(self.api_keys.openai_api_key.as_ref()),
            "serper_api_key" => usable(self.api_keys.serper_api_key.as_ref()),
            other => usable(self.api_keys.other.get(other)),
        }
    }

    pub fn llm_backend(&self) -> LlmBackend {
        match self.system_settings.llm_provider.trim().to_ascii_lowercase().as_str() {
            "openai" => LlmBackend::OpenAi,
            _ => LlmBackend::Gemini,
        }
    }

    pub fn llm_model(&self) -> String {
        self.system_settings
            .llm_model
            .clone()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.llm_backend().default_model().to_string())
    }

    pub fn llm_base_url(&self) -> String {
        self.system_settings
            .llm_base_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| self.llm_backend().default_base_url().to_string())
    }

    /// The one field whose absence aborts startup.
    pub fn require_model_credential(&self) -> Result<&str> {
        let backend = self.llm_backend();
        let service = backend.key_name().trim_end_matches("_api_key");
        self.api_key(service).ok_or_else(|| {
            CrewError::Config(format!(
                "api_keys.{} is required for llm_provider '{}'",
                backend.key_name(),
                self.system_settings.llm_provider
            ))
        })
    }

    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.load_warnings.clone();
        let provider = self.system_settings.llm_provider.trim().to_ascii_lowercase();
        if !matches!(provider.as_str(), "gemini" | "openai") {
            warnings.push(format!(
                "unknown llm_provider '{}', falling back to gemini",
                self.system_settings.llm_provider
            ));
        }
        if self.require_model_credential().is_err() {
            warnings.push(format!(
                "missing required API key: {}",
                self.llm_backend().key_name()
            ));
        }
        if self.api_key("serper").is_none() {
            warnings.push("serper_api_key not set; web search is disabled".to_string());
        }
        if self.email_settings.recipients.is_empty() {
            warnings.push("email_settings.recipients is empty".to_string());
        }
        if self.email_settings.sender_email.is_some()
            && self.email_settings.sender_password.is_none()
        {
            warnings.push(
                "email_settings.sender_password missing; emails will be simulated".to_string(),
            );
        }
        for file in [
            self.google_credentials.credentials_file.as_ref(),
            self.google_credentials.service_account_file.as_ref(),
        ]
        .into_iter()
        .flatten()
        {
            if !Path::new(file).exists() {
                warnings.push(format!("google credential file not found: {file}"));
            }
        }
        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        warnings
    }

    /// Exports provider keys for the selected backend. Returns the variable names set.
    pub fn apply_environment(&self) -> Vec<String> {
        let backend = self.llm_backend();
        let mut set = Vec::new();
        let mut export = |name: &str, value: &str| {
            std::env::set_var(name, value);
            tracing::info!("environment variable set: {name}");
            set.push(name.to_string());
        };

        if let Some(key) = self.api_key("gemini") {
            export("GEMINI_API_KEY", key);
            export("GOOGLE_API_KEY", key);
        }
        if backend == LlmBackend::OpenAi {
            if let Some(key) = self.api_key("openai") {
                export("OPENAI_API_KEY", key);
            }
        } else {
            tracing::info!("openai backend not selected; OPENAI_API_KEY left unset");
        }
        if let Some(key) = self.api_key("serper") {
            export("SERPER_API_KEY", key);
        }
        for (name, value) in &self.api_keys.other {
            if !is_placeholder(value) {
                export(&name.to_ascii_uppercase(), value);
            }
        }
        if let Some(file) = &self.google_credentials.service_account_file {
            if Path::new(file).exists() {
                export("GOOGLE_APPLICATION_CREDENTIALS", file);
            }
        }
        set
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.logging.log_dir)
    }

    pub fn reports_dir(&self) -> PathBuf {
        PathBuf::from(&self.data_analysis.reports_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_document_fills_defaults() {
        let config = Config::from_json_str(r#"{"api_keys":{"gemini_api_key":"k"}}"#).unwrap();
        assert_eq!(config.require_model_credential().unwrap(), "k");
        assert!(config.email_settings.recipients.is_empty());
        assert_eq!(config.email_settings.smtp_port, 587);
        assert_eq!(config.llm_backend(), LlmBackend::Gemini);
        assert_eq!(config.llm_model(), "gemini-2.0-flash");
        assert_eq!(config.restaurant_settings.default_request, DEFAULT_REQUEST);
    }

    #[test]
    fn placeholder_keys_do_not_count() {
        let config = Config::from_json_str(
            r#"{"api_keys":{"openai_api_key":"your-openai-api-key-here"},
                "system_settings":{"llm_provider":"openai"}}"#,
        )
        .unwrap();
        assert!(config.require_model_credential().is_err());
        assert!(config
            .validate()
            .iter()
            .any(|w| w.contains("openai_api_key")));
    }

    #[test]
    fn dotted_get_reads_raw_document() {
        let config = Config::from_json_str(
            r#"{"email_settings":{"smtp_port":2525,"extra":{"nested":true}}}"#,
        )
        .unwrap();
        assert_eq!(config.get("email_settings.smtp_port"), Some(&Value::from(2525)));
        assert_eq!(
            config.get("email_settings.extra.nested"),
            Some(&Value::Bool(true))
        );
        assert!(config.get("email_settings.missing").is_none());
        assert_eq!(config.email_settings.smtp_port, 2525);
    }

    #[test]
    fn mistyped_fields_fall_back_without_losing_their_neighbours() {
        let config = Config::from_json_str(
            r#"{"api_keys":{"gemini_api_key":"k","sendgrid_api_key":null},
                "email_settings":{"smtp_port":"587","recipients":["a@x.kr"]},
                "logging":"verbose"}"#,
        )
        .unwrap();
        assert_eq!(config.require_model_credential().unwrap(), "k");
        assert!(config.api_keys.other.is_empty());
        assert_eq!(config.email_settings.smtp_port, 587);
        assert_eq!(config.email_settings.recipients, vec!["a@x.kr".to_string()]);
        assert_eq!(config.logging.log_dir, "logs");

        let warnings = config.validate();
        assert!(warnings.iter().any(|w| w.starts_with("api_keys.sendgrid_api_key")));
        assert!(warnings.iter().any(|w| w.starts_with("email_settings.smtp_port")));
        assert!(warnings.iter().any(|w| w.starts_with("logging ignored")));
    }

    #[test]
    fn unparseable_document_is_a_config_error() {
        let err = Config::from_json_str("{bad").unwrap_err();
        assert!(matches!(err, CrewError::Config(_)));
    }
}
