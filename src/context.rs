use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::config::Config;
use crate::crew::ToolBox;
use crate::error::Result;
use crate::google::{Authenticator, FormsClient};
use crate::interfaces::providers::LlmProvider;
use crate::mail::Mailer;
use crate::providers::openai::OpenAiProvider;
use crate::session_log::SessionLogger;

/// Everything a run needs, built once and passed by reference.
pub struct AppContext {
    pub config: Config,
    pub session: SessionLogger,
    pub llm: Arc<dyn LlmProvider>,
    pub tools: ToolBox,
    pub forms: Option<FormsClient>,
    pub mailer: Mailer,
}

impl AppContext {
    /// No tools, no forms, simulated mail.
    pub fn new(config: Config, session: SessionLogger, llm: Arc<dyn LlmProvider>) -> Self {
        Self {
            config,
            session,
            llm,
            tools: ToolBox::empty(),
            forms: None,
            mailer: Mailer::simulated(),
        }
    }

    pub fn with_tools(mut self, tools: ToolBox) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_forms(mut self, forms: FormsClient) -> Self {
        self.forms = Some(forms);
        self
    }

    pub fn with_mailer(mut self, mailer: Mailer) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn from_config(config: Config, log_dir: Option<PathBuf>) -> Result<Self> {
        let llm: Arc<dyn LlmProvider> = Arc::new(OpenAiProvider::from_config(&config)?);
        let system_info = json!({
            "version": crate::build_version(),
            "os": std::env::consts::OS,
            "llm_provider": config.system_settings.llm_provider,
            "llm_model": llm.model_name(),
            "email_recipients": config.email_settings.recipients.len(),
        });
        let session =
            SessionLogger::start(log_dir.unwrap_or_else(|| config.log_dir()), system_info)?;

        let tools = ToolBox::from_config(&config)?;
        let forms = Authenticator::from_settings(&config.google_credentials).map(FormsClient::new);
        let mailer = Mailer::from_settings(&config.email_settings);
        session.note(&format!(
            "context ready | tools: {} | forms: {} | mail: {}",
            tools.len(),
            if forms.is_some() { "google" } else { "text fallback" },
            if mailer.is_simulated() { "simulated" } else { "smtp" }
        ));

        Ok(Self {
            config,
            session,
            llm,
            tools,
            forms,
            mailer,
        })
    }

    pub fn today(&self) -> chrono::NaiveDate {
        chrono::Local::now().date_naive()
    }
}
