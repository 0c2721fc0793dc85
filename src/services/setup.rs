//! First-run bootstrap: writes a starter configuration from a few prompts.

use std::path::Path;

use crate::config::{Config, LlmBackend};
use crate::error::Result;
use crate::interfaces::confirm::Confirm;

fn split_list(input: &str) -> Vec<String> {
    input
        .split([',', ';', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Builds a configuration from the example defaults plus the operator's
/// answers and saves it to `path`. Returns `None` when an existing file was
/// kept.
pub async fn run_setup(path: &Path, confirm: &dyn Confirm) -> Result<Option<Config>> {
    if path.exists()
        && !confirm
            .confirm(&format!("{} already exists. Overwrite it?", path.display()))
            .await?
    {
        println!("Kept the existing configuration.");
        return Ok(None);
    }

    let mut config = Config::example();

    let provider = confirm.ask("LLM provider (gemini/openai)", "gemini").await?;
    config.system_settings.llm_provider = provider.trim().to_ascii_lowercase();
    let backend = config.llm_backend();

    let key = confirm
        .ask(&format!("{} (required)", backend.key_name()), "")
        .await?;
    if key.trim().is_empty() {
        println!(
            "No {} entered; edit {} before running.",
            backend.key_name(),
            path.display()
        );
    } else {
        let slot = match backend {
            LlmBackend::Gemini => &mut config.api_keys.gemini_api_key,
            LlmBackend::OpenAi => &mut config.api_keys.openai_api_key,
        };
        *slot = Some(key.trim().to_string());
    }

    let serper = confirm.ask("serper_api_key (optional)", "").await?;
    if !serper.trim().is_empty() {
        config.api_keys.serper_api_key = Some(serper.trim().to_string());
    }

    let credentials = confirm
        .ask("Google OAuth client file (optional)", "")
        .await?;
    let credentials = credentials.trim();
    if !credentials.is_empty() {
        if Path::new(credentials).exists() {
            config.google_credentials.credentials_file = Some(credentials.to_string());
        } else {
            println!("{credentials} not found; Google Forms stays disabled.");
        }
    }

    let sender = confirm.ask("Sender email (optional)", "").await?;
    if !sender.trim().is_empty() {
        config.email_settings.sender_email = Some(sender.trim().to_string());
        let password = confirm.ask("Sender app password", "").await?;
        if !password.trim().is_empty() {
            config.email_settings.sender_password = Some(password.trim().to_string());
        }
    }

    let recipients = confirm
        .ask("Survey recipients, comma separated (optional)", "")
        .await?;
    config.email_settings.recipients = split_list(&recipients);

    config.save(path)?;
    println!("Configuration written to {}", path.display());
    let config = Config::load(path)?;
    config.validate();
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_lists_accept_common_separators() {
        assert_eq!(
            split_list("a@x.kr, b@x.kr;c@x.kr  "),
            vec!["a@x.kr", "b@x.kr", "c@x.kr"]
        );
        assert!(split_list("  ").is_empty());
    }
}
