use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::Result;

/// Yes/no gate and free-text prompt in front of irreversible steps.
#[async_trait]
pub trait Confirm: Send + Sync {
    async fn confirm(&self, question: &str) -> Result<bool>;
    async fn ask(&self, question: &str, default: &str) -> Result<String>;
}

pub struct ConsoleConfirm;

impl ConsoleConfirm {
    async fn read_line(prompt: &str) -> Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.flush().await?;
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        Ok(line.trim().to_string())
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "예" | "네"
    )
}

#[async_trait]
impl Confirm for ConsoleConfirm {
    async fn confirm(&self, question: &str) -> Result<bool> {
        let answer = Self::read_line(&format!("{question} (y/n): ")).await?;
        Ok(is_affirmative(&answer))
    }

    async fn ask(&self, question: &str, default: &str) -> Result<String> {
        let prompt = if default.is_empty() {
            format!("{question}: ")
        } else {
            format!("{question} [{default}]: ")
        };
        let answer = Self::read_line(&prompt).await?;
        if answer.is_empty() {
            Ok(default.to_string())
        } else {
            Ok(answer)
        }
    }
}

/// Answers every gate with a fixed decision; `--yes` and tests use it.
pub struct AutoConfirm {
    pub answer: bool,
}

impl AutoConfirm {
    pub fn yes() -> Self {
        Self { answer: true }
    }

    pub fn no() -> Self {
        Self { answer: false }
    }
}

#[async_trait]
impl Confirm for AutoConfirm {
    async fn confirm(&self, question: &str) -> Result<bool> {
        tracing::info!(answer = self.answer, "auto-confirm: {question}");
        Ok(self.answer)
    }

    async fn ask(&self, _question: &str, default: &str) -> Result<String> {
        Ok(default.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmative_answers() {
        assert!(is_affirmative("Y"));
        assert!(is_affirmative(" yes "));
        assert!(is_affirmative("예"));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("nope"));
    }

    #[tokio::test]
    async fn auto_confirm_returns_default_text() {
        let gate = AutoConfirm::no();
        assert!(!gate.confirm("send?").await.unwrap());
        assert_eq!(gate.ask("request", "dflt").await.unwrap(), "dflt");
    }
}
