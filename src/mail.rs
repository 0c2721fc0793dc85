use lettre::message::header::ContentType;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{error, info};

use crate::config::{is_placeholder, EmailSettings};
use crate::error::{CrewError, Result};
use crate::extract::SURVEY_LINK_LABEL;

const REPORT_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    /// No sender credentials; the message was only logged.
    Simulated,
    Failed(String),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

#[derive(Debug, Clone)]
pub struct SmtpSettings {
    pub server: String,
    pub port: u16,
    pub sender_email: String,
    pub sender_name: String,
    pub password: String,
}

impl SmtpSettings {
    /// `None` unless both the sender address and password are usable.
    pub fn from_email_settings(settings: &EmailSettings) -> Option<Self> {
        let sender = settings
            .sender_email
            .as_deref()
            .filter(|v| !is_placeholder(v))?;
        let password = settings
            .sender_password
            .as_deref()
            .filter(|v| !is_placeholder(v))?;
        Some(Self {
            server: settings.smtp_server.clone(),
            port: settings.smtp_port,
            sender_email: sender.to_string(),
            sender_name: settings.sender_name.clone(),
            password: password.to_string(),
        })
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Plain and HTML renderings of a survey invitation.
pub fn render_survey_email(body: &str, link: &str) -> (String, String) {
    let plain = if body.contains(link) {
        body.trim_end().to_string()
    } else {
        format!("{}\n\n{SURVEY_LINK_LABEL} {link}", body.trim_end())
    };

    let paragraphs = escape_html(body.trim())
        .split("\n\n")
        .map(|p| format!("<p>{}</p>", p.replace('\n', "<br>")))
        .collect::<Vec<_>>()
        .join("\n");
    let link = escape_html(link);
    let html = format!(
        "<!DOCTYPE html>\n<html>\n<body style=\"font-family: sans-serif; line-height: 1.5;\">\n\
         <h2>Restaurant recommendation survey</h2>\n\
         {paragraphs}\n\
         <p style=\"margin: 24px 0;\">\
         <a href=\"{link}\" style=\"background: #4285f4; color: #fff; padding: 12px 24px; \
         border-radius: 4px; text-decoration: none;\">Take the survey</a></p>\n\
         <p style=\"color: #666; font-size: 12px;\">{link}</p>\n\
         </body>\n</html>\n"
    );
    (plain, html)
}

/// Preview of a Markdown report: the first `REPORT_PREVIEW_CHARS` characters.
pub fn render_report_email(report: &str, file_name: &str) -> (String, String) {
    let mut preview: String = report.chars().take(REPORT_PREVIEW_CHARS).collect();
    if report.chars().count() > REPORT_PREVIEW_CHARS {
        preview.push_str("...");
    }
    let plain = format!(
        "A survey analysis report is ready.\n\n{preview}\n\nFull report: {file_name}\n"
    );
    let html = format!(
        "<!DOCTYPE html>\n<html>\n<body style=\"font-family: sans-serif; line-height: 1.5;\">\n\
         <h2>Survey analysis report</h2>\n\
         <pre style=\"white-space: pre-wrap;\">{}</pre>\n\
         <p style=\"color: #666; font-size: 12px;\">Full report: {}</p>\n\
         </body>\n</html>\n",
        escape_html(&preview),
        escape_html(file_name)
    );
    (plain, html)
}

pub struct Mailer {
    smtp: Option<SmtpSettings>,
}

impl Mailer {
    pub fn from_settings(settings: &EmailSettings) -> Self {
        let smtp = SmtpSettings::from_email_settings(settings);
        if smtp.is_none() {
            info!("no sender credentials configured; email delivery is simulated");
        }
        Self { smtp }
    }

    pub fn simulated() -> Self {
        Self { smtp: None }
    }

    pub fn is_simulated(&self) -> bool {
        self.smtp.is_none()
    }

    fn build_message(
        smtp: &SmtpSettings,
        recipient: &str,
        subject: &str,
        plain: String,
        html: String,
    ) -> Result<Message> {
        let from: Mailbox = format!("{} <{}>", smtp.sender_name, smtp.sender_email)
            .parse()
            .map_err(|e| CrewError::Mail(format!("invalid sender address: {e}")))?;
        let to: Mailbox = recipient
            .parse()
            .map_err(|e| CrewError::Mail(format!("invalid recipient {recipient}: {e}")))?;
        Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_PLAIN).body(plain))
                    .singlepart(SinglePart::builder().header(ContentType::TEXT_HTML).body(html)),
            )
            .map_err(|e| CrewError::Mail(format!("failed to build email: {e}")))
    }

    async fn deliver(smtp: &SmtpSettings, message: Message) -> Result<()> {
        let creds = Credentials::new(smtp.sender_email.clone(), smtp.password.clone());
        let builder = if smtp.port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.server)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.server)
        }
        .map_err(|e| CrewError::Mail(format!("SMTP relay error: {e}")))?;
        let transport = builder.port(smtp.port).credentials(creds).build();
        transport
            .send(message)
            .await
            .map_err(|e| CrewError::Mail(format!("failed to send email: {e}")))?;
        Ok(())
    }

    async fn send_rendered(
        &self,
        recipient: &str,
        subject: &str,
        plain: String,
        html: String,
    ) -> DeliveryOutcome {
        let Some(smtp) = &self.smtp else {
            info!(%recipient, %subject, "simulated email");
            info!("body: {plain}");
            return DeliveryOutcome::Simulated;
        };

        let result = match Self::build_message(smtp, recipient, subject, plain, html) {
            Ok(message) => Self::deliver(smtp, message).await,
            Err(err) => Err(err),
        };
        match result {
            Ok(()) => {
                info!(%recipient, "email sent");
                DeliveryOutcome::Sent
            }
            Err(err) => {
                error!(%recipient, error = %err, "email delivery failed");
                DeliveryOutcome::Failed(err.to_string())
            }
        }
    }

    /// Never returns an error; failures come back as `DeliveryOutcome::Failed`.
    pub async fn send(
        &self,
        recipient: &str,
        subject: &str,
        body: &str,
        link: &str,
    ) -> DeliveryOutcome {
        let (plain, html) = render_survey_email(body, link);
        self.send_rendered(recipient, subject, plain, html).await
    }

    pub async fn send_report(
        &self,
        recipients: &[String],
        subject: &str,
        report: &str,
        file_name: &str,
    ) -> Vec<(String, DeliveryOutcome)> {
        let (plain, html) = render_report_email(report, file_name);
        let mut outcomes = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let outcome = self
                .send_rendered(recipient, subject, plain.clone(), html.clone())
                .await;
            outcomes.push((recipient.clone(), outcome));
        }
        outcomes
    }

    /// One attempt per recipient; a failure does not stop the rest.
    pub async fn send_all(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
        link: &str,
    ) -> Vec<(String, DeliveryOutcome)> {
        let mut outcomes = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let outcome = self.send(recipient, subject, body, link).await;
            outcomes.push((recipient.clone(), outcome));
        }
        outcomes
    }
}
