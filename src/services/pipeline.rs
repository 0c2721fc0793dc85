use std::time::Instant;

use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::crew::{roster, Crew, CrewInputs};
use crate::domains::agent::{AgentSpec, TaskSpec};
use crate::domains::survey::SurveyForm;
use crate::error::Result;
use crate::extract::{
    extract_survey_link, find_survey_link, has_labeled_link, split_email_draft, survey_link_line,
};
use crate::google::forms::{CHOICE_QUESTION, COMMENT_QUESTION};
use crate::mail::DeliveryOutcome;
use crate::services::survey::SurveySummary;

/// The four workflow steps. Each one logs its prompts, responses and timing
/// to the session and returns the model's text.
pub struct RestaurantPipeline<'a> {
    ctx: &'a AppContext,
}

fn crew_inputs<const N: usize>(pairs: [(&str, String); N]) -> CrewInputs {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn form_text(form: &SurveyForm, collect_comments: bool) -> String {
    let mut text = format!(
        "{}\n\nForm: {}\nQuestions:\n1. {CHOICE_QUESTION} (single choice)\n",
        survey_link_line(&form.responder_url),
        form.title
    );
    if collect_comments {
        text.push_str(&format!("2. {COMMENT_QUESTION} (free text)\n"));
    }
    text
}

impl<'a> RestaurantPipeline<'a> {
    pub fn new(ctx: &'a AppContext) -> Self {
        Self { ctx }
    }

    fn crew(&self, name: &str, agents: Vec<AgentSpec>, tasks: Vec<TaskSpec>) -> Crew {
        Crew::new(name, agents, tasks)
            .with_max_tool_rounds(self.ctx.config.system_settings.max_tool_rounds)
    }

    async fn kickoff(&self, task_id: &str, crew: &Crew, inputs: &CrewInputs) -> Result<String> {
        let output = crew.kickoff(self.ctx, inputs).await?;
        for task in &output.task_outputs {
            let meta = json!({ "task": task.task, "agent": task.agent });
            self.ctx
                .session
                .record_prompt(task_id, &task.prompt, Some(meta.clone()));
            self.ctx
                .session
                .record_response(task_id, &task.raw, Some(meta));
        }
        Ok(output.raw)
    }

    fn finish(
        &self,
        task_id: &str,
        step: &str,
        started: Instant,
        result: Result<String>,
    ) -> Result<String> {
        let elapsed = started.elapsed();
        match result {
            Ok(text) => {
                self.ctx.session.complete(task_id, &text, elapsed);
                info!(%step, secs = elapsed.as_secs_f64(), "step completed");
                Ok(text)
            }
            Err(err) => {
                self.ctx.session.fail(task_id, &err.to_string(), elapsed);
                error!(%step, error = %err, secs = elapsed.as_secs_f64(), "step failed");
                Err(err)
            }
        }
    }

    pub async fn recommend(&self, request: &str) -> Result<String> {
        println!("Finding restaurants...");
        let max = self.ctx.config.restaurant_settings.max_recommendations.max(1);
        let task_id = self.ctx.session.start_task(
            "restaurant_recommendation",
            "restaurant_crew",
            json!({ "user_request": request, "max_recommendations": max }),
        );
        let started = Instant::now();
        let crew = self.crew(
            "recommendation",
            vec![roster::researcher(), roster::curator(), roster::communicator()],
            vec![
                roster::research_task(),
                roster::curation_task(),
                roster::presentation_task(),
            ],
        );
        let inputs = crew_inputs([
            ("user_request", request.to_string()),
            ("max_recommendations", max.to_string()),
            ("max_candidates", (max + 2).to_string()),
        ]);
        let result = self.kickoff(&task_id, &crew, &inputs).await;
        self.finish(&task_id, "recommend", started, result)
    }

    /// Always returns text with a labeled survey link line.
    pub async fn create_survey(&self, recommendations: &str) -> Result<String> {
        println!("Creating the survey...");
        let task_id = self.ctx.session.start_task(
            "survey_form_creation",
            roster::FORM_CREATOR,
            json!({
                "recommendations_length": recommendations.chars().count(),
                "forms_provider": self.ctx.forms.is_some(),
            }),
        );
        let started = Instant::now();
        let result = self.create_survey_inner(&task_id, recommendations).await;
        self.finish(&task_id, "create_survey", started, result)
    }

    async fn create_survey_inner(&self, task_id: &str, recommendations: &str) -> Result<String> {
        let today = self.ctx.today();
        let settings = &self.ctx.config.survey_settings;

        if let Some(forms) = &self.ctx.forms {
            match forms
                .create_restaurant_survey(recommendations, settings, today)
                .await
            {
                Some(form) => {
                    self.ctx.session.log_api_call(
                        "google_forms",
                        "forms.create",
                        &format!("created {}", form.form_id),
                    );
                    let text = form_text(&form, settings.collect_comments);
                    self.ctx.session.record_response(
                        task_id,
                        &text,
                        Some(json!({ "form_id": form.form_id })),
                    );
                    return Ok(text);
                }
                None => {
                    self.ctx.session.log_api_call(
                        "google_forms",
                        "forms.create",
                        "failed; using text survey",
                    );
                    warn!("google form unavailable; falling back to a text survey");
                }
            }
        }

        let crew = self.crew(
            "survey",
            vec![roster::form_creator()],
            vec![roster::form_creation_task()],
        );
        let inputs = crew_inputs([
            ("restaurant_recommendations", recommendations.to_string()),
            ("current_date", today.format("%Y%m%d").to_string()),
        ]);
        let text = self.kickoff(task_id, &crew, &inputs).await?;
        if has_labeled_link(&text) {
            return Ok(text);
        }
        let link = extract_survey_link(&text, today);
        if find_survey_link(&text).is_none() {
            self.ctx
                .session
                .warn(&format!("no survey link in agent output; using {link}"));
        }
        Ok(format!("{}\n\n{}", survey_link_line(&link), text.trim()))
    }

    pub async fn send_emails(&self, link_or_text: &str, recipients: &[String]) -> Result<String> {
        println!("Preparing survey emails...");
        let link = extract_survey_link(link_or_text, self.ctx.today());
        info!(%link, recipients = recipients.len(), "survey link resolved");
        let task_id = self.ctx.session.start_task(
            "survey_email_sending",
            roster::EMAIL_SENDER,
            json!({ "survey_link": link, "recipients_count": recipients.len() }),
        );
        let started = Instant::now();
        let result = self.send_emails_inner(&task_id, &link, recipients).await;
        self.finish(&task_id, "send_emails", started, result)
    }

    async fn send_emails_inner(
        &self,
        task_id: &str,
        link: &str,
        recipients: &[String],
    ) -> Result<String> {
        let default_subject = self.ctx.config.email_settings.subject.clone();
        let crew = self.crew(
            "email",
            vec![roster::email_sender()],
            vec![roster::email_task()],
        );
        let inputs = crew_inputs([
            ("survey_link", link.to_string()),
            ("recipient_count", recipients.len().to_string()),
            ("email_subject", default_subject.clone()),
        ]);
        let draft = self.kickoff(task_id, &crew, &inputs).await?;

        if recipients.is_empty() {
            self.ctx
                .session
                .note("no email recipients; delivery skipped");
            return Ok(format!("{}\n\nDelivery: no recipients", draft.trim()));
        }

        let (subject, body) = split_email_draft(&draft);
        let subject = subject.unwrap_or(default_subject);
        let outcomes = self
            .ctx
            .mailer
            .send_all(recipients, &subject, &body, link)
            .await;

        let (mut sent, mut simulated, mut failed) = (0, 0, 0);
        for (recipient, outcome) in &outcomes {
            match outcome {
                DeliveryOutcome::Sent => sent += 1,
                DeliveryOutcome::Simulated => simulated += 1,
                DeliveryOutcome::Failed(_) => failed += 1,
            }
            self.ctx.session.log_email_sending(
                std::slice::from_ref(recipient),
                &subject,
                outcome.is_success(),
            );
        }
        Ok(format!(
            "{}\n\nDelivery: {sent} sent, {simulated} simulated, {failed} failed",
            draft.trim()
        ))
    }

    pub async fn analyze(&self, summary: &SurveySummary) -> Result<String> {
        println!("Analyzing survey results...");
        let overview = json!({
            "total_responses": summary.total_responses,
            "restaurant_count": summary.restaurant_preferences.len(),
        });
        let task_id = self.ctx.session.start_task(
            "survey_data_analysis",
            roster::DATA_ANALYST,
            overview.clone(),
        );
        let started = Instant::now();
        let result = self.analyze_inner(&task_id, summary, &overview).await;
        self.finish(&task_id, "analyze", started, result)
    }

    async fn analyze_inner(
        &self,
        task_id: &str,
        summary: &SurveySummary,
        overview: &Value,
    ) -> Result<String> {
        self.ctx
            .session
            .log_data_analysis("survey_response_analysis", overview, "started");
        let crew = self.crew(
            "analysis",
            vec![roster::data_analyst()],
            vec![roster::analysis_task()],
        );
        let inputs = crew_inputs([(
            "survey_responses",
            serde_json::to_string_pretty(summary)?,
        )]);
        let analysis = self.kickoff(task_id, &crew, &inputs).await?;
        self.ctx
            .session
            .log_data_analysis("survey_response_analysis", overview, &analysis);
        Ok(analysis)
    }
}
