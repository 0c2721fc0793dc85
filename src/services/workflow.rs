//! The end-to-end run: recommend, build the survey, gate and send the
//! invitations, then analyze the survey results.

use std::time::{Duration, Instant};

use rust_fsm::*;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::context::AppContext;
use crate::error::{CrewError, Result};
use crate::extract::extract_survey_link;
use crate::interfaces::confirm::Confirm;
use crate::services::pipeline::RestaurantPipeline;
use crate::services::survey::{mock_survey_data, SurveySummary};

state_machine! {
    workflow_flow(Recommend)

    Recommend(Recommended) => CreateSurvey,
    CreateSurvey(SurveyReady) => ConfirmSend,
    ConfirmSend(Approve) => SendEmail,
    ConfirmSend(Decline) => Analyze,
    SendEmail(EmailsSent) => AwaitResponses,
    AwaitResponses(ResponsesIn) => Analyze,
    Analyze(Analyzed) => Done,

    Recommend(Fail) => Failed,
    CreateSurvey(Fail) => Failed,
    ConfirmSend(Fail) => Failed,
    SendEmail(Fail) => Failed,
    AwaitResponses(Fail) => Failed,
    Analyze(Fail) => Failed
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    Recommend,
    CreateSurvey,
    ConfirmSend,
    SendEmail,
    AwaitResponses,
    Analyze,
    Done,
    Failed,
}

impl WorkflowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkflowState::Done | WorkflowState::Failed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkflowEvent {
    Recommended,
    SurveyReady,
    Approve,
    Decline,
    EmailsSent,
    ResponsesIn,
    Analyzed,
    Fail,
}

fn expected_next_state(current: WorkflowState, event: WorkflowEvent) -> Option<WorkflowState> {
    use WorkflowEvent as E;
    use WorkflowState as S;
    match (current, event) {
        (S::Recommend, E::Recommended) => Some(S::CreateSurvey),
        (S::CreateSurvey, E::SurveyReady) => Some(S::ConfirmSend),
        (S::ConfirmSend, E::Approve) => Some(S::SendEmail),
        (S::ConfirmSend, E::Decline) => Some(S::Analyze),
        (S::SendEmail, E::EmailsSent) => Some(S::AwaitResponses),
        (S::AwaitResponses, E::ResponsesIn) => Some(S::Analyze),
        (S::Analyze, E::Analyzed) => Some(S::Done),
        (state, E::Fail) if !state.is_terminal() => Some(S::Failed),
        _ => None,
    }
}

fn machine_input(event: WorkflowEvent) -> workflow_flow::Input {
    match event {
        WorkflowEvent::Recommended => workflow_flow::Input::Recommended,
        WorkflowEvent::SurveyReady => workflow_flow::Input::SurveyReady,
        WorkflowEvent::Approve => workflow_flow::Input::Approve,
        WorkflowEvent::Decline => workflow_flow::Input::Decline,
        WorkflowEvent::EmailsSent => workflow_flow::Input::EmailsSent,
        WorkflowEvent::ResponsesIn => workflow_flow::Input::ResponsesIn,
        WorkflowEvent::Analyzed => workflow_flow::Input::Analyzed,
        WorkflowEvent::Fail => workflow_flow::Input::Fail,
    }
}

/// Tracks the run through the machine and remembers every state entered.
pub struct Progress {
    machine: workflow_flow::StateMachine,
    current: WorkflowState,
    visited: Vec<WorkflowState>,
}

impl Default for Progress {
    fn default() -> Self {
        Self::new()
    }
}

impl Progress {
    pub fn new() -> Self {
        Self {
            machine: workflow_flow::StateMachine::new(),
            current: WorkflowState::Recommend,
            visited: vec![WorkflowState::Recommend],
        }
    }

    pub fn current(&self) -> WorkflowState {
        self.current
    }

    pub fn visited(&self) -> &[WorkflowState] {
        &self.visited
    }

    pub fn advance(&mut self, event: WorkflowEvent) -> Result<WorkflowState> {
        let invalid = || {
            CrewError::Runtime(format!(
                "no workflow transition from {:?} on {event:?}",
                self.current
            ))
        };
        self.machine
            .consume(&machine_input(event))
            .map_err(|_| invalid())?;
        let next = expected_next_state(self.current, event).ok_or_else(invalid)?;
        self.current = next;
        self.visited.push(next);
        Ok(next)
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowOutcome {
    pub request: String,
    pub recommendations: String,
    pub survey: String,
    pub survey_link: String,
    /// `None` when the send gate was declined.
    pub email_result: Option<String>,
    pub survey_data: SurveySummary,
    pub analysis: String,
    pub execution_time: Duration,
    pub states: Vec<WorkflowState>,
}

impl WorkflowOutcome {
    pub fn to_json(&self) -> Value {
        json!({
            "user_request": self.request,
            "recommendations": self.recommendations,
            "survey_form": self.survey,
            "survey_link": self.survey_link,
            "email_result": self.email_result,
            "analysis_result": self.analysis,
            "workflow_execution_time": self.execution_time.as_secs_f64(),
            "states": self.states,
        })
    }
}

pub struct WorkflowDriver<'a> {
    ctx: &'a AppContext,
    confirm: &'a dyn Confirm,
    response_wait: Duration,
}

impl<'a> WorkflowDriver<'a> {
    pub fn new(ctx: &'a AppContext, confirm: &'a dyn Confirm) -> Self {
        Self {
            ctx,
            confirm,
            response_wait: Duration::ZERO,
        }
    }

    /// Pause in the simulated response-collection state.
    pub fn with_response_wait(mut self, wait: Duration) -> Self {
        self.response_wait = wait;
        self
    }

    pub async fn run(&self, request: &str, recipients: &[String]) -> Result<WorkflowOutcome> {
        let started = Instant::now();
        info!(%request, recipients = recipients.len(), "workflow started");
        self.ctx.session.note(&format!(
            "workflow started | request: {request} | recipients: {}",
            recipients.len()
        ));

        let mut progress = Progress::new();
        match self.drive(&mut progress, request, recipients).await {
            Ok(mut outcome) => {
                outcome.execution_time = started.elapsed();
                outcome.states = progress.visited().to_vec();
                self.ctx.session.note(&format!(
                    "workflow completed in {:.2}s",
                    outcome.execution_time.as_secs_f64()
                ));
                Ok(outcome)
            }
            Err(err) => {
                let at = progress.current();
                if let Err(fsm_err) = progress.advance(WorkflowEvent::Fail) {
                    warn!(error = %fsm_err, "failure recorded outside the machine");
                }
                let secs = started.elapsed().as_secs_f64();
                let states = progress.visited();
                error!(state = ?at, error = %err, secs, ?states, "workflow failed");
                self.ctx.session.warn(&format!(
                    "workflow failed in {at:?} after {secs:.2}s: {err} | states: {states:?}"
                ));
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        progress: &mut Progress,
        request: &str,
        recipients: &[String],
    ) -> Result<WorkflowOutcome> {
        let pipeline = RestaurantPipeline::new(self.ctx);

        println!("\n[1/5] Restaurant recommendations");
        let recommendations = pipeline.recommend(request).await?;
        progress.advance(WorkflowEvent::Recommended)?;

        println!("\n[2/5] Survey form");
        let survey = pipeline.create_survey(&recommendations).await?;
        progress.advance(WorkflowEvent::SurveyReady)?;
        let survey_link = extract_survey_link(&survey, self.ctx.today());

        let question = format!(
            "Send the survey ({survey_link}) to {} recipient(s)?",
            recipients.len()
        );
        let email_result = if self.confirm.confirm(&question).await? {
            progress.advance(WorkflowEvent::Approve)?;
            println!("\n[3/5] Survey emails");
            let result = pipeline.send_emails(&survey, recipients).await?;
            progress.advance(WorkflowEvent::EmailsSent)?;

            println!("\n[4/5] Waiting for responses (simulated)");
            self.ctx
                .session
                .note("waiting for survey responses (simulated)");
            if !self.response_wait.is_zero() {
                tokio::time::sleep(self.response_wait).await;
            }
            progress.advance(WorkflowEvent::ResponsesIn)?;
            Some(result)
        } else {
            println!("Survey email skipped.");
            self.ctx.session.note("survey email declined; delivery skipped");
            progress.advance(WorkflowEvent::Decline)?;
            None
        };

        println!("\n[5/5] Survey analysis");
        let survey_data = mock_survey_data();
        self.ctx.session.note(&format!(
            "mock survey data: {}",
            serde_json::to_string(&survey_data)?
        ));
        let analysis = pipeline.analyze(&survey_data).await?;
        progress.advance(WorkflowEvent::Analyzed)?;

        Ok(WorkflowOutcome {
            request: request.to_string(),
            recommendations,
            survey,
            survey_link,
            email_result,
            survey_data,
            analysis,
            execution_time: Duration::ZERO,
            states: Vec::new(),
        })
    }
}
