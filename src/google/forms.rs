use chrono::NaiveDate;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::Authenticator;
use crate::config::SurveySettings;
use crate::domains::survey::{RankedRestaurant, SurveyForm};
use crate::error::{CrewError, Result};
use crate::extract::{choice_label, parse_ranked_restaurants};

const FORMS_BASE: &str = "https://forms.googleapis.com/v1";
const DRIVE_BASE: &str = "https://www.googleapis.com/drive/v3";

pub const CHOICE_QUESTION: &str = "Which recommended restaurant do you like best?";
pub const COMMENT_QUESTION: &str = "Any other comments about the recommendations?";

#[derive(Debug, Clone)]
pub struct CreatedForm {
    pub form_id: String,
    pub responder_uri: Option<String>,
}

/// A form with its questions and every collected response.
#[derive(Debug, Clone)]
pub struct FormData {
    pub form_id: String,
    pub title: String,
    pub total_responses: u32,
    pub responses: Vec<Value>,
    pub questions: Vec<Value>,
}

pub struct FormsClient {
    auth: Authenticator,
    http: reqwest::Client,
    forms_base: String,
    drive_base: String,
}

pub fn responder_url(form_id: &str) -> String {
    format!("https://docs.google.com/forms/d/{form_id}/viewform")
}

/// Accepts a bare form id or an edit/view URL containing `/forms/d/<id>`.
pub fn parse_form_id(input: &str) -> Option<String> {
    let input = input.trim();
    let id = match input.split_once("/forms/d/") {
        Some((_, rest)) => rest.split(['/', '?', '#']).next().unwrap_or_default(),
        None => input,
    };
    if id.is_empty() || id == "e" || id.contains(char::is_whitespace) {
        return None;
    }
    Some(id.to_string())
}

pub fn survey_title(prefix: &str, today: NaiveDate) -> String {
    format!("{prefix} - {}", today.format("%Y-%m-%d"))
}

/// `batchUpdate` requests: one single-choice question over the restaurant
/// labels, then an optional free-text question.
pub fn survey_requests(restaurants: &[RankedRestaurant], collect_comments: bool) -> Vec<Value> {
    let options: Vec<Value> = restaurants
        .iter()
        .map(|r| json!({ "value": choice_label(r) }))
        .collect();
    let mut requests = vec![json!({
        "createItem": {
            "item": {
                "title": CHOICE_QUESTION,
                "questionItem": {
                    "question": {
                        "required": true,
                        "choiceQuestion": { "type": "RADIO", "options": options }
                    }
                }
            },
            "location": { "index": 0 }
        }
    })];
    if collect_comments {
        requests.push(json!({
            "createItem": {
                "item": {
                    "title": COMMENT_QUESTION,
                    "questionItem": {
                        "question": {
                            "required": false,
                            "textQuestion": { "paragraph": true }
                        }
                    }
                },
                "location": { "index": 1 }
            }
        }));
    }
    requests
}

impl FormsClient {
    pub fn new(auth: Authenticator) -> Self {
        Self {
            auth,
            http: reqwest::Client::new(),
            forms_base: FORMS_BASE.to_string(),
            drive_base: DRIVE_BASE.to_string(),
        }
    }

    pub fn with_base_urls(mut self, forms_base: &str, drive_base: &str) -> Self {
        self.forms_base = forms_base.trim_end_matches('/').to_string();
        self.drive_base = drive_base.trim_end_matches('/').to_string();
        self
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Value> {
        let token = self.auth.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        match status {
            s if s.is_success() => {
                if body.trim().is_empty() {
                    Ok(Value::Null)
                } else {
                    Ok(serde_json::from_str(&body)?)
                }
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CrewError::Auth(format!(
                "{what} rejected ({status}): {body}"
            ))),
            _ => Err(CrewError::Http(format!("{what} failed ({status}): {body}"))),
        }
    }

    pub async fn create_form(&self, title: &str) -> Result<CreatedForm> {
        let url = format!("{}/forms", self.forms_base);
        let body = json!({ "info": { "title": title, "documentTitle": title } });
        let created = self
            .send(self.http.post(url).json(&body), "create form")
            .await?;
        let form_id = created["formId"]
            .as_str()
            .ok_or_else(|| CrewError::Serialization("create form: no formId".to_string()))?
            .to_string();
        info!(%form_id, "google form created");
        Ok(CreatedForm {
            form_id,
            responder_uri: created["responderUri"].as_str().map(str::to_string),
        })
    }

    pub async fn add_questions(&self, form_id: &str, requests: Vec<Value>) -> Result<()> {
        let url = format!("{}/forms/{form_id}:batchUpdate", self.forms_base);
        self.send(
            self.http.post(url).json(&json!({ "requests": requests })),
            "add questions",
        )
        .await?;
        Ok(())
    }

    pub async fn share_form(&self, form_id: &str, emails: &[String]) -> Result<()> {
        let url = format!("{}/files/{form_id}/permissions", self.drive_base);
        for email in emails {
            let body = json!({ "type": "user", "role": "writer", "emailAddress": email });
            self.send(
                self.http
                    .post(&url)
                    .query(&[("sendNotificationEmail", "false")])
                    .json(&body),
                "share form",
            )
            .await?;
            info!(%form_id, %email, "form shared");
        }
        Ok(())
    }

    pub async fn get_form(&self, form_id: &str) -> Result<Value> {
        let url = format!("{}/forms/{form_id}", self.forms_base);
        self.send(self.http.get(url), "get form").await
    }

    pub async fn list_responses(&self, form_id: &str) -> Result<Vec<Value>> {
        let url = format!("{}/forms/{form_id}/responses", self.forms_base);
        let mut responses = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self.http.get(&url);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }
            let page = self.send(request, "list responses").await?;
            if let Some(items) = page["responses"].as_array() {
                responses.extend(items.iter().cloned());
            }
            page_token = page["nextPageToken"].as_str().map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }
        Ok(responses)
    }

    pub async fn fetch_form_data(&self, form_id: &str) -> Result<FormData> {
        let form = self.get_form(form_id).await?;
        let responses = self.list_responses(form_id).await?;
        let title = form["info"]["title"]
            .as_str()
            .unwrap_or("Survey")
            .to_string();
        info!(%form_id, %title, responses = responses.len(), "form responses fetched");
        Ok(FormData {
            form_id: form_id.to_string(),
            title,
            total_responses: responses.len() as u32,
            responses,
            questions: form["items"].as_array().cloned().unwrap_or_default(),
        })
    }

    /// Builds the restaurant survey. Any failure before the questions are in
    /// place yields `None`; sharing failures only warn.
    pub async fn create_restaurant_survey(
        &self,
        recommendations: &str,
        settings: &SurveySettings,
        today: NaiveDate,
    ) -> Option<SurveyForm> {
        let restaurants = parse_ranked_restaurants(recommendations);
        if restaurants.is_empty() {
            warn!("no ranked restaurants found in recommendations; skipping form");
            return None;
        }

        let title = survey_title(&settings.title_prefix, today);
        let created = match self.create_form(&title).await {
            Ok(created) => created,
            Err(err) => {
                warn!(error = %err, "form creation failed");
                return None;
            }
        };

        let requests = survey_requests(&restaurants, settings.collect_comments);
        if let Err(err) = self.add_questions(&created.form_id, requests).await {
            warn!(error = %err, form_id = %created.form_id, "adding questions failed");
            return None;
        }

        if !settings.share_with.is_empty() {
            if let Err(err) = self
                .share_form(&created.form_id, &settings.share_with)
                .await
            {
                warn!(error = %err, form_id = %created.form_id, "sharing form failed");
            }
        }

        let responder_url = created
            .responder_uri
            .clone()
            .unwrap_or_else(|| responder_url(&created.form_id));
        Some(SurveyForm {
            form_id: created.form_id,
            responder_url,
            title,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requests_carry_restaurant_labels() {
        let restaurants = vec![
            RankedRestaurant {
                rank: 1,
                name: "Tosokchon".into(),
                ..Default::default()
            },
            RankedRestaurant {
                rank: 2,
                name: "Imun Seolnongtang".into(),
                ..Default::default()
            },
        ];
        let requests = survey_requests(&restaurants, true);
        assert_eq!(requests.len(), 2);
        let options = &requests[0]["createItem"]["item"]["questionItem"]["question"]
            ["choiceQuestion"]["options"];
        assert_eq!(options[1]["value"], json!("[2] Imun Seolnongtang"));
        assert_eq!(survey_requests(&restaurants, false).len(), 1);
    }

    #[test]
    fn form_ids_come_from_ids_or_urls() {
        assert_eq!(parse_form_id(" 1AbC_d-9 ").as_deref(), Some("1AbC_d-9"));
        assert_eq!(
            parse_form_id("https://docs.google.com/forms/d/1AbC/edit#responses").as_deref(),
            Some("1AbC")
        );
        assert_eq!(parse_form_id(""), None);
        assert_eq!(parse_form_id("https://docs.google.com/forms/d/e/1FAIpQ/viewform"), None);
    }

    #[test]
    fn title_is_prefixed_and_dated() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();
        assert_eq!(survey_title("Lunch survey", day), "Lunch survey - 2026-03-09");
    }
}
