use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One restaurant pulled out of the recommendation text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedRestaurant {
    pub rank: u32,
    pub name: String,
    pub address: Option<String>,
    pub price_range: Option<String>,
    pub rating: Option<String>,
    pub hours: Option<String>,
    pub phone: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveyForm {
    pub form_id: String,
    pub responder_url: String,
    pub title: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveySummary {
    pub total_responses: u32,
    pub restaurant_preferences: BTreeMap<String, u32>,
    pub satisfaction_scores: BTreeMap<String, f64>,
    pub price_satisfaction: BTreeMap<String, u32>,
    pub improvement_suggestions: Vec<String>,
    pub feedback_comments: Vec<String>,
}
