//! Survey response summaries and the Markdown report.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::error::Result;
use crate::extract::is_choice_label;
use crate::google::forms::FormData;

pub use crate::domains::survey::SurveySummary;

const COMMENT_MIN_CHARS: usize = 10;
const REPORT_COMMENT_LIMIT: usize = 10;

/// Fixed stand-in results used while no real responses exist.
pub fn mock_survey_data() -> SurveySummary {
    let counts = |pairs: &[(&str, u32)]| -> BTreeMap<String, u32> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    };
    SurveySummary {
        total_responses: 25,
        restaurant_preferences: counts(&[
            ("Restaurant A", 12),
            ("Restaurant B", 8),
            ("Restaurant C", 5),
        ]),
        satisfaction_scores: [
            ("Restaurant A", 4.2),
            ("Restaurant B", 3.8),
            ("Restaurant C", 4.0),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect(),
        price_satisfaction: counts(&[
            ("very satisfied", 8),
            ("satisfied", 12),
            ("neutral", 4),
            ("unsatisfied", 1),
        ]),
        improvement_suggestions: vec![
            "more menu options".to_string(),
            "better quality for the price".to_string(),
            "service improvements".to_string(),
        ],
        feedback_comments: Vec::new(),
    }
}

fn first_text_answer(answer: &serde_json::Value) -> Option<&str> {
    answer["textAnswers"]["answers"]
        .as_array()?
        .first()?
        .get("value")?
        .as_str()
}

/// Counts restaurant votes and collects longer free-text answers. Duplicate
/// respondents and malformed entries are taken as they come.
pub fn summarize_responses(form: &FormData) -> SurveySummary {
    let mut summary = SurveySummary {
        total_responses: form.total_responses,
        ..Default::default()
    };
    for response in &form.responses {
        let Some(answers) = response["answers"].as_object() else {
            continue;
        };
        for answer in answers.values() {
            let Some(text) = first_text_answer(answer) else {
                continue;
            };
            if is_choice_label(text) {
                *summary
                    .restaurant_preferences
                    .entry(text.trim().to_string())
                    .or_insert(0) += 1;
            } else if text.chars().count() > COMMENT_MIN_CHARS {
                summary.feedback_comments.push(text.to_string());
            }
        }
    }
    summary
}

pub fn render_report(
    analysis: &str,
    summary: &SurveySummary,
    title: &str,
    generated_at: DateTime<Local>,
) -> String {
    let mut out = String::new();
    out.push_str("# Survey Analysis Report\n\n## Overview\n\n");
    out.push_str(&format!("- **Survey**: {title}\n"));
    out.push_str(&format!(
        "- **Analyzed at**: {}\n",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("- **Responses**: {}\n\n---\n\n", summary.total_responses));

    if !summary.restaurant_preferences.is_empty() {
        out.push_str("## Restaurant preferences\n\n");
        let mut ranked: Vec<(&String, &u32)> = summary.restaurant_preferences.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        for (name, votes) in ranked {
            if summary.total_responses > 0 {
                let pct = f64::from(*votes) / f64::from(summary.total_responses) * 100.0;
                out.push_str(&format!("- **{name}**: {votes} votes ({pct:.1}%)\n"));
            } else {
                out.push_str(&format!("- **{name}**: {votes} votes\n"));
            }
        }
        out.push('\n');
    }

    if !summary.feedback_comments.is_empty() {
        out.push_str("## Feedback\n\n");
        for (idx, comment) in summary
            .feedback_comments
            .iter()
            .take(REPORT_COMMENT_LIMIT)
            .enumerate()
        {
            out.push_str(&format!("{}. \"{comment}\"\n", idx + 1));
        }
        let rest = summary
            .feedback_comments
            .len()
            .saturating_sub(REPORT_COMMENT_LIMIT);
        if rest > 0 {
            out.push_str(&format!("\n...and {rest} more\n"));
        }
        out.push('\n');
    }

    out.push_str("---\n\n## Analysis\n\n");
    out.push_str(analysis.trim());
    out.push_str(&format!(
        "\n\n---\n\n_Generated {}_\n",
        generated_at.to_rfc3339()
    ));
    out
}

pub fn write_report(dir: &Path, content: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!(
        "survey_report_{}.md",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    fs::write(&path, content)?;
    tracing::info!(path = %path.display(), "report written");
    Ok(path)
}
