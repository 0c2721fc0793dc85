//! Best-effort heuristics over free-form model output.
//!
//! Nothing here fails: a miss yields `None`, an empty list, or the dated
//! fallback link.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::domains::survey::RankedRestaurant;

pub const SURVEY_LINK_LABEL: &str = "Survey link:";
pub const EMAIL_START: &str = "===== EMAIL START =====";
pub const EMAIL_END: &str = "===== EMAIL END =====";

static LABELED_LINK: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"(?i)(?:survey\s+link|설문조사\s*링크)\s*[:：]\s*(https?://\S+)").ok()
});
static FORMS_LINK: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)https?://forms\.\S+").ok());
static RANK_BRACKET: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\[(\d{1,2})(?:위)?\]\s*(.+)$").ok());
static RANK_HASH: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^#(\d{1,2})\s+(.+)$").ok());
static RANK_DOTTED: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[.)]\s+(.+)$").ok());
static RANK_KOREAN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})위[.:)]?\s+(.+)$").ok());
static CHOICE_LABEL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^\[\d{1,2}(?:위)?\]\s*\S").ok());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Address,
    Price,
    Rating,
    Hours,
    Phone,
    Reason,
}

// Longer labels precede their prefixes.
const FIELD_LABELS: &[(&str, Field)] = &[
    ("address", Field::Address),
    ("location", Field::Address),
    ("주소", Field::Address),
    ("위치", Field::Address),
    ("price range", Field::Price),
    ("price", Field::Price),
    ("가격대", Field::Price),
    ("가격", Field::Price),
    ("rating", Field::Rating),
    ("평점", Field::Rating),
    ("opening hours", Field::Hours),
    ("hours", Field::Hours),
    ("영업시간", Field::Hours),
    ("phone", Field::Phone),
    ("tel", Field::Phone),
    ("전화번호", Field::Phone),
    ("전화", Field::Phone),
    ("why recommended", Field::Reason),
    ("reason", Field::Reason),
    ("why", Field::Reason),
    ("추천 이유", Field::Reason),
    ("추천이유", Field::Reason),
];

fn trim_url(url: &str) -> String {
    url.trim_end_matches(|c: char| ".,;:!?)]}>\"'*`".contains(c))
        .to_string()
}

/// First URL after the survey-link label, else the first `forms.*` URL.
pub fn find_survey_link(text: &str) -> Option<String> {
    if let Some(caps) = LABELED_LINK.as_ref().and_then(|re| re.captures(text)) {
        if let Some(url) = caps.get(1) {
            return Some(trim_url(url.as_str()));
        }
    }
    FORMS_LINK
        .as_ref()
        .and_then(|re| re.find(text))
        .map(|m| trim_url(m.as_str()))
}

pub fn fallback_survey_link(today: NaiveDate) -> String {
    format!("https://forms.gle/SURVEY-{}", today.format("%Y%m%d"))
}

pub fn extract_survey_link(text: &str, today: NaiveDate) -> String {
    find_survey_link(text).unwrap_or_else(|| fallback_survey_link(today))
}

/// Whether the text already carries a labeled survey link line.
pub fn has_labeled_link(text: &str) -> bool {
    LABELED_LINK.as_ref().is_some_and(|re| re.is_match(text))
}

/// Subject and body of an email draft. The body is the text between the
/// start and end markers when present, without its `Subject:` line.
pub fn split_email_draft(draft: &str) -> (Option<String>, String) {
    let inner = match (draft.find(EMAIL_START), draft.find(EMAIL_END)) {
        (Some(start), Some(end)) if end > start => &draft[start + EMAIL_START.len()..end],
        (Some(start), None) => &draft[start + EMAIL_START.len()..],
        _ => draft,
    };
    let mut subject = None;
    let mut body = Vec::new();
    for line in inner.lines() {
        let trimmed = line.trim().trim_start_matches('*');
        if subject.is_none() {
            if let Some(rest) = trimmed
                .strip_prefix("Subject:")
                .or_else(|| trimmed.strip_prefix("제목:"))
            {
                subject = Some(rest.trim().trim_end_matches('*').trim().to_string())
                    .filter(|s| !s.is_empty());
                continue;
            }
        }
        body.push(line);
    }
    (subject, body.join("\n").trim().to_string())
}

pub fn survey_link_line(url: &str) -> String {
    format!("{SURVEY_LINK_LABEL} {url}")
}

fn parse_heading(line: &str) -> Option<(u32, String)> {
    let trimmed = line.trim();
    let stripped = trimmed
        .trim_start_matches(|c: char| !c.is_alphanumeric() && c != '[')
        .trim();
    let candidates = [
        (RANK_HASH.as_ref(), trimmed),
        (RANK_BRACKET.as_ref(), stripped),
        (RANK_KOREAN.as_ref(), stripped),
        (RANK_DOTTED.as_ref(), stripped),
    ];
    for (regex, subject) in candidates {
        let Some(caps) = regex.and_then(|re| re.captures(subject)) else {
            continue;
        };
        let rank = caps.get(1)?.as_str().parse::<u32>().ok()?;
        let name = caps.get(2)?.as_str().trim().to_string();
        if rank == 0 || name.is_empty() || parse_field(&name).is_some() {
            return None;
        }
        return Some((rank, name));
    }
    None
}

fn parse_field(line: &str) -> Option<(Field, String)> {
    let body = line.trim_start_matches(|c: char| !c.is_alphanumeric());
    for (label, field) in FIELD_LABELS {
        // Labels are ASCII or Hangul, so an ASCII-insensitive prefix match suffices.
        let matched = body
            .get(..label.len())
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(label));
        if !matched {
            continue;
        }
        let rest = body[label.len()..].trim_start();
        let Some(value) = rest.strip_prefix(':').or_else(|| rest.strip_prefix('：')) else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        return Some((*field, value.to_string()));
    }
    None
}

/// Pulls rank headings and their labeled fields out of recommendation text.
/// Field lines before the first heading are ignored; a repeated rank keeps
/// the first occurrence.
pub fn parse_ranked_restaurants(text: &str) -> Vec<RankedRestaurant> {
    let mut out: Vec<RankedRestaurant> = Vec::new();
    let mut current: Option<usize> = None;

    for raw in text.lines() {
        let line = raw.replace('*', "");
        if line.trim().is_empty() {
            continue;
        }
        if let Some((rank, name)) = parse_heading(&line) {
            if out.iter().any(|r| r.rank == rank) {
                current = None;
                continue;
            }
            out.push(RankedRestaurant {
                rank,
                name,
                ..Default::default()
            });
            current = Some(out.len() - 1);
            continue;
        }
        let (Some(idx), Some((field, value))) = (current, parse_field(&line)) else {
            continue;
        };
        let entry = &mut out[idx];
        let slot = match field {
            Field::Address => &mut entry.address,
            Field::Price => &mut entry.price_range,
            Field::Rating => &mut entry.rating,
            Field::Hours => &mut entry.hours,
            Field::Phone => &mut entry.phone,
            Field::Reason => &mut entry.reason,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
    out
}

pub fn choice_label(restaurant: &RankedRestaurant) -> String {
    format!("[{}] {}", restaurant.rank, restaurant.name)
}

/// Whether a form answer looks like one of the generated restaurant choices.
pub fn is_choice_label(answer: &str) -> bool {
    CHOICE_LABEL
        .as_ref()
        .is_some_and(|re| re.is_match(answer.trim()))
}
