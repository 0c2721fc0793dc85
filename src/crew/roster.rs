//! The six agents and their task templates.

use crate::domains::agent::{AgentSpec, Capability, TaskSpec};

pub const RESEARCHER: &str = "researcher";
pub const CURATOR: &str = "curator";
pub const COMMUNICATOR: &str = "communicator";
pub const FORM_CREATOR: &str = "form_creator";
pub const EMAIL_SENDER: &str = "email_sender";
pub const DATA_ANALYST: &str = "data_analyst";

fn agent(
    name: &str,
    role: &str,
    goal: &str,
    backstory: &str,
    capabilities: &[Capability],
) -> AgentSpec {
    AgentSpec {
        name: name.to_string(),
        role: role.to_string(),
        goal: goal.to_string(),
        backstory: backstory.to_string(),
        capabilities: capabilities.to_vec(),
    }
}

fn task(name: &str, agent: &str, description: &str, expected_output: &str) -> TaskSpec {
    TaskSpec {
        name: name.to_string(),
        description: description.to_string(),
        expected_output: expected_output.to_string(),
        agent: agent.to_string(),
    }
}

pub fn researcher() -> AgentSpec {
    agent(
        RESEARCHER,
        "Restaurant research specialist",
        "Collect accurate, current information about restaurants that match the user's request",
        "You gather restaurant facts from the web: names, addresses, phone numbers, ratings, \
         price ranges, signature dishes and opening hours. You search with several query \
         variations and never invent details you could not find.",
        &[Capability::WebSearch],
    )
}

pub fn curator() -> AgentSpec {
    agent(
        CURATOR,
        "Restaurant curator",
        "Pick the best restaurants from the research notes for the user's constraints",
        "You weigh rating, price fit, distance and review freshness to shortlist the places \
         a local would actually recommend, and you can explain every pick.",
        &[],
    )
}

pub fn communicator() -> AgentSpec {
    agent(
        COMMUNICATOR,
        "Recommendation writer",
        "Present the shortlisted restaurants clearly and in a fixed, scannable format",
        "You turn dense notes into short, friendly recommendation cards that help people \
         decide quickly.",
        &[],
    )
}

pub fn form_creator() -> AgentSpec {
    agent(
        FORM_CREATOR,
        "Survey designer",
        "Design a short feedback survey about the recommended restaurants and publish its link",
        "You design concise surveys that collect useful preference and satisfaction data, \
         and you always state the survey link on its own labeled line.",
        &[],
    )
}

pub fn email_sender() -> AgentSpec {
    agent(
        EMAIL_SENDER,
        "Email copywriter",
        "Write an inviting email asking recipients to answer the survey",
        "You write short, warm invitation emails. Delivery is handled by the system; you \
         only produce the content.",
        &[],
    )
}

pub fn data_analyst() -> AgentSpec {
    agent(
        DATA_ANALYST,
        "Survey data analyst",
        "Analyze survey responses and report clear, actionable insights",
        "You summarize preference counts, satisfaction scores and free-text feedback into \
         a short report with concrete recommendations.",
        &[Capability::CodeExecution],
    )
}

pub fn research_task() -> TaskSpec {
    task(
        "research",
        RESEARCHER,
        "User request: {user_request}\n\n\
         Collect for each candidate restaurant: name, address, phone number, rating and \
         review highlights, price range and signature dishes, opening hours and break \
         times. Use several search queries (for example '<name> reviews', '<name> menu', \
         '<name> price'). Gather at least {max_candidates} candidates and hand over the \
         findings in a structured list.",
        "Restaurant facts per candidate: name, address, phone, rating, price range, menu, hours",
    )
}

pub fn curation_task() -> TaskSpec {
    task(
        "curation",
        CURATOR,
        "User request: {user_request}\n\n\
         Score the researched restaurants: rating 40% (prefer 4.0 and above), price fit \
         30%, distance and access 20%, review quality and freshness 10%. Select the top \
         {max_recommendations}, and for each state strengths, weaknesses and the reason \
         it is recommended.",
        "A ranked shortlist with score, strengths, weaknesses and reason per restaurant",
    )
}

pub fn presentation_task() -> TaskSpec {
    task(
        "presentation",
        COMMUNICATOR,
        "Present the curated shortlist to the user. Use exactly this layout for every \
         restaurant:\n\n\
         [rank] Restaurant name\n\
         📍 Address: ...\n\
         💰 Price range: ...\n\
         ⭐ Rating: ...\n\
         🕒 Hours: ...\n\
         📞 Phone: ...\n\
         💡 Why: one or two sentences\n\n\
         Start with a one-line heading and keep each restaurant in its own block.",
        "A user-friendly recommendation report in the fixed per-restaurant layout",
    )
}

pub fn form_creation_task() -> TaskSpec {
    task(
        "survey_form_creation",
        FORM_CREATOR,
        "Create a feedback survey for these recommendations.\n\n\
         Reply in this format:\n\n\
         Survey link: https://...\n\n\
         Questions:\n\
         1. Which recommended restaurant do you like best? (single choice, one option per restaurant)\n\
         2. How satisfied are you with the recommendations? (1-5)\n\
         3. How fair are the prices? (1-5)\n\
         4. Any other comments? (free text)\n\n\
         If no real form link is available use the placeholder \
         https://forms.gle/SURVEY-{current_date}. The link must appear on its own line \
         after the 'Survey link:' label.\n\n\
         Recommendations:\n{restaurant_recommendations}",
        "The labeled survey link followed by the question list",
    )
}

pub fn email_task() -> TaskSpec {
    task(
        "survey_email_sending",
        EMAIL_SENDER,
        "Write the invitation email for the restaurant survey. Reply in this format:\n\n\
         ===== EMAIL START =====\n\
         Subject: {email_subject}\n\n\
         Hello!\n\n\
         (two or three lines summarizing the recommendations)\n\n\
         Survey link: {survey_link}\n\n\
         (a response deadline and a short thank-you)\n\
         ===== EMAIL END =====\n\n\
         Recipients: {recipient_count}\n\
         Keep it friendly and brief, and always include the survey link.",
        "Complete email content with subject and body",
    )
}

pub fn analysis_task() -> TaskSpec {
    task(
        "survey_data_analysis",
        DATA_ANALYST,
        "Analyze these survey results:\n{survey_responses}\n\n\
         Cover: response count and basic statistics, preference per restaurant, \
         satisfaction scores, price fairness, and recurring themes in the suggestions \
         and comments. Finish with concrete recommendations.",
        "An analysis report with statistics, insights and recommendations",
    )
}
