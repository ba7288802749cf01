// Prompt construction for inquiry analysis.
// Reuses cross-cutting JSON fragments from llm_client::prompts.

use crate::analysis::InquiryRequest;
use crate::llm_client::prompts::{
    JSON_ONLY_SYSTEM, JSON_PUNCTUATION_REMINDER, JSON_SAFE_TEXT_RULES,
};

/// Longest failure description carried into a retry prompt, in characters.
const MAX_CORRECTION_CHARS: usize = 500;

const SYSTEM_ROLE: &str = "You are a senior software outsourcing project analyst with more than \
    ten years of experience in project management and technical assessment. \
    You analyse client inquiries in depth and produce detailed, professional and actionable \
    project assessments.\n\n\
    Principles:\n\
    - Never use short, vague or boilerplate descriptions.\n\
    - Every conclusion must be tied to the specifics of this project.\n\
    - Role responsibilities are the core of the report and must be detailed, concrete and actionable.\n\
    - Write every text value in the language of the client's locale; use English when no locale is given.\n\n\
    Formatting rules for text values:\n";

/// Target schema, embedded literally in every user prompt.
pub const ANALYSIS_SCHEMA: &str = r#"{
  "summary": "Project overview in 2-3 sentences",
  "requirements": {
    "functional": ["Functional requirement", "..."],
    "nonFunctional": ["Non-functional requirement", "..."]
  },
  "feasibility": {
    "technical": "Technical feasibility (detailed)",
    "time": "Schedule feasibility",
    "resource": "Resource feasibility",
    "overall": "Overall verdict (feasible / needs assessment / not feasible)"
  },
  "techStack": {
    "frontend": ["Frontend technology", "..."],
    "backend": ["Backend technology", "..."],
    "database": ["Database technology", "..."],
    "server": ["Server choice", "..."],
    "other": ["Other technology", "..."],
    "reasoning": "Why this stack",
    "serverReasoning": "Why these servers (sizing, expected traffic, scalability)"
  },
  "timeline": {
    "totalDuration": "Total development time, e.g. 8-12 weeks"
  },
  "risks": [
    {
      "type": "Risk type (technical / schedule / requirements / other)",
      "description": "Risk description",
      "impact": "Impact (high / medium / low)",
      "mitigation": "Mitigation"
    }
  ],
  "teamMembers": {
    "roles": [
      {
        "role": "Role name, e.g. Frontend engineer",
        "count": "Headcount, e.g. 2",
        "skills": ["Required skill", "..."],
        "responsibilities": [
          "Owns the [module] built with [stack]: [feature list]. Technical details: [detail 1]; [detail 2]. Delivers [deliverables] within [duration], working with [roles] to meet [quality bar]. (at least 100 characters)",
          "During the [phase] phase, handles [work] using [tools] to complete [task 1]; [task 2]. Milestones: [milestone 1]; [milestone 2]. (at least 100 characters)"
        ],
        "level": "Seniority (junior / mid / senior)",
        "workload": "Workload, e.g. full time for the whole project",
        "keyDeliverables": ["Key deliverable", "..."]
      }
    ],
    "totalCount": "Total headcount, e.g. 5-7",
    "teamStructure": "Team structure, e.g. 1 PM, 2 frontend, 2 backend, 1 QA, 1 designer",
    "keyRequirements": ["Key requirement", "..."]
  },
  "pricing": {
    "estimation": "Price estimate, e.g. $15,000 - $25,000",
    "breakdown": {
      "development": "Development cost",
      "testing": "Testing cost",
      "deployment": "Deployment cost",
      "server": "Server cost (hosting, bandwidth, storage with concrete figures)",
      "maintenance": "Maintenance cost (optional)"
    },
    "costTable": [
      {
        "role": "Project role",
        "duration": "Effort, e.g. 20 days",
        "tasks": "Work content (detailed)"
      }
    ],
    "factors": ["Pricing factor", "..."]
  }
}"#;

/// The system prompt is identical for every attempt.
pub fn build_system_prompt() -> String {
    format!("{SYSTEM_ROLE}{JSON_SAFE_TEXT_RULES}\n\n{JSON_ONLY_SYSTEM}")
}

/// Builds the user prompt for `attempt` (1-based). From the second attempt on,
/// the previous failure is appended so the model can correct it.
pub fn build_user_prompt(
    request: &InquiryRequest,
    attempt: u32,
    last_error: Option<&str>,
) -> String {
    let mut prompt = String::from(
        "Analyse the following client inquiry in detail and return the result as JSON.\n\n\
         Client inquiry:\n",
    );
    prompt.push_str(request.message.trim());
    prompt.push('\n');

    if let Some(client) = non_blank(request.client_name.as_deref()) {
        prompt.push_str(&format!("\nClient name: {client}\n"));
    }
    if let Some(locale) = non_blank(request.locale.as_deref()) {
        prompt.push_str(&locale_context(locale));
    }

    prompt.push_str(
        "\nRole responsibilities:\n\
         - Each responsibility must be specific and at least 100 characters long.\n\
         - Cover the module, the technology, the tasks, the deliverables and the collaboration.\n\
         - Tie every item to this project; no generic descriptions.\n",
    );
    prompt.push_str(JSON_SAFE_TEXT_RULES);
    prompt.push_str("\n\nReturn exactly this structure:\n\n");
    prompt.push_str(ANALYSIS_SCHEMA);
    prompt.push_str("\n\nReturn valid JSON only, without markdown code fences.");

    if attempt > 1 {
        if let Some(error) = last_error {
            prompt.push_str(&format!(
                "\n\nIMPORTANT: the previous attempt failed: {}\n{}",
                truncate_chars(error, MAX_CORRECTION_CHARS),
                JSON_PUNCTUATION_REMINDER
            ));
        }
    }

    prompt
}

fn locale_context(locale: &str) -> String {
    format!(
        "\nClient locale: {locale}\n\
         Pay particular attention to:\n\
         - local laws, regulations and compliance requirements\n\
         - culture and user preferences\n\
         - technical infrastructure and network conditions\n\
         - payment methods and currency\n\
         - language and localisation needs\n\
         - time zone and working hours\n\
         - server region (local cloud providers and data residency)\n\
         Write all text values in the language used in {locale}.\n"
    )
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
