// Shared prompt fragments.
// The analysis module owns its own prompts.rs; this file holds the
// cross-cutting pieces every JSON-producing prompt relies on.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with a single valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Rules that keep long free-text values from breaking the JSON envelope.
pub const JSON_SAFE_TEXT_RULES: &str = "\
    - Never use double quotes, single quotes or backticks inside free-text values; \
    quote terms with 「」 or 【】 instead.\n\
    - Do not put line breaks inside string values.\n\
    - Separate list items inside a sentence with semicolons, not commas, where possible.\n\
    - Avoid any other special characters that could interfere with JSON.";

/// Appended to a retry prompt after the failure description.
pub const JSON_PUNCTUATION_REMINDER: &str = "Pay special attention to JSON correctness: \
    every quote, comma, bracket and brace must be correctly paired, \
    and the object must be complete.";
