//! JSON repair cascade — best-effort recovery when sanitized text still fails
//! to parse.
//!
//! Strategies run once each, in order, and the first parseable result wins:
//! 1. truncate to the last `}` (drops a half-written trailing field)
//! 2. close a dangling string, then append missing `]` and `}`
//!
//! When both fail the caller gets the original parse error, not a repair one.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analysis::sanitizer::SanitizedText;

/// Parses sanitized model output, falling back to the repair cascade.
pub fn parse_or_repair(text: &SanitizedText) -> Result<Value, serde_json::Error> {
    match serde_json::from_str(text.as_str()) {
        Ok(value) => Ok(value),
        Err(err) => {
            warn!("Direct JSON parse failed ({err}), attempting repair");
            repair(text.as_str(), err)
        }
    }
}

pub fn repair(text: &str, original: serde_json::Error) -> Result<Value, serde_json::Error> {
    debug!("Repair strategy 1: truncate to last closing brace");
    if let Some(value) = truncate_to_last_brace(text) {
        info!("JSON repaired by truncating to the last closing brace");
        return Ok(value);
    }

    debug!("Repair strategy 2: close unbalanced structures");
    if let Ok(value) = serde_json::from_str(&close_structures(text)) {
        info!("JSON repaired by closing unbalanced structures");
        return Ok(value);
    }

    warn!("All JSON repair strategies failed");
    Err(original)
}

fn truncate_to_last_brace(text: &str) -> Option<Value> {
    let end = text.rfind('}').filter(|&pos| pos > 0)?;
    serde_json::from_str(&text[..=end]).ok()
}

/// Appends whatever closes the structures left open by a truncated reply:
/// a `"` if the quote count is odd, then missing `]`, then missing `}`.
fn close_structures(text: &str) -> String {
    let mut fixed = text.trim_end().to_string();

    if unescaped_quote_count(&fixed) % 2 == 1 {
        fixed.push('"');
    } else if fixed.ends_with(',') {
        fixed.pop();
    }

    let missing_brackets = count(&fixed, '[').saturating_sub(count(&fixed, ']'));
    let missing_braces = count(&fixed, '{').saturating_sub(count(&fixed, '}'));
    fixed.extend(std::iter::repeat(']').take(missing_brackets));
    fixed.extend(std::iter::repeat('}').take(missing_braces));
    fixed
}

fn unescaped_quote_count(text: &str) -> usize {
    let mut prev = None;
    let mut quotes = 0;
    for c in text.chars() {
        if c == '"' && prev != Some('\\') {
            quotes += 1;
        }
        prev = Some(c);
    }
    quotes
}

fn count(text: &str, needle: char) -> usize {
    text.chars().filter(|&c| c == needle).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_err(text: &str) -> serde_json::Error {
        serde_json::from_str::<Value>(text).unwrap_err()
    }

    fn run(text: &str) -> Result<Value, serde_json::Error> {
        repair(text, parse_err(text))
    }

    #[test]
    fn test_missing_final_brace_is_closed() {
        assert_eq!(run(r#"{"a":1,"b":2"#).unwrap(), json!({"a": 1, "b": 2}));
    }

    #[test]
    fn test_trailing_junk_is_truncated() {
        let value = run(r#"{"a":1,"b":2,"c":3} trailing junk"#).unwrap();
        assert_eq!(value, json!({"a": 1, "b": 2, "c": 3}));
    }

    #[test]
    fn test_truncated_string_inside_array_is_closed() {
        let value = run(r#"{"summary":"s","list":["x","y"#).unwrap();
        assert_eq!(value, json!({"summary": "s", "list": ["x", "y"]}));
    }

    #[test]
    fn test_truncated_after_nested_object() {
        let value = run(r#"{"a":{"x":1},"b":"cut off her"#).unwrap();
        assert_eq!(value, json!({"a": {"x": 1}, "b": "cut off her"}));
    }

    #[test]
    fn test_dangling_comma_is_dropped_before_closing() {
        assert_eq!(run(r#"{"a":[1,2,"#).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_escaped_quote_is_not_counted() {
        assert_eq!(unescaped_quote_count(r#""a \" b""#), 2);
        let value = run(r#"{"a":"say \"hi"#).unwrap();
        assert_eq!(value, json!({"a": "say \"hi"}));
    }

    #[test]
    fn test_close_structures_order_is_brackets_then_braces() {
        assert_eq!(close_structures(r#"{"a":[{"b":1}"#), r#"{"a":[{"b":1}]}"#);
    }

    #[test]
    fn test_unrecoverable_text_returns_original_error() {
        let text = "definitely not json";
        let expected = parse_err(text).to_string();
        let err = run(text).unwrap_err();
        assert_eq!(err.to_string(), expected);
    }

    #[test]
    fn test_parse_or_repair_prefers_direct_parse() {
        let text = crate::analysis::sanitizer::sanitize(r#"{"a": [1, 2]}"#);
        assert_eq!(parse_or_repair(&text).unwrap(), json!({"a": [1, 2]}));
    }

    #[test]
    fn test_parse_or_repair_falls_back_to_cascade() {
        let text = crate::analysis::sanitizer::sanitize("```json\n{\"a\": {\"b\": \"cut");
        assert_eq!(parse_or_repair(&text).unwrap(), json!({"a": {"b": "cut"}}));
    }
}
