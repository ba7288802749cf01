//! Response sanitizer — turns a raw model reply into text that is as close to
//! valid JSON as cheap syntactic cleanup can get it.
//!
//! Passes, in order:
//! 1. trim and strip markdown code fences
//! 2. keep only the span from the first `{` to the last `}`
//! 3. drop `//` and `/* */` comments outside string literals, then re-take
//!    the object span
//! 4. drop trailing commas before `}` / `]`
//! 5. replace raw line breaks inside string literals with spaces
//!
//! The output is not guaranteed to parse; see `repair` for what happens next.

use crate::analysis::scanner::{normalize_string_newlines, ScanState};

/// Model output after sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedText(String);

impl SanitizedText {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn sanitize(raw: &str) -> SanitizedText {
    let text = strip_json_fences(raw);
    let text = extract_object_span(text);
    let text = strip_comments(text);
    // a comment may have hidden the closing brace the first span ended on
    let text = extract_object_span(&text);
    let text = strip_trailing_commas(text);
    let text = normalize_string_newlines(&text);
    SanitizedText(text.trim().to_string())
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    let text = match text.strip_prefix("```") {
        // optional language tag: ```json, ```JSON, ```jsonc
        Some(rest) => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        None => text,
    };
    let text = text.trim();
    text.strip_suffix("```").map(str::trim).unwrap_or(text)
}

/// Keeps the first `{` through the last `}`, dropping prose around the object.
fn extract_object_span(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

/// Removes comments that sit outside string literals.
/// An unterminated block comment is left in place.
fn strip_comments(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::Outside;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if state == ScanState::Outside && c == '/' {
            match chars.get(i + 1) {
                Some('/') => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    continue;
                }
                Some('*') => {
                    if let Some(end) = find_block_comment_end(&chars, i + 2) {
                        i = end + 2;
                        continue;
                    }
                }
                _ => {}
            }
        }
        out.push(c);
        state = state.next(c);
        i += 1;
    }

    out
}

fn find_block_comment_end(chars: &[char], from: usize) -> Option<usize> {
    (from..chars.len().saturating_sub(1)).find(|&j| chars[j] == '*' && chars[j + 1] == '/')
}

/// Removes commas outside strings that are followed (through whitespace or
/// further commas) by a closing `}` or `]`.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::Outside;

    for (i, &c) in chars.iter().enumerate() {
        let dangling = state == ScanState::Outside && c == ',' && closes_next(&chars[i + 1..]);
        if !dangling {
            out.push(c);
        }
        state = state.next(c);
    }

    out
}

fn closes_next(rest: &[char]) -> bool {
    rest.iter()
        .find(|c| !c.is_whitespace() && **c != ',')
        .is_some_and(|c| matches!(c, '}' | ']'))
}
