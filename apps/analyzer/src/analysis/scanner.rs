//! String-literal state machine shared by the sanitizer passes.
//!
//! JSON text is scanned one character at a time. Only an unescaped `"` moves
//! in or out of a string; a backslash inside a string escapes exactly the next
//! character.

/// Where the scanner currently is relative to string literals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanState {
    #[default]
    Outside,
    InsideString,
    /// Inside a string, right after a backslash.
    Escaped,
}

impl ScanState {
    /// The state after consuming `c`.
    pub fn next(self, c: char) -> ScanState {
        match (self, c) {
            (ScanState::Outside, '"') => ScanState::InsideString,
            (ScanState::Outside, _) => ScanState::Outside,
            (ScanState::InsideString, '"') => ScanState::Outside,
            (ScanState::InsideString, '\\') => ScanState::Escaped,
            (ScanState::InsideString, _) => ScanState::InsideString,
            (ScanState::Escaped, _) => ScanState::InsideString,
        }
    }

    pub fn in_string(self) -> bool {
        self != ScanState::Outside
    }
}

/// Characters JSON forbids inside a string literal.
fn is_raw_control(c: char) -> bool {
    (c as u32) < 0x20
}

/// Rewrites every raw line break (or other control character) that sits
/// inside a string literal to a single space. Text outside strings is untouched.
pub fn normalize_string_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut state = ScanState::Outside;

    for c in text.chars() {
        if state.in_string() && is_raw_control(c) {
            out.push(' ');
        } else {
            out.push(c);
        }
        state = state.next(c);
    }

    out
}
