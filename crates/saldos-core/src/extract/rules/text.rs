//! Text cleanup helpers.

use super::patterns::{DIGITS, NON_DIGIT};

/// Trim and collapse internal whitespace runs (including NBSP) to one space.
///
/// Returns `None` for empty or whitespace-only text.
pub fn collapse_whitespace(s: &str) -> Option<String> {
    let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Canonical form of a document identifier (point of sale, number,
/// installment): all-digit values lose their leading zeros, so `"0001"` and a
/// numeric `1` identify the same document.
pub fn canonical_identifier(s: &str) -> String {
    let s = s.trim();
    if DIGITS.is_match(s) {
        let stripped = s.trim_start_matches('0');
        if stripped.is_empty() {
            "0".to_string()
        } else {
            stripped.to_string()
        }
    } else {
        s.to_string()
    }
}

/// Keep only the digits of a tax identifier.
pub fn digits_only(s: &str) -> String {
    NON_DIGIT.replace_all(s, "").into_owned()
}
