//! Amount parsing for Argentine-formatted legacy exports.

use rust_decimal::Decimal;
use std::str::FromStr;

use super::patterns::AMOUNT_TEXT;

/// Parse a locale-formatted amount (e.g., "42.299,35", "1.500", "$ 1234.5").
///
/// Thousands groups are validated; text that does not follow a consistent
/// grouping yields `None` instead of a guess.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let trimmed = s.trim();

    // Accounting negatives: (1.234,56)
    let (parenthesized, body) = match trimmed.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '$')
        .collect();

    let (signed, unsigned) = if let Some(rest) = cleaned.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = cleaned.strip_suffix('-') {
        (true, rest)
    } else {
        (false, cleaned.strip_prefix('+').unwrap_or(cleaned.as_str()))
    };

    if !AMOUNT_TEXT.is_match(unsigned) {
        return None;
    }

    let normalized = resolve_separators(unsigned)?;
    let amount = Decimal::from_str(&normalized).ok()?;

    if parenthesized || signed {
        Some(-amount)
    } else {
        Some(amount)
    }
}

/// Rewrite `unsigned` (digits, dots and commas only) as a plain
/// decimal-point number.
fn resolve_separators(s: &str) -> Option<String> {
    let comma = s.rfind(',');
    let dot = s.rfind('.');

    let (thousands, decimal) = match (comma, dot) {
        (Some(c), Some(d)) if c > d => (Some('.'), Some(',')),
        (Some(_), Some(_)) => (Some(','), Some('.')),
        (Some(_), None) => {
            if s.matches(',').count() == 1 {
                (None, Some(','))
            } else {
                (Some(','), None)
            }
        }
        (None, Some(d)) => {
            let integer = &s[..d];
            let fraction_len = s.len() - d - 1;
            let several = s.matches('.').count() > 1;
            // "1.500" is fifteen hundred; "0.500" and "1234.5" are decimals
            if several || (fraction_len == 3 && !integer.is_empty() && integer != "0") {
                (Some('.'), None)
            } else {
                (None, Some('.'))
            }
        }
        (None, None) => (None, None),
    };

    let (integer, fraction) = match decimal {
        Some(sep) => {
            let idx = s.rfind(sep)?;
            (&s[..idx], Some(&s[idx + 1..]))
        }
        None => (s, None),
    };

    if let Some(sep) = decimal {
        if integer.contains(sep) {
            return None;
        }
    }
    if let Some(fraction) = fraction {
        if fraction.contains(['.', ',']) {
            return None;
        }
    }

    let digits = match thousands {
        Some(sep) if integer.contains(sep) => {
            let groups: Vec<&str> = integer.split(sep).collect();
            let first_ok = (1..=3).contains(&groups[0].len());
            if !first_ok || groups[1..].iter().any(|g| g.len() != 3) {
                return None;
            }
            groups.concat()
        }
        _ => integer.to_string(),
    };

    let digits = if digits.is_empty() { "0".to_string() } else { digits };

    match fraction {
        Some(fraction) if !fraction.is_empty() => Some(format!("{}.{}", digits, fraction)),
        _ => Some(digits),
    }
}

/// Convert a number typed as floating point by the source format.
///
/// Goes through the shortest round-trip rendering so `42299.35_f64` becomes
/// exactly `42299.35`.
pub fn decimal_from_f64(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

/// Format amount in Argentine style (42.299,35).
pub fn format_amount(amount: Decimal) -> String {
    let s = format!("{:.2}", amount.abs());
    let parts: Vec<&str> = s.split('.').collect();

    if parts.len() != 2 {
        return s;
    }

    let integer_part = parts[0];
    let decimal_part = parts[1];

    // Add thousand separators
    let chars: Vec<char> = integer_part.chars().collect();
    let mut formatted = String::new();

    for (i, c) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(*c);
    }

    let sign = if amount.is_sign_negative() && !amount.is_zero() { "-" } else { "" };
    format!("{}{},{}", sign, formatted, decimal_part)
}
