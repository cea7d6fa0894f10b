//! Cell normalization: raw reader values to typed [`Scalar`]s.
//!
//! Everything here is pure. Malformed input never panics or errors; it comes
//! back as [`Scalar::Unparseable`] for the caller to turn into a rejection.

use rust_decimal::Decimal;

use crate::models::grid::{RawCell, Scalar};

use super::rules::{canonical_identifier, collapse_whitespace, decimal_from_f64, parse_amount, parse_date};

/// Normalize one raw cell.
///
/// Text is trimmed and whitespace-collapsed but otherwise kept as text; the
/// column-aware coercions below decide whether it is a number or a date.
pub fn normalize_cell(cell: &RawCell) -> Scalar {
    match cell {
        RawCell::Empty => Scalar::Empty,
        RawCell::Text(s) => match collapse_whitespace(s) {
            Some(text) => Scalar::Text(text),
            None => Scalar::Empty,
        },
        RawCell::Integer(i) => Scalar::Number(Decimal::from(*i)),
        RawCell::Number(f) => match decimal_from_f64(*f) {
            Some(n) => Scalar::Number(n),
            None => Scalar::Unparseable(f.to_string()),
        },
        RawCell::Bool(b) => Scalar::Text(b.to_string()),
        RawCell::Date(d) => Scalar::Date(*d),
        RawCell::Error(e) => Scalar::Unparseable(e.clone()),
    }
}

/// Normalize a full row, preserving cell positions.
pub fn normalize_row(cells: &[RawCell]) -> Vec<Scalar> {
    cells.iter().map(normalize_cell).collect()
}

/// Coerce a cell expected to hold an amount.
pub fn to_amount(value: &Scalar) -> Scalar {
    match value {
        Scalar::Number(_) | Scalar::Empty | Scalar::Unparseable(_) => value.clone(),
        Scalar::Text(s) => match parse_amount(s) {
            Some(n) => Scalar::Number(n),
            None => Scalar::Unparseable(s.clone()),
        },
        Scalar::Date(_) => Scalar::Unparseable(value.display()),
    }
}

/// Coerce a cell expected to hold a date.
///
/// Bare numbers in a date column are not guessed at: serial dates are the
/// reader's business and arrive as native dates.
pub fn to_date(value: &Scalar) -> Scalar {
    match value {
        Scalar::Date(_) | Scalar::Empty | Scalar::Unparseable(_) => value.clone(),
        Scalar::Text(s) => match parse_date(s) {
            Some(d) => Scalar::Date(d),
            None => Scalar::Unparseable(s.clone()),
        },
        Scalar::Number(_) => Scalar::Unparseable(value.display()),
    }
}

/// Coerce a cell holding a document identifier (point of sale, number,
/// installment) to canonical text.
pub fn to_identifier(value: &Scalar) -> Scalar {
    match value {
        Scalar::Text(s) => Scalar::Text(canonical_identifier(s)),
        Scalar::Number(n) if n.fract().is_zero() && !n.is_sign_negative() => {
            Scalar::Text(canonical_identifier(&n.normalize().to_string()))
        }
        Scalar::Number(_) | Scalar::Date(_) => Scalar::Unparseable(value.display()),
        Scalar::Empty | Scalar::Unparseable(_) => value.clone(),
    }
}
