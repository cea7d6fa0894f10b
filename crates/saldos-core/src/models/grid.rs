//! Raw spreadsheet grid and normalized cell values.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A cell exactly as the spreadsheet reader produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawCell {
    /// No value in the cell.
    Empty,
    /// Text content, untrimmed.
    Text(String),
    /// Floating point number as typed by the source format.
    Number(f64),
    /// Integer as typed by the source format.
    Integer(i64),
    /// Boolean cell.
    Bool(bool),
    /// Native date cell.
    Date(NaiveDate),
    /// Formula error or any other value the reader could not represent.
    Error(String),
}

impl RawCell {
    /// Build a text cell, mapping the empty string to [`RawCell::Empty`].
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        if s.is_empty() {
            RawCell::Empty
        } else {
            RawCell::Text(s)
        }
    }
}

impl From<&str> for RawCell {
    fn from(s: &str) -> Self {
        RawCell::text(s)
    }
}

/// An ordered sequence of rows of raw cells. Read once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGrid {
    rows: Vec<Vec<RawCell>>,
}

impl RawGrid {
    /// Create a grid from materialized rows.
    pub fn new(rows: Vec<Vec<RawCell>>) -> Self {
        Self { rows }
    }

    /// Build a grid of text cells. Empty strings become empty cells.
    pub fn from_text_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: AsRef<str>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|c| RawCell::text(c.as_ref())).collect())
                .collect(),
        }
    }

    /// All rows in source order.
    pub fn rows(&self) -> &[Vec<RawCell>] {
        &self.rows
    }

    /// A single row, if present.
    pub fn row(&self, index: usize) -> Option<&[RawCell]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the grid has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A normalized cell value.
///
/// Every downstream component handles exactly these five cases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Scalar {
    /// Trimmed text with internal whitespace collapsed.
    Text(String),
    /// Exact decimal number.
    Number(Decimal),
    /// Calendar date.
    Date(NaiveDate),
    /// Present but empty or whitespace-only.
    Empty,
    /// Could not be normalized into the expected type; keeps the raw rendering.
    Unparseable(String),
}

impl Scalar {
    /// Whether the scalar carries no value.
    pub fn is_empty(&self) -> bool {
        matches!(self, Scalar::Empty)
    }

    /// Text content, if this is a text scalar.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Scalar::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render the scalar the way an operator would read it in the sheet.
    ///
    /// Integral numbers render without a fractional part, so a code typed as
    /// `20.0` reads as `20`.
    pub fn display(&self) -> String {
        match self {
            Scalar::Text(s) | Scalar::Unparseable(s) => s.clone(),
            Scalar::Number(n) => n.normalize().to_string(),
            Scalar::Date(d) => d.format("%d/%m/%Y").to_string(),
            Scalar::Empty => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_from_text_rows_maps_empty_strings() {
        let grid = RawGrid::from_text_rows(vec![vec!["a", "", " "]]);
        assert_eq!(
            grid.row(0).unwrap(),
            &[
                RawCell::Text("a".to_string()),
                RawCell::Empty,
                RawCell::Text(" ".to_string())
            ]
        );
        assert_eq!(grid.len(), 1);
        assert!(grid.row(1).is_none());
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Number(Decimal::from_str("20.0").unwrap()).display(), "20");
        assert_eq!(
            Scalar::Date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()).display(),
            "05/01/2026"
        );
        assert_eq!(Scalar::Empty.display(), "");
    }
}
