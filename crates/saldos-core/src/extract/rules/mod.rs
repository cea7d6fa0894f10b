//! Rule-based cell parsers for legacy Argentine spreadsheet exports.

pub mod amounts;
pub mod dates;
pub mod patterns;
pub mod text;

pub use amounts::{decimal_from_f64, format_amount, parse_amount};
pub use dates::{find_date, parse_date};
pub use text::{canonical_identifier, collapse_whitespace, digits_only};
