//! Common regex patterns for legacy spreadsheet cells.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Full-cell date formats
    pub static ref DATE_DMY: Regex = Regex::new(
        r"^(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4}|\d{2})$"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[/\-](\d{1,2})[/\-](\d{1,2})(?:[ T]\d{1,2}:\d{2}(?::\d{2})?)?$"
    ).unwrap();

    // Month granularity: MM/YYYY
    pub static ref DATE_MY: Regex = Regex::new(
        r"^(\d{1,2})[/.\-](\d{4})$"
    ).unwrap();

    // A DD/MM/YYYY date somewhere inside a title line
    pub static ref DATE_IN_TEXT: Regex = Regex::new(
        r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4})\b"
    ).unwrap();

    // Amount text after currency symbols and spaces are removed
    pub static ref AMOUNT_TEXT: Regex = Regex::new(
        r"^\d[\d.,]*$|^[.,]\d+$"
    ).unwrap();

    // Leading account code on a customer marker: "001 CLIENTE SA", "20.0 - CLIENTE"
    pub static ref LEADING_CODE: Regex = Regex::new(
        r"^(\d+)(?:[.,]0+)?(?:\s*[-:]\s*|\s+|$)(.*)$"
    ).unwrap();

    pub static ref DIGITS: Regex = Regex::new(r"^\d+$").unwrap();

    pub static ref NON_DIGIT: Regex = Regex::new(r"\D").unwrap();
}
