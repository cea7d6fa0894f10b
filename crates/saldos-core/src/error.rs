//! Error types for the saldos-core library.
//!
//! Only structural failures live here. Per-row problems (unparseable cells,
//! documents without a customer, unrecognized rows) are recorded as values in
//! the extraction report and never abort a pass.

use rust_decimal::Decimal;
use thiserror::Error;

/// Main error type for the saldos library.
#[derive(Error, Debug)]
pub enum SaldosError {
    /// Posting synthesis error.
    #[error("posting error: {0}")]
    Posting(#[from] PostingError),

    /// Destination (external loader) error.
    #[error("destination error: {0}")]
    Destination(#[from] DestinationError),

    /// A configured classifier pattern could not be compiled.
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A listing has no recognizable caption row.
    #[error("no header row found: {0}")]
    MissingHeader(String),
}

/// Errors raised while turning documents into ledger postings.
#[derive(Error, Debug)]
pub enum PostingError {
    /// The two legs of a posting do not cancel out. This is a programming
    /// error and halts the pass.
    #[error("unbalanced posting {fingerprint}: receivable {receivable} + counterpart {counterpart} != 0")]
    Imbalance {
        fingerprint: String,
        receivable: Decimal,
        counterpart: Decimal,
    },
}

/// Errors reported by a [`Destination`](crate::destination::Destination).
#[derive(Error, Debug)]
pub enum DestinationError {
    /// The destination could not resolve or create a customer.
    #[error("customer '{0}' could not be resolved")]
    Customer(String),

    /// The destination rejected a posting.
    #[error("posting {fingerprint} rejected: {reason}")]
    Rejected { fingerprint: String, reason: String },

    /// The destination is unreachable or misconfigured.
    #[error("{0}")]
    Unavailable(String),
}

/// Result type for the saldos library.
pub type Result<T> = std::result::Result<T, SaldosError>;
