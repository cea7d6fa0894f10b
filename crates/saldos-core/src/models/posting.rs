//! Balanced double-entry postings handed to the external loader.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::document::{CustomerContext, Fingerprint};

/// One side of a posting.
///
/// Amounts are signed: positive is a debit, negative a credit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingLeg {
    /// Opaque account identifier, resolved by the loader.
    pub account: String,

    /// Signed amount.
    pub amount: Decimal,

    /// Line label.
    pub label: String,

    /// Counterparty; only set on the receivable leg.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<CustomerContext>,

    /// Maturity (document due date); only set on the receivable leg.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maturity: Option<NaiveDate>,
}

impl PostingLeg {
    /// Debit side of the leg (zero for credit legs).
    pub fn debit(&self) -> Decimal {
        self.amount.max(Decimal::ZERO)
    }

    /// Credit side of the leg as a positive number (zero for debit legs).
    pub fn credit(&self) -> Decimal {
        (-self.amount).max(Decimal::ZERO)
    }
}

/// Receivable debit and counterpart credit for one document.
///
/// Immutable once produced; safe to share across loader workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingPair {
    /// Identity of the document this posting migrates.
    pub fingerprint: Fingerprint,

    /// Ledger date: document issue date, else the report date. `None` when
    /// the export carries neither; the loader picks the date.
    pub date: Option<NaiveDate>,

    /// Opaque journal identifier.
    pub journal: String,

    /// Traceability reference embedding fingerprint, branch and document.
    pub reference: String,

    /// Free-text narration with the legacy details.
    pub narration: String,

    /// Whether the loader should post the entry right after creating it.
    pub auto_post: bool,

    /// Debit on the receivable account, carrying counterparty and maturity.
    pub receivable: PostingLeg,

    /// Credit on the counterpart account.
    pub counterpart: PostingLeg,
}

impl PostingPair {
    /// Whether the legs cancel out exactly.
    pub fn is_balanced(&self) -> bool {
        self.receivable.amount + self.counterpart.amount == Decimal::ZERO
    }

    /// Amount migrated by this posting.
    pub fn amount(&self) -> Decimal {
        self.receivable.amount
    }
}
