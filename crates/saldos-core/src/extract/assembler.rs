//! Single-pass state machine binding document rows to their branch and
//! customer.

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::document::{
    BranchContext, ClassifiedRow, CustomerContext, DocumentRecord, FieldKey, RejectionReason,
    RowKind,
};
use crate::models::grid::Scalar;

/// Outcome of feeding one classified row.
#[derive(Debug, Clone, PartialEq)]
pub enum Assembled {
    /// A complete document bound to its contexts.
    Document(DocumentRecord),
    /// A document or unrecognized row that produced nothing.
    Rejected(RejectionReason),
    /// A marker row updated the current contexts.
    Context,
    /// Header, total or blank row.
    Ignored,
}

/// Holds the current branch and customer while rows stream through.
#[derive(Debug, Default)]
pub struct Assembler {
    current_branch: Option<BranchContext>,
    current_customer: Option<CustomerContext>,
    warnings: Vec<String>,
}

impl Assembler {
    /// Start with both contexts unset.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_branch(&self) -> Option<&BranchContext> {
        self.current_branch.as_ref()
    }

    pub fn current_customer(&self) -> Option<&CustomerContext> {
        self.current_customer.as_ref()
    }

    /// Warnings collected so far.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Consume the assembler; open contexts are simply dropped.
    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }

    /// Advance the state machine by one row. Rows must arrive in grid order.
    pub fn feed(&mut self, row: &ClassifiedRow) -> Assembled {
        match row.kind {
            RowKind::BranchMarker => {
                let name = row.text(FieldKey::BranchName).unwrap_or_default();
                debug!(row = row.row_number(), branch = %name, "branch opened");
                self.current_branch = Some(BranchContext { name });
                self.current_customer = None;
                Assembled::Context
            }
            RowKind::CustomerMarker => {
                let code = row.text(FieldKey::CustomerCode);
                let name = row.text(FieldKey::CustomerName).unwrap_or_default();
                if code.is_none() && name.is_empty() {
                    self.warn(format!(
                        "row {}: customer marker without code or name, customer closed",
                        row.row_number()
                    ));
                    self.current_customer = None;
                } else {
                    debug!(
                        row = row.row_number(),
                        code = code.as_deref().unwrap_or(""),
                        name = %name,
                        "customer opened"
                    );
                    self.current_customer = Some(CustomerContext {
                        code,
                        name,
                        contact: None,
                    });
                }
                Assembled::Context
            }
            RowKind::ContactMarker => {
                let contact = row.text(FieldKey::Contact);
                match self.current_customer.as_mut() {
                    Some(customer) => {
                        customer.contact = match (customer.contact.take(), contact) {
                            (Some(prev), Some(next)) => Some(format!("{} / {}", prev, next)),
                            (prev, next) => next.or(prev),
                        };
                    }
                    None => self.warn(format!(
                        "row {}: contact row with no open customer discarded",
                        row.row_number()
                    )),
                }
                Assembled::Context
            }
            RowKind::DocumentRow => match self.document(row) {
                Ok(doc) => Assembled::Document(doc),
                Err(reason) => {
                    debug!(row = row.row_number(), %reason, "document rejected");
                    Assembled::Rejected(reason)
                }
            },
            RowKind::Unrecognized => Assembled::Rejected(RejectionReason::UnrecognizedRow),
            RowKind::ReportHeader | RowKind::TotalRow | RowKind::Blank => Assembled::Ignored,
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    fn document(&mut self, row: &ClassifiedRow) -> Result<DocumentRecord, RejectionReason> {
        let customer = self
            .current_customer
            .clone()
            .ok_or(RejectionReason::NoOpenCustomer)?;

        let number = match row.field(FieldKey::Number) {
            Some(Scalar::Text(n)) if !n.is_empty() => n.clone(),
            Some(Scalar::Unparseable(raw)) => {
                return Err(RejectionReason::Unparseable {
                    field: FieldKey::Number,
                    raw: raw.clone(),
                });
            }
            _ => {
                return Err(RejectionReason::MissingRequiredField {
                    field: FieldKey::Number,
                });
            }
        };

        let pending_amount = match row.field(FieldKey::PendingAmount) {
            Some(Scalar::Number(n)) => *n,
            Some(Scalar::Unparseable(raw)) => {
                return Err(RejectionReason::Unparseable {
                    field: FieldKey::PendingAmount,
                    raw: raw.clone(),
                });
            }
            _ => {
                return Err(RejectionReason::MissingRequiredField {
                    field: FieldKey::PendingAmount,
                });
            }
        };
        if pending_amount <= Decimal::ZERO {
            return Err(RejectionReason::NonPositiveAmount {
                amount: pending_amount,
            });
        }

        let issue_date = self.optional_date(row, FieldKey::IssueDate);
        let due_date = self.optional_date(row, FieldKey::DueDate);
        let original_amount = self.optional_amount(row, FieldKey::OriginalAmount);
        let days_overdue = self
            .optional_amount(row, FieldKey::DaysOverdue)
            .and_then(|d| i64::try_from(d.trunc()).ok());

        Ok(DocumentRecord {
            row_index: row.row_index,
            type_code: row.text(FieldKey::TypeCode).unwrap_or_default(),
            letter: row.text(FieldKey::Letter),
            point_of_sale: row.text(FieldKey::PointOfSale),
            number,
            installment: row.text(FieldKey::Installment),
            issue_date,
            due_date,
            pending_amount,
            branch: self.current_branch.clone(),
            customer,
            original_amount,
            observations: row.text(FieldKey::Observations),
            days_overdue,
        })
    }

    /// Optional dates that fail to parse are dropped with a warning; they
    /// never reject the document.
    fn optional_date(&mut self, row: &ClassifiedRow, key: FieldKey) -> Option<chrono::NaiveDate> {
        match row.field(key)? {
            Scalar::Date(d) => Some(*d),
            Scalar::Unparseable(raw) => {
                self.warn(format!("row {}: unparseable {} '{}' ignored", row.row_number(), key, raw));
                None
            }
            _ => None,
        }
    }

    fn optional_amount(&mut self, row: &ClassifiedRow, key: FieldKey) -> Option<Decimal> {
        match row.field(key)? {
            Scalar::Number(n) => Some(*n),
            Scalar::Unparseable(raw) => {
                self.warn(format!("row {}: unparseable {} '{}' ignored", row.row_number(), key, raw));
                None
            }
            _ => None,
        }
    }
}
