//! Classified rows, hierarchical contexts and extracted documents.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::grid::Scalar;

/// Kind of a single grid row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RowKind {
    /// Report title or column-caption row.
    ReportHeader,
    /// Opens a new branch section.
    BranchMarker,
    /// Opens a new customer under the current branch.
    CustomerMarker,
    /// Contact details for the open customer.
    ContactMarker,
    /// A pending document.
    DocumentRow,
    /// Subtotal or total line.
    TotalRow,
    /// Every cell empty.
    Blank,
    /// Matched no rule.
    Unrecognized,
}

impl RowKind {
    /// Stable label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            RowKind::ReportHeader => "report-header",
            RowKind::BranchMarker => "branch-marker",
            RowKind::CustomerMarker => "customer-marker",
            RowKind::ContactMarker => "contact-marker",
            RowKind::DocumentRow => "document-row",
            RowKind::TotalRow => "total-row",
            RowKind::Blank => "blank",
            RowKind::Unrecognized => "unrecognized",
        }
    }
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Semantic name of a value extracted from a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKey {
    BranchName,
    CustomerCode,
    CustomerName,
    Contact,
    TypeCode,
    Letter,
    PointOfSale,
    Number,
    Installment,
    IssueDate,
    DueDate,
    PendingAmount,
    OriginalAmount,
    Observations,
    DaysOverdue,
}

impl FieldKey {
    /// Field name as shown in rejection reasons.
    pub fn name(&self) -> &'static str {
        match self {
            FieldKey::BranchName => "branch_name",
            FieldKey::CustomerCode => "customer_code",
            FieldKey::CustomerName => "customer_name",
            FieldKey::Contact => "contact",
            FieldKey::TypeCode => "type_code",
            FieldKey::Letter => "letter",
            FieldKey::PointOfSale => "point_of_sale",
            FieldKey::Number => "number",
            FieldKey::Installment => "installment",
            FieldKey::IssueDate => "issue_date",
            FieldKey::DueDate => "due_date",
            FieldKey::PendingAmount => "pending_amount",
            FieldKey::OriginalAmount => "original_amount",
            FieldKey::Observations => "observations",
            FieldKey::DaysOverdue => "days_overdue",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A row after classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedRow {
    /// Zero-based index of the row in the source grid.
    pub row_index: usize,
    /// Classification result.
    pub kind: RowKind,
    /// Values extracted for this kind.
    pub fields: BTreeMap<FieldKey, Scalar>,
}

impl ClassifiedRow {
    pub fn new(row_index: usize, kind: RowKind) -> Self {
        Self {
            row_index,
            kind,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, key: FieldKey, value: Scalar) -> Self {
        self.fields.insert(key, value);
        self
    }

    /// Look up a field.
    pub fn field(&self, key: FieldKey) -> Option<&Scalar> {
        self.fields.get(&key)
    }

    /// Text of a field, ignoring empty values.
    pub fn text(&self, key: FieldKey) -> Option<String> {
        match self.fields.get(&key)? {
            Scalar::Empty => None,
            other => {
                let s = other.display();
                if s.is_empty() { None } else { Some(s) }
            }
        }
    }

    /// One-based row number as operators see it in the spreadsheet.
    pub fn row_number(&self) -> usize {
        self.row_index + 1
    }
}

/// Grouping label for the documents under a branch marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchContext {
    pub name: String,
}

/// The customer a run of document rows belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerContext {
    /// Legacy account code, when the marker carried one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Customer name; may be empty when only a code was given.
    pub name: String,
    /// Free-text contact details from a contact row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<String>,
}

impl CustomerContext {
    /// Identity used for fingerprints: the code when present, else the name.
    pub fn identity(&self) -> &str {
        match &self.code {
            Some(code) if !code.is_empty() => code,
            _ => &self.name,
        }
    }

    /// Name to show operators and to create destination records with.
    pub fn display_name(&self) -> String {
        if !self.name.is_empty() {
            self.name.clone()
        } else {
            format!("Cliente {}", self.code.as_deref().unwrap_or_default())
        }
    }
}

/// Deterministic identity of a document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single pending legacy document bound to its branch and customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Zero-based source row. Never part of the document identity.
    pub row_index: usize,

    /// Document type code (F/V, NC, REC...).
    pub type_code: String,

    /// Fiscal letter (A, B, C).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub letter: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub point_of_sale: Option<String>,

    pub number: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub installment: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,

    /// Amount still owed; strictly positive on emitted records.
    pub pending_amount: Decimal,

    /// Enclosing branch, if a branch marker preceded the customer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchContext>,

    pub customer: CustomerContext,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_amount: Option<Decimal>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_overdue: Option<i64>,
}

impl DocumentRecord {
    /// Name of the enclosing branch, or the empty string.
    pub fn branch_name(&self) -> &str {
        self.branch.as_ref().map(|b| b.name.as_str()).unwrap_or_default()
    }

    /// Human readable document reference, e.g. `F/V A 0001-00012345`.
    pub fn document_reference(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        if !self.type_code.is_empty() {
            parts.push(self.type_code.clone());
        }
        if let Some(letter) = &self.letter {
            parts.push(letter.clone());
        }
        if !self.number.is_empty() {
            match &self.point_of_sale {
                Some(pos) => parts.push(format!("{:0>4}-{:0>8}", pos, self.number)),
                None => parts.push(format!("{:0>8}", self.number)),
            }
        }
        if let Some(installment) = &self.installment {
            if installment != "1" {
                parts.push(format!("Cuota {}", installment));
            }
        }

        if parts.is_empty() {
            "Saldo Inicial".to_string()
        } else {
            parts.join(" ")
        }
    }

    /// One-based row number as operators see it in the spreadsheet.
    pub fn row_number(&self) -> usize {
        self.row_index + 1
    }
}

/// Why a row did not become a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RejectionReason {
    /// A document row appeared while no customer was open.
    NoOpenCustomer,
    /// A required field is absent.
    MissingRequiredField { field: FieldKey },
    /// A field was present but could not be normalized.
    Unparseable { field: FieldKey, raw: String },
    /// The pending amount is zero or negative.
    NonPositiveAmount { amount: Decimal },
    /// The row matched no classification rule.
    UnrecognizedRow,
}

impl RejectionReason {
    /// Category used to aggregate rejections in the report.
    pub fn category(&self) -> &'static str {
        match self {
            RejectionReason::NoOpenCustomer => "no open customer",
            RejectionReason::MissingRequiredField { .. } => "missing required field",
            RejectionReason::Unparseable { .. } => "unparseable field",
            RejectionReason::NonPositiveAmount { .. } => "non-positive pending amount",
            RejectionReason::UnrecognizedRow => "unrecognized row",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NoOpenCustomer => write!(f, "no open customer"),
            RejectionReason::MissingRequiredField { field } => {
                write!(f, "missing required field: {}", field)
            }
            RejectionReason::Unparseable { field, raw } => {
                write!(f, "unparseable {}: '{}'", field, raw)
            }
            RejectionReason::NonPositiveAmount { amount } => {
                write!(f, "non-positive pending amount: {}", amount)
            }
            RejectionReason::UnrecognizedRow => write!(f, "unrecognized row"),
        }
    }
}

/// A row that was classified but not turned into a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRow {
    pub row_index: usize,
    pub kind: RowKind,
    pub reason: RejectionReason,
    /// Row cells joined for operator inspection.
    pub preview: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DocumentRecord {
        DocumentRecord {
            row_index: 4,
            type_code: "F/V".to_string(),
            letter: Some("A".to_string()),
            point_of_sale: Some("1".to_string()),
            number: "12345".to_string(),
            installment: Some("1".to_string()),
            issue_date: None,
            due_date: None,
            pending_amount: Decimal::new(5000000, 2),
            branch: None,
            customer: CustomerContext {
                code: Some("1".to_string()),
                name: "CLIENTE EJEMPLO SA".to_string(),
                contact: None,
            },
            original_amount: None,
            observations: None,
            days_overdue: None,
        }
    }

    #[test]
    fn test_document_reference() {
        let mut doc = record();
        assert_eq!(doc.document_reference(), "F/V A 0001-00012345");

        doc.installment = Some("3".to_string());
        assert_eq!(doc.document_reference(), "F/V A 0001-00012345 Cuota 3");

        doc.point_of_sale = None;
        doc.letter = None;
        assert_eq!(doc.document_reference(), "F/V 00012345 Cuota 3");
    }

    #[test]
    fn test_customer_identity_prefers_code() {
        let mut customer = record().customer;
        assert_eq!(customer.identity(), "1");

        customer.code = None;
        assert_eq!(customer.identity(), "CLIENTE EJEMPLO SA");

        customer.name.clear();
        customer.code = Some("77".to_string());
        assert_eq!(customer.display_name(), "Cliente 77");
    }

    #[test]
    fn test_rejection_reason_display() {
        let reason = RejectionReason::MissingRequiredField {
            field: FieldKey::Number,
        };
        assert_eq!(reason.to_string(), "missing required field: number");
        assert_eq!(reason.category(), "missing required field");
        assert_eq!(RejectionReason::NoOpenCustomer.to_string(), "no open customer");
    }
}
