//! Configuration structures for the extraction pipeline.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default receivable account (Deudores por Ventas).
pub const DEFAULT_RECEIVABLE_ACCOUNT: &str = "1.1.3.01.001";

/// Default counterpart account (opening balance adjustment).
pub const DEFAULT_COUNTERPART_ACCOUNT: &str = "3.1.1.01.001";

/// Default journal for migration entries.
pub const DEFAULT_JOURNAL: &str = "MISC";

/// Prefix of every posting reference; the loader searches it to find prior runs.
pub const DEFAULT_REFERENCE_PREFIX: &str = "MIGLEG";

/// Main configuration for the saldos pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaldosConfig {
    /// Document row column layout.
    pub layout: ColumnLayout,

    /// Row classification pattern tables.
    pub classifier: ClassifierConfig,

    /// Posting synthesis configuration.
    pub posting: PostingConfig,

    /// Extraction report configuration.
    pub report: ReportConfig,

    /// Customer master import configuration.
    pub customers: CustomerImportConfig,
}

/// Zero-based column of each document field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnLayout {
    /// Detect columns from a caption row before classifying.
    pub auto_detect: bool,

    pub type_code: usize,
    pub letter: usize,
    pub point_of_sale: usize,
    pub number: usize,
    pub installment: usize,
    pub issue_date: usize,
    pub due_date: usize,
    pub pending_amount: usize,

    /// Optional columns, carried on the record when mapped.
    pub original_amount: Option<usize>,
    pub observations: Option<usize>,
    pub days_overdue: Option<usize>,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self {
            auto_detect: false,
            type_code: 0,
            letter: 1,
            point_of_sale: 2,
            number: 3,
            installment: 4,
            issue_date: 5,
            due_date: 6,
            pending_amount: 7,
            original_amount: None,
            observations: None,
            days_overdue: None,
        }
    }
}

impl ColumnLayout {
    /// Layout of the account-statement export the migration was first built
    /// for: TC, L, Boca, Número, Cuota, Fec. Fac, Obs, Venc, Original, $,
    /// Pendiente, -, Mora.
    pub fn legacy_statement() -> Self {
        Self {
            auto_detect: false,
            type_code: 0,
            letter: 1,
            point_of_sale: 2,
            number: 3,
            installment: 4,
            issue_date: 5,
            due_date: 7,
            pending_amount: 10,
            original_amount: Some(8),
            observations: Some(6),
            days_overdue: Some(12),
        }
    }
}

/// Data-driven pattern tables for row classification.
///
/// Labels are matched case-insensitively at the start of the first non-empty
/// cell and must be followed by `:`, whitespace or the end of the cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub branch_labels: Vec<String>,
    pub customer_labels: Vec<String>,
    pub contact_labels: Vec<String>,

    /// Words marking subtotal/total rows anywhere in the row.
    pub total_keywords: Vec<String>,

    /// Column captions that open a header row.
    pub header_keywords: Vec<String>,

    /// Phrases found in report title rows.
    pub title_keywords: Vec<String>,

    /// Recognized document type codes.
    pub type_codes: Vec<String>,

    /// Operator-supplied type codes added to the defaults.
    pub extra_type_codes: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            branch_labels: strings(&["sucursal", "suc", "local"]),
            customer_labels: strings(&["cuenta", "cliente", "cod"]),
            contact_labels: strings(&["contacto", "tel", "email"]),
            total_keywords: strings(&["total", "subtotal", "totales"]),
            header_keywords: strings(&["tc", "tipo", "comprobante", "monto"]),
            title_keywords: strings(&["saldos", "cuentas corrientes", "listado", "reporte"]),
            type_codes: strings(&[
                "F/V", "FA", "FB", "NC", "ND", "REC", "FV", "FC", "FCE", "NCE", "NDE", "RBO",
            ]),
            extra_type_codes: Vec::new(),
        }
    }
}

impl ClassifierConfig {
    /// All recognized type codes, upper-cased.
    pub fn recognized_type_codes(&self) -> BTreeSet<String> {
        self.type_codes
            .iter()
            .chain(self.extra_type_codes.iter())
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

/// Accounts and journal the postings are booked against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostingConfig {
    pub receivable_account: String,
    pub counterpart_account: String,
    pub journal: String,

    /// As-of date of the migration; the current date when unset.
    pub migration_date: Option<NaiveDate>,

    /// Ask the loader to post entries right after creating them.
    pub auto_post: bool,

    pub reference_prefix: String,
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            receivable_account: DEFAULT_RECEIVABLE_ACCOUNT.to_string(),
            counterpart_account: DEFAULT_COUNTERPART_ACCOUNT.to_string(),
            journal: DEFAULT_JOURNAL.to_string(),
            migration_date: None,
            auto_post: false,
            reference_prefix: DEFAULT_REFERENCE_PREFIX.to_string(),
        }
    }
}

/// Extraction report configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Maximum accepted and rejected rows kept as samples.
    pub sample_size: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { sample_size: 5 }
    }
}

/// Customer master import configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerImportConfig {
    /// Fill contact fields of customers already in the ledger.
    pub update_existing: bool,
}

impl SaldosConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
