//! Extraction report: counts, rejections and bounded samples for operators.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::extract::ReportMetadata;
use crate::models::document::{DocumentRecord, Fingerprint, RejectedRow, RowKind};

/// An accepted document as shown in the report sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedSample {
    /// One-based row in the sheet.
    pub row: usize,
    pub fingerprint: Fingerprint,
    pub customer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub document: String,
    pub pending_amount: Decimal,
}

/// A rejected row as shown in the report sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedSample {
    /// One-based row in the sheet.
    pub row: usize,
    pub kind: RowKind,
    pub reason: String,
    pub preview: String,
}

/// Summary of one extraction pass. Always produced, even when nothing was
/// extracted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub metadata: ReportMetadata,

    /// As-of date of the run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migration_date: Option<NaiveDate>,

    /// Zero-based row of the detected caption row, when auto-detection ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout_row: Option<usize>,

    pub total_rows: usize,
    pub rows_by_kind: BTreeMap<RowKind, usize>,

    pub documents_accepted: usize,
    pub documents_rejected: usize,
    pub unrecognized_rows: usize,
    pub duplicates_suppressed: usize,

    /// Rejections keyed by reason category.
    pub rejections_by_reason: BTreeMap<String, usize>,

    /// Sum of the pending amounts of accepted documents.
    pub total_pending: Decimal,

    /// Distinct branches and customers, in order of first appearance.
    pub branches: Vec<String>,
    pub customers: Vec<String>,

    pub accepted_sample: Vec<AcceptedSample>,
    pub rejected_sample: Vec<RejectedSample>,

    pub warnings: Vec<String>,
}

impl ExtractionReport {
    /// Rows of `kind` seen in the pass.
    pub fn count(&self, kind: RowKind) -> usize {
        self.rows_by_kind.get(&kind).copied().unwrap_or(0)
    }

    /// Whether any row was rejected or any warning raised.
    pub fn has_issues(&self) -> bool {
        self.documents_rejected > 0
            || self.unrecognized_rows > 0
            || self.duplicates_suppressed > 0
            || !self.warnings.is_empty()
    }
}

/// Accumulates an [`ExtractionReport`] while rows are processed.
#[derive(Debug)]
pub struct ReportBuilder {
    report: ExtractionReport,
    sample_size: usize,
}

impl ReportBuilder {
    pub fn new(sample_size: usize) -> Self {
        Self {
            report: ExtractionReport::default(),
            sample_size,
        }
    }

    pub fn metadata(&mut self, metadata: ReportMetadata) -> &mut Self {
        self.report.metadata = metadata;
        self
    }

    pub fn migration_date(&mut self, date: NaiveDate) -> &mut Self {
        self.report.migration_date = Some(date);
        self
    }

    pub fn layout_row(&mut self, row: Option<usize>) -> &mut Self {
        self.report.layout_row = row;
        self
    }

    /// Count a classified row.
    pub fn row(&mut self, kind: RowKind) {
        self.report.total_rows += 1;
        *self.report.rows_by_kind.entry(kind).or_insert(0) += 1;
    }

    /// Record an accepted document.
    pub fn accepted(&mut self, doc: &DocumentRecord, fingerprint: &Fingerprint) {
        let report = &mut self.report;
        report.documents_accepted += 1;
        report.total_pending += doc.pending_amount;

        if let Some(branch) = &doc.branch {
            push_unique(&mut report.branches, &branch.name);
        }
        push_unique(&mut report.customers, &doc.customer.display_name());

        if report.accepted_sample.len() < self.sample_size {
            report.accepted_sample.push(AcceptedSample {
                row: doc.row_number(),
                fingerprint: fingerprint.clone(),
                customer: doc.customer.display_name(),
                branch: doc.branch.as_ref().map(|b| b.name.clone()),
                document: doc.document_reference(),
                pending_amount: doc.pending_amount,
            });
        }
    }

    /// Record a rejected row.
    pub fn rejected(&mut self, rejected: &RejectedRow) {
        let report = &mut self.report;
        if rejected.kind == RowKind::Unrecognized {
            report.unrecognized_rows += 1;
        } else {
            report.documents_rejected += 1;
        }
        *report
            .rejections_by_reason
            .entry(rejected.reason.category().to_string())
            .or_insert(0) += 1;

        if report.rejected_sample.len() < self.sample_size {
            report.rejected_sample.push(RejectedSample {
                row: rejected.row_index + 1,
                kind: rejected.kind,
                reason: rejected.reason.to_string(),
                preview: rejected.preview.clone(),
            });
        }
    }

    /// Record a document dropped because its fingerprint was already emitted.
    pub fn duplicate(&mut self, warning: String) {
        self.report.duplicates_suppressed += 1;
        self.report.warnings.push(warning);
    }

    pub fn warning(&mut self, warning: String) {
        self.report.warnings.push(warning);
    }

    /// Finish the report.
    pub fn build(mut self) -> ExtractionReport {
        if self.report.documents_accepted == 0 {
            self.report.warnings.push("no valid documents found".to_string());
        }
        self.report
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}
