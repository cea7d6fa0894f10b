//! End-to-end extraction pass over one grid.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::extract::{normalize_row, Assembled, Assembler, ReportMetadata, SectionClassifier};
use crate::fingerprint::fingerprint;
use crate::models::config::SaldosConfig;
use crate::models::document::{DocumentRecord, Fingerprint, RejectedRow};
use crate::models::grid::{RawGrid, Scalar};
use crate::models::posting::PostingPair;
use crate::posting::PostingSynthesizer;
use crate::report::{ExtractionReport, ReportBuilder};

/// One migration unit handed to the loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub fingerprint: Fingerprint,
    pub document: DocumentRecord,
    pub posting: PostingPair,
}

/// Output of [`BalanceExtractor::extract`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Extraction {
    /// Accepted documents in grid order, one per fingerprint.
    pub documents: Vec<ExtractedDocument>,
    pub report: ExtractionReport,
}

/// Runs normalization, classification, assembly, fingerprinting and posting
/// synthesis over a grid.
#[derive(Debug, Clone)]
pub struct BalanceExtractor {
    config: SaldosConfig,
    synthesizer: PostingSynthesizer,
}

impl BalanceExtractor {
    pub fn new(config: SaldosConfig) -> Self {
        let synthesizer = PostingSynthesizer::new(config.posting.clone());
        Self {
            config,
            synthesizer,
        }
    }

    pub fn config(&self) -> &SaldosConfig {
        &self.config
    }

    pub fn synthesizer(&self) -> &PostingSynthesizer {
        &self.synthesizer
    }

    /// Extract every open-balance document from `grid`.
    ///
    /// Row problems end up in the report; the only error is a structural one
    /// (an invalid pattern table or an unbalanced posting).
    pub fn extract(&self, grid: &RawGrid) -> Result<Extraction> {
        let (layout_row, layout) = if self.config.layout.auto_detect {
            match self.config.layout.detect(grid) {
                Some((row, layout)) => (Some(row), layout),
                None => {
                    warn!("no caption row found, using configured column layout");
                    (None, self.config.layout.clone())
                }
            }
        } else {
            (None, self.config.layout.clone())
        };

        let classifier = SectionClassifier::new(&self.config.classifier, layout)?;
        let mut assembler = Assembler::new();
        let metadata = ReportMetadata::detect(grid);
        let report_date = metadata.report_date;
        let mut report = ReportBuilder::new(self.config.report.sample_size);
        report
            .metadata(metadata)
            .migration_date(self.synthesizer.migration_date())
            .layout_row(layout_row);

        info!(rows = grid.len(), "extracting open balances");

        let mut documents: Vec<ExtractedDocument> = Vec::new();
        let mut seen: HashMap<Fingerprint, usize> = HashMap::new();
        let mut undated = 0usize;

        for (index, raw) in grid.rows().iter().enumerate() {
            let cells = normalize_row(raw);
            let row = classifier.classify(index, &cells);
            report.row(row.kind);

            match assembler.feed(&row) {
                Assembled::Document(doc) => {
                    let fp = fingerprint(&doc);
                    if let Some(first) = seen.get(&fp) {
                        report.duplicate(format!(
                            "row {}: duplicate of row {} ({}), suppressed",
                            doc.row_number(),
                            first,
                            fp
                        ));
                        warn!(row = doc.row_number(), first = *first, fingerprint = %fp, "duplicate document suppressed");
                        continue;
                    }

                    let posting = self.synthesizer.synthesize(&doc, &fp, report_date)?;
                    if posting.date.is_none() {
                        undated += 1;
                    }
                    debug!(row = doc.row_number(), fingerprint = %fp, amount = %doc.pending_amount, "document accepted");
                    report.accepted(&doc, &fp);
                    seen.insert(fp.clone(), doc.row_number());
                    documents.push(ExtractedDocument {
                        fingerprint: fp,
                        document: doc,
                        posting,
                    });
                }
                Assembled::Rejected(reason) => {
                    report.rejected(&RejectedRow {
                        row_index: index,
                        kind: row.kind,
                        reason,
                        preview: preview(&cells),
                    });
                }
                Assembled::Context | Assembled::Ignored => {}
            }
        }

        for warning in assembler.into_warnings() {
            report.warning(warning);
        }
        if undated > 0 {
            warn!(undated, "documents without issue date and no report date");
            report.warning(format!(
                "{} documents have no issue date and the export has no report date; posting date left to the loader",
                undated
            ));
        }
        let report = report.build();

        info!(
            accepted = report.documents_accepted,
            rejected = report.documents_rejected,
            unrecognized = report.unrecognized_rows,
            duplicates = report.duplicates_suppressed,
            total = %report.total_pending,
            "extraction finished"
        );

        Ok(Extraction { documents, report })
    }
}

/// Non-empty cells of a row joined for display.
fn preview(cells: &[Scalar]) -> String {
    cells
        .iter()
        .filter(|c| !c.is_empty())
        .map(Scalar::display)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{ColumnLayout, PostingConfig};
    use crate::models::document::{RejectionReason, RowKind};
    use crate::models::grid::RawCell;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::collections::BTreeSet;
    use std::str::FromStr;

    fn extractor() -> BalanceExtractor {
        BalanceExtractor::new(SaldosConfig {
            posting: PostingConfig {
                migration_date: NaiveDate::from_ymd_opt(2026, 3, 31),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn scenario() -> RawGrid {
        RawGrid::from_text_rows(vec![
            vec!["Sucursal: Casa Central"],
            vec!["Cuenta: 001 CLIENTE EJEMPLO SA"],
            vec!["F/V", "A", "0001", "12345", "1", "01/2026", "02/2026", "50000"],
        ])
    }

    fn fingerprints(extraction: &Extraction) -> BTreeSet<Fingerprint> {
        extraction.documents.iter().map(|d| d.fingerprint.clone()).collect()
    }

    #[test]
    fn test_single_document_scenario() {
        let extraction = extractor().extract(&scenario()).unwrap();

        assert_eq!(extraction.documents.len(), 1);
        let extracted = &extraction.documents[0];
        assert_eq!(extracted.document.branch_name(), "Casa Central");
        assert_eq!(extracted.document.customer.name, "CLIENTE EJEMPLO SA");
        assert_eq!(extracted.document.pending_amount, Decimal::from_str("50000.00").unwrap());
        assert_eq!(extracted.posting.receivable.amount.to_string(), "50000.00");
        assert_eq!(extracted.posting.counterpart.amount.to_string(), "-50000.00");
        assert_eq!(extracted.posting.fingerprint, extracted.fingerprint);

        let report = &extraction.report;
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.documents_accepted, 1);
        assert_eq!(report.total_pending, Decimal::from(50000));
        assert_eq!(report.migration_date, NaiveDate::from_ymd_opt(2026, 3, 31));
    }

    #[test]
    fn test_document_before_customer() {
        let grid = RawGrid::from_text_rows(vec![
            vec!["Sucursal: Casa Central"],
            vec!["F/V", "A", "0001", "12345", "1", "01/2026", "02/2026", "50000"],
        ]);

        let extraction = extractor().extract(&grid).unwrap();

        assert!(extraction.documents.is_empty());
        assert_eq!(extraction.report.documents_rejected, 1);
        assert_eq!(
            extraction.report.rejections_by_reason.get("no open customer"),
            Some(&1)
        );
        assert_eq!(extraction.report.rejected_sample[0].row, 2);
        assert_eq!(extraction.report.rejected_sample[0].reason, "no open customer");
        assert!(extraction
            .report
            .warnings
            .contains(&"no valid documents found".to_string()));
    }

    #[test]
    fn test_idempotent_across_runs() {
        let first = extractor().extract(&scenario()).unwrap();
        let second = extractor().extract(&scenario()).unwrap();

        assert_eq!(fingerprints(&first), fingerprints(&second));
        assert_eq!(first.documents, second.documents);
    }

    #[test]
    fn test_reordered_export_keeps_fingerprints() {
        let original = RawGrid::from_text_rows(vec![
            vec!["Sucursal: Norte"],
            vec!["Cuenta: 10 ALFA SRL"],
            vec!["FA", "A", "2", "100", "1", "", "", "1.500"],
            vec!["FA", "A", "2", "101", "1", "", "", "200,50"],
            vec!["Cuenta: 11 BETA SA"],
            vec!["NC", "B", "2", "7", "1", "", "", "75"],
        ]);
        let reordered = RawGrid::from_text_rows(vec![
            vec!["SALDOS AL 31/12/2025"],
            vec![""],
            vec!["Sucursal: Norte"],
            vec!["Cuenta: 11 BETA SA"],
            vec!["NC", "B", "0002", "7", "1", "", "", "75,00"],
            vec!["Cuenta: 0010 ALFA SRL"],
            vec!["FA", "A", "2", "101", "1", "", "", "200,50"],
            vec!["FA", "A", "2", "100", "1", "", "", "1500"],
            vec!["", "", "Total Norte", "", "", "", "", "1.775,50"],
        ]);

        let a = extractor().extract(&original).unwrap();
        let b = extractor().extract(&reordered).unwrap();

        assert_eq!(a.documents.len(), 3);
        assert_eq!(fingerprints(&a), fingerprints(&b));
        assert_eq!(b.report.count(RowKind::TotalRow), 1);
        assert_eq!(b.report.total_pending, Decimal::from_str("1775.50").unwrap());
    }

    #[test]
    fn test_customer_never_spans_branches() {
        let grid = RawGrid::from_text_rows(vec![
            vec!["Sucursal: Norte"],
            vec!["Cuenta: 10 ALFA SRL"],
            vec!["FA", "A", "2", "100", "1", "", "", "10"],
            vec!["Sucursal: Sur"],
            vec!["FA", "A", "2", "101", "1", "", "", "10"],
            vec!["Cuenta: 12 GAMMA SA"],
            vec!["FA", "A", "3", "102", "1", "", "", "10"],
        ]);

        let extraction = extractor().extract(&grid).unwrap();

        let bound: Vec<(&str, &str)> = extraction
            .documents
            .iter()
            .map(|d| (d.document.branch_name(), d.document.customer.name.as_str()))
            .collect();
        assert_eq!(bound, vec![("Norte", "ALFA SRL"), ("Sur", "GAMMA SA")]);
        assert_eq!(extraction.report.documents_rejected, 1);
    }

    #[test]
    fn test_total_rows_never_produce_documents() {
        let grid = RawGrid::from_text_rows(vec![
            vec!["Cuenta: 10 ALFA SRL"],
            vec!["FA", "A", "2", "100", "1", "", "", "10"],
            vec!["FA", "Total cliente", "", "", "", "", "", "10"],
            vec!["TOTAL GENERAL", "", "", "", "", "", "", "10"],
        ]);

        let extraction = extractor().extract(&grid).unwrap();

        assert_eq!(extraction.documents.len(), 1);
        assert_eq!(extraction.report.count(RowKind::TotalRow), 2);
    }

    #[test]
    fn test_duplicates_suppressed_within_run() {
        let grid = RawGrid::from_text_rows(vec![
            vec!["Cuenta: 10 ALFA SRL"],
            vec!["FA", "A", "2", "100", "1", "", "", "10"],
            vec!["FA", "A", "2", "100", "1", "", "", "10,00"],
        ]);

        let extraction = extractor().extract(&grid).unwrap();

        assert_eq!(extraction.documents.len(), 1);
        assert_eq!(extraction.report.duplicates_suppressed, 1);
        assert!(extraction.report.warnings[0].starts_with("row 3: duplicate of row 2"));
    }

    #[test]
    fn test_unrecognized_and_unparseable_rows_reported() {
        let grid = RawGrid::new(vec![
            vec![RawCell::text("EMPRESA EJEMPLO S.A.")],
            vec![RawCell::text("Cuenta: 10 ALFA SRL")],
            vec![
                RawCell::text("FA"),
                RawCell::text("A"),
                RawCell::Integer(2),
                RawCell::Integer(100),
                RawCell::Integer(1),
                RawCell::Empty,
                RawCell::Empty,
                RawCell::text("diez"),
            ],
        ]);

        let extraction = extractor().extract(&grid).unwrap();

        assert!(extraction.documents.is_empty());
        assert_eq!(extraction.report.unrecognized_rows, 1);
        assert_eq!(extraction.report.documents_rejected, 1);
        assert_eq!(
            extraction.report.metadata.company_name.as_deref(),
            Some("EMPRESA EJEMPLO S.A.")
        );
        let reasons: Vec<&str> = extraction
            .report
            .rejected_sample
            .iter()
            .map(|r| r.reason.as_str())
            .collect();
        assert_eq!(reasons, vec!["unrecognized row", "unparseable pending_amount: 'diez'"]);
        assert_eq!(extraction.report.rejected_sample[1].preview, "FA | A | 2 | 100 | 1 | diez");
    }

    #[test]
    fn test_auto_detected_layout() {
        let grid = RawGrid::from_text_rows(vec![
            vec!["Cuenta: 20 PORTAL DEL IGUAZU S.A."],
            vec!["TC", "L", "Boca", "Número", "Cuota", "Fec. Fac", "Obs", "Venc", "Original", "$", "Pendiente", "-", "Mora"],
            vec!["F/V", "A", "3", "4567", "2", "15/11/2025", "reclamado", "15/12/2025", "80.000,00", "$", "42.299,35", "", "45"],
        ]);
        let mut config = SaldosConfig::default();
        config.layout.auto_detect = true;
        config.posting.migration_date = NaiveDate::from_ymd_opt(2026, 3, 31);

        let extraction = BalanceExtractor::new(config).extract(&grid).unwrap();

        assert_eq!(extraction.report.layout_row, Some(1));
        assert_eq!(extraction.report.count(RowKind::ReportHeader), 1);
        let doc = &extraction.documents[0].document;
        assert_eq!(doc.pending_amount, Decimal::from_str("42299.35").unwrap());
        assert_eq!(doc.original_amount, Some(Decimal::from_str("80000.00").unwrap()));
        assert_eq!(doc.observations.as_deref(), Some("reclamado"));
        assert_eq!(doc.days_overdue, Some(45));
        assert_eq!(doc.due_date, NaiveDate::from_ymd_opt(2025, 12, 15));
        assert_eq!(doc.document_reference(), "F/V A 0003-00004567 Cuota 2");
        assert_eq!(ColumnLayout::legacy_statement().pending_amount, 10);
    }

    #[test]
    fn test_rejection_reason_carried_on_samples() {
        let grid = RawGrid::from_text_rows(vec![
            vec!["Cuenta: 10 ALFA SRL"],
            vec!["FA", "A", "2", "", "1", "", "", "10"],
        ]);

        let extraction = extractor().extract(&grid).unwrap();

        assert_eq!(
            extraction.report.rejected_sample[0].reason,
            RejectionReason::MissingRequiredField {
                field: crate::models::document::FieldKey::Number
            }
            .to_string()
        );
    }

    #[test]
    fn test_undated_documents_use_report_date() {
        let grid = RawGrid::from_text_rows(vec![
            vec!["SALDOS AL 31/12/2025"],
            vec!["Cuenta: 10 ALFA SRL"],
            vec!["FA", "A", "2", "100", "1", "", "", "10"],
        ]);

        let extraction = extractor().extract(&grid).unwrap();

        assert_eq!(
            extraction.documents[0].posting.date,
            NaiveDate::from_ymd_opt(2025, 12, 31)
        );
    }

    #[test]
    fn test_undated_documents_are_reproducible_with_default_config() {
        let grid = RawGrid::from_text_rows(vec![
            vec!["Cuenta: 10 ALFA SRL"],
            vec!["FA", "A", "2", "100", "1", "", "", "10"],
        ]);

        let first = BalanceExtractor::new(SaldosConfig::default()).extract(&grid).unwrap();
        let second = BalanceExtractor::new(SaldosConfig::default()).extract(&grid).unwrap();

        assert_eq!(first.documents, second.documents);
        assert_eq!(first.documents[0].posting.date, None);
        assert!(first
            .report
            .warnings
            .iter()
            .any(|w| w.starts_with("1 documents have no issue date")));
    }

    #[test]
    fn test_posting_pair_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostingPair>();
        assert_send_sync::<ExtractedDocument>();
    }
}
