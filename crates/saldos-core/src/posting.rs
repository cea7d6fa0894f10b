//! Posting synthesis: one balanced double-entry pair per document.

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use tracing::trace;

use crate::error::PostingError;
use crate::extract::rules::format_amount;
use crate::models::config::PostingConfig;
use crate::models::document::{DocumentRecord, Fingerprint};
use crate::models::posting::{PostingLeg, PostingPair};

/// Minimum scale of posted amounts (cents).
const AMOUNT_SCALE: u32 = 2;

/// Builds [`PostingPair`]s from documents.
#[derive(Debug, Clone)]
pub struct PostingSynthesizer {
    config: PostingConfig,
    migration_date: NaiveDate,
}

impl PostingSynthesizer {
    /// Create a synthesizer. An unset migration date resolves to today, once.
    pub fn new(config: PostingConfig) -> Self {
        let migration_date = config
            .migration_date
            .unwrap_or_else(|| Local::now().date_naive());
        Self {
            config,
            migration_date,
        }
    }

    /// As-of date of this migration run.
    pub fn migration_date(&self) -> NaiveDate {
        self.migration_date
    }

    pub fn config(&self) -> &PostingConfig {
        &self.config
    }

    /// Reference written on the posting; the loader finds prior runs by the
    /// `{prefix}/{fingerprint}` head.
    pub fn reference(&self, doc: &DocumentRecord, fingerprint: &Fingerprint) -> String {
        let mut reference = format!("{}/{}", self.config.reference_prefix, fingerprint);
        if let Some(branch) = doc.branch.as_ref().filter(|b| !b.name.is_empty()) {
            reference.push_str(&format!(" | Suc: {}", branch.name));
        }
        reference.push_str(&format!(" | {}", doc.document_reference()));
        reference
    }

    /// Turn a document into its receivable debit and counterpart credit.
    ///
    /// The posting is dated at the document's issue date, else at
    /// `fallback_date` (the report's own date). With neither, the date is left
    /// to the loader; the migration date is never used.
    ///
    /// Fails only if the legs do not cancel out, which halts the pass.
    pub fn synthesize(
        &self,
        doc: &DocumentRecord,
        fingerprint: &Fingerprint,
        fallback_date: Option<NaiveDate>,
    ) -> Result<PostingPair, PostingError> {
        let mut amount = doc.pending_amount;
        if amount.scale() < AMOUNT_SCALE {
            amount.rescale(AMOUNT_SCALE);
        }

        let customer_name = doc.customer.display_name();

        let receivable = PostingLeg {
            account: self.config.receivable_account.clone(),
            amount,
            label: doc.document_reference(),
            counterparty: Some(doc.customer.clone()),
            maturity: doc.due_date,
        };

        let counterpart = PostingLeg {
            account: self.config.counterpart_account.clone(),
            amount: -amount,
            label: format!("Contrapartida migración - {}", customer_name),
            counterparty: None,
            maturity: None,
        };

        let pair = PostingPair {
            fingerprint: fingerprint.clone(),
            date: doc.issue_date.or(fallback_date),
            journal: self.config.journal.clone(),
            reference: self.reference(doc, fingerprint),
            narration: narration(doc, &customer_name),
            auto_post: self.config.auto_post,
            receivable,
            counterpart,
        };

        if !pair.is_balanced() {
            return Err(PostingError::Imbalance {
                fingerprint: fingerprint.to_string(),
                receivable: pair.receivable.amount,
                counterpart: pair.counterpart.amount,
            });
        }

        trace!(fingerprint = %fingerprint, amount = %amount, "posting synthesized");
        Ok(pair)
    }
}

fn narration(doc: &DocumentRecord, customer_name: &str) -> String {
    let mut lines = vec![
        "=== MIGRACIÓN SISTEMA LEGACY ===".to_string(),
        format!("Cliente: {}", customer_name),
        format!("Código: {}", doc.customer.code.as_deref().unwrap_or("-")),
    ];
    if let Some(branch) = &doc.branch {
        lines.push(format!("Sucursal legacy: {}", branch.name));
    }
    lines.push(format!("Documento: {}", doc.document_reference()));
    if let Some(original) = doc.original_amount {
        lines.push(format!("Monto original: $ {}", format_amount(original)));
    }
    lines.push(format!("Monto pendiente: $ {}", format_amount(doc.pending_amount)));
    if let Some(due) = doc.due_date {
        lines.push(format!("Vencimiento: {}", due.format("%d/%m/%Y")));
    }
    if let Some(days) = doc.days_overdue.filter(|d| *d != 0) {
        lines.push(format!("Días de mora: {}", days));
    }
    if let Some(observations) = &doc.observations {
        lines.push(format!("Observaciones: {}", observations));
    }
    if let Some(contact) = &doc.customer.contact {
        lines.push(format!("Contacto: {}", contact));
    }
    lines.join("\n")
}

/// Total of the receivable legs.
pub fn total_amount<'a>(pairs: impl IntoIterator<Item = &'a PostingPair>) -> Decimal {
    pairs.into_iter().map(PostingPair::amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::document::{BranchContext, CustomerContext};
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record() -> DocumentRecord {
        DocumentRecord {
            row_index: 3,
            type_code: "F/V".to_string(),
            letter: Some("A".to_string()),
            point_of_sale: Some("1".to_string()),
            number: "12345".to_string(),
            installment: Some("1".to_string()),
            issue_date: Some(ymd(2026, 1, 1)),
            due_date: Some(ymd(2026, 2, 1)),
            pending_amount: Decimal::from(50000),
            branch: Some(BranchContext {
                name: "Casa Central".to_string(),
            }),
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

    fn synthesizer() -> PostingSynthesizer {
        PostingSynthesizer::new(PostingConfig {
            migration_date: Some(ymd(2026, 3, 31)),
            ..Default::default()
        })
    }

    #[test]
    fn test_balanced_pair() {
        let fp = Fingerprint("abc123".to_string());
        let pair = synthesizer().synthesize(&record(), &fp, None).unwrap();

        assert!(pair.is_balanced());
        assert_eq!(pair.receivable.amount.to_string(), "50000.00");
        assert_eq!(pair.counterpart.amount.to_string(), "-50000.00");
        assert_eq!(pair.receivable.debit(), Decimal::from(50000));
        assert_eq!(pair.counterpart.credit(), Decimal::from(50000));
        assert_eq!(pair.receivable.account, "1.1.3.01.001");
        assert_eq!(pair.counterpart.account, "3.1.1.01.001");
        assert_eq!(pair.journal, "MISC");
    }

    #[test]
    fn test_counterparty_and_maturity_only_on_receivable() {
        let pair = synthesizer()
            .synthesize(&record(), &Fingerprint("abc".to_string()), None)
            .unwrap();

        assert_eq!(pair.receivable.maturity, Some(ymd(2026, 2, 1)));
        assert_eq!(
            pair.receivable.counterparty.as_ref().map(|c| c.name.as_str()),
            Some("CLIENTE EJEMPLO SA")
        );
        assert_eq!(pair.counterpart.counterparty, None);
        assert_eq!(pair.counterpart.maturity, None);
        assert_eq!(
            pair.counterpart.label,
            "Contrapartida migración - CLIENTE EJEMPLO SA"
        );
    }

    #[test]
    fn test_dated_at_issue_date_then_report_date() {
        let synthesizer = synthesizer();
        let fp = Fingerprint("abc".to_string());

        let pair = synthesizer
            .synthesize(&record(), &fp, Some(ymd(2025, 12, 31)))
            .unwrap();
        assert_eq!(pair.date, Some(ymd(2026, 1, 1)));

        let mut undated = record();
        undated.issue_date = None;
        let pair = synthesizer
            .synthesize(&undated, &fp, Some(ymd(2025, 12, 31)))
            .unwrap();
        assert_eq!(pair.date, Some(ymd(2025, 12, 31)));

        // Never the migration date.
        let pair = synthesizer.synthesize(&undated, &fp, None).unwrap();
        assert_eq!(pair.date, None);
    }

    #[test]
    fn test_undated_posting_does_not_depend_on_clock() {
        let mut undated = record();
        undated.issue_date = None;
        let fp = Fingerprint("abc".to_string());

        let first = PostingSynthesizer::new(PostingConfig::default())
            .synthesize(&undated, &fp, None)
            .unwrap();
        let second = PostingSynthesizer::new(PostingConfig::default())
            .synthesize(&undated, &fp, None)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(first.date, None);
    }

    #[test]
    fn test_reference_embeds_fingerprint_branch_and_document() {
        let synthesizer = synthesizer();
        let fp = Fingerprint("0a1b2c".to_string());

        assert_eq!(
            synthesizer.reference(&record(), &fp),
            "MIGLEG/0a1b2c | Suc: Casa Central | F/V A 0001-00012345"
        );

        let mut doc = record();
        doc.branch = None;
        assert_eq!(
            synthesizer.reference(&doc, &fp),
            "MIGLEG/0a1b2c | F/V A 0001-00012345"
        );
    }

    #[test]
    fn test_exact_amounts_keep_their_precision() {
        let mut doc = record();
        doc.pending_amount = Decimal::from_str("42299.355").unwrap();
        let pair = synthesizer()
            .synthesize(&doc, &Fingerprint("x".to_string()), None)
            .unwrap();

        assert_eq!(pair.receivable.amount.to_string(), "42299.355");
        assert_eq!(pair.receivable.amount + pair.counterpart.amount, Decimal::ZERO);
    }

    #[test]
    fn test_narration() {
        let mut doc = record();
        doc.original_amount = Some(Decimal::from(80000));
        doc.days_overdue = Some(45);
        doc.observations = Some("reclamado".to_string());

        let pair = synthesizer()
            .synthesize(&doc, &Fingerprint("x".to_string()), None)
            .unwrap();

        assert_eq!(
            pair.narration,
            "=== MIGRACIÓN SISTEMA LEGACY ===\n\
             Cliente: CLIENTE EJEMPLO SA\n\
             Código: 1\n\
             Sucursal legacy: Casa Central\n\
             Documento: F/V A 0001-00012345\n\
             Monto original: $ 80.000,00\n\
             Monto pendiente: $ 50.000,00\n\
             Vencimiento: 01/02/2026\n\
             Días de mora: 45\n\
             Observaciones: reclamado"
        );
    }

    #[test]
    fn test_total_amount() {
        let synthesizer = synthesizer();
        let fp = Fingerprint("x".to_string());
        let mut other = record();
        other.pending_amount = Decimal::from_str("0.50").unwrap();

        let pairs = vec![
            synthesizer.synthesize(&record(), &fp, None).unwrap(),
            synthesizer.synthesize(&other, &fp, None).unwrap(),
        ];

        assert_eq!(total_amount(&pairs), Decimal::from_str("50000.50").unwrap());
    }
}
