//! Stateless per-row classification.

use std::collections::BTreeSet;

use regex::Regex;
use tracing::trace;

use crate::error::Result;
use crate::models::config::{ClassifierConfig, ColumnLayout};
use crate::models::document::{ClassifiedRow, FieldKey, RowKind};
use crate::models::grid::Scalar;

use super::normalize::{to_amount, to_date, to_identifier};
use super::rules::patterns::LEADING_CODE;
use super::rules::{canonical_identifier, parse_amount};

/// Non-empty cells a title row may spread over ("Saldos al", date, page).
const TITLE_MAX_CELLS: usize = 3;

/// A label-prefix rule: first non-empty cell → row kind.
#[derive(Debug, Clone)]
struct MarkerRule {
    kind: RowKind,
    pattern: Regex,
}

/// Classifies one normalized row at a time.
///
/// Holds only the compiled pattern tables and the column layout; no state
/// carries over between rows.
#[derive(Debug, Clone)]
pub struct SectionClassifier {
    layout: ColumnLayout,
    type_codes: BTreeSet<String>,
    /// Branch, customer and contact rules in priority order.
    markers: Vec<MarkerRule>,
    header: Option<Regex>,
    title_keywords: Vec<String>,
    total: Option<Regex>,
}

impl SectionClassifier {
    /// Compile the pattern tables of `config`.
    pub fn new(config: &ClassifierConfig, layout: ColumnLayout) -> Result<Self> {
        let mut markers = Vec::new();
        for (kind, labels) in [
            (RowKind::BranchMarker, &config.branch_labels),
            (RowKind::CustomerMarker, &config.customer_labels),
            (RowKind::ContactMarker, &config.contact_labels),
        ] {
            if let Some(alternation) = alternation(labels) {
                let pattern = Regex::new(&format!(
                    r"(?i)^(?:{})(?:\s*[:.]\s*|\s+|$)(.*)$",
                    alternation
                ))?;
                markers.push(MarkerRule { kind, pattern });
            }
        }

        let header = alternation(&config.header_keywords)
            .map(|alt| Regex::new(&format!(r"(?i)^(?:{})(?:[\s.:]|$)", alt)))
            .transpose()?;

        let total = alternation(&config.total_keywords)
            .map(|alt| Regex::new(&format!(r"(?i)\b(?:{})", alt)))
            .transpose()?;

        Ok(Self {
            layout,
            type_codes: config.recognized_type_codes(),
            markers,
            header,
            title_keywords: config
                .title_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
            total,
        })
    }

    /// Column layout used for document rows.
    pub fn layout(&self) -> &ColumnLayout {
        &self.layout
    }

    /// Classify a row. Exactly one kind is returned; first matching rule wins.
    pub fn classify(&self, row_index: usize, cells: &[Scalar]) -> ClassifiedRow {
        let Some((first_col, first)) = cells.iter().enumerate().find(|(_, c)| !c.is_empty()) else {
            return ClassifiedRow::new(row_index, RowKind::Blank);
        };

        if let Some(text) = first.as_text() {
            for rule in &self.markers {
                if let Some(caps) = rule.pattern.captures(text) {
                    let remainder = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                    let rest = &cells[first_col + 1..];
                    trace!(row = row_index + 1, kind = %rule.kind, "marker row");
                    return match rule.kind {
                        RowKind::BranchMarker => branch_row(row_index, remainder, rest),
                        RowKind::CustomerMarker => customer_row(row_index, remainder, rest),
                        _ => contact_row(row_index, remainder, rest),
                    };
                }
            }
        }

        let is_document = self.is_document(cells);

        if !is_document && self.is_report_header(first, cells) {
            return ClassifiedRow::new(row_index, RowKind::ReportHeader);
        }

        if self.is_total(cells) {
            return ClassifiedRow::new(row_index, RowKind::TotalRow);
        }

        if is_document {
            return self.document_row(row_index, cells);
        }

        ClassifiedRow::new(row_index, RowKind::Unrecognized)
    }

    fn is_document(&self, cells: &[Scalar]) -> bool {
        match cells.get(self.layout.type_code) {
            Some(Scalar::Text(code)) => self.type_codes.contains(&code.to_uppercase()),
            _ => false,
        }
    }

    fn is_report_header(&self, first: &Scalar, cells: &[Scalar]) -> bool {
        if let (Some(header), Some(text)) = (&self.header, first.as_text()) {
            if header.is_match(text) {
                return true;
            }
        }

        if self.title_keywords.is_empty() || !looks_like_title(cells) {
            return false;
        }
        let joined = cells
            .iter()
            .filter_map(Scalar::as_text)
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        self.title_keywords.iter().any(|k| joined.contains(k.as_str()))
    }

    fn is_total(&self, cells: &[Scalar]) -> bool {
        let Some(total) = &self.total else {
            return false;
        };
        // Free-text observations may legitimately say "pago total".
        cells
            .iter()
            .enumerate()
            .filter(|(i, _)| Some(*i) != self.layout.observations)
            .filter_map(|(_, c)| c.as_text())
            .any(|text| total.is_match(text))
    }

    fn document_row(&self, row_index: usize, cells: &[Scalar]) -> ClassifiedRow {
        let layout = &self.layout;
        let mut row = ClassifiedRow::new(row_index, RowKind::DocumentRow);

        let mut put = |key: FieldKey, col: Option<usize>, coerce: fn(&Scalar) -> Scalar| {
            if let Some(value) = col.and_then(|c| cells.get(c)) {
                row.fields.insert(key, coerce(value));
            }
        };

        put(FieldKey::TypeCode, Some(layout.type_code), upper_text);
        put(FieldKey::Letter, Some(layout.letter), upper_text);
        put(FieldKey::PointOfSale, Some(layout.point_of_sale), to_identifier);
        put(FieldKey::Number, Some(layout.number), to_identifier);
        put(FieldKey::Installment, Some(layout.installment), to_identifier);
        put(FieldKey::IssueDate, Some(layout.issue_date), to_date);
        put(FieldKey::DueDate, Some(layout.due_date), to_date);
        put(FieldKey::PendingAmount, Some(layout.pending_amount), to_amount);
        put(FieldKey::OriginalAmount, layout.original_amount, to_amount);
        put(FieldKey::Observations, layout.observations, Scalar::clone);
        put(FieldKey::DaysOverdue, layout.days_overdue, to_amount);

        row
    }
}

/// A few text cells and no amounts. Data-shaped rows with an unknown type
/// code stay unrecognized even if a cell mentions a title keyword.
fn looks_like_title(cells: &[Scalar]) -> bool {
    let mut count = 0;
    for cell in cells.iter().filter(|c| !c.is_empty()) {
        count += 1;
        let is_amount = match cell {
            Scalar::Number(_) => true,
            Scalar::Text(t) => parse_amount(t).is_some(),
            _ => false,
        };
        if is_amount || count > TITLE_MAX_CELLS {
            return false;
        }
    }
    count > 0
}

fn upper_text(value: &Scalar) -> Scalar {
    match value {
        Scalar::Text(s) => Scalar::Text(s.to_uppercase()),
        other => Scalar::Text(other.display()),
    }
}

/// Regex alternation of `labels`, longest first so `sucursal` wins over `suc`.
fn alternation(labels: &[String]) -> Option<String> {
    let mut labels: Vec<&str> = labels
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if labels.is_empty() {
        return None;
    }
    labels.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    labels.dedup();
    Some(
        labels
            .iter()
            .map(|l| regex::escape(l))
            .collect::<Vec<_>>()
            .join("|"),
    )
}

/// Text of the first non-empty cell in `rest`.
fn next_value(rest: &[Scalar]) -> Option<String> {
    rest.iter().find(|c| !c.is_empty()).map(Scalar::display)
}

fn branch_row(row_index: usize, remainder: &str, rest: &[Scalar]) -> ClassifiedRow {
    let mut row = ClassifiedRow::new(row_index, RowKind::BranchMarker);
    let name = if remainder.is_empty() {
        next_value(rest)
    } else {
        Some(remainder.to_string())
    };
    if let Some(name) = name {
        row.fields.insert(FieldKey::BranchName, Scalar::Text(name));
    }
    row
}

/// Split `"001 CLIENTE SA"` into a code and a name.
fn split_code_name(text: &str) -> (Option<String>, Option<String>) {
    match LEADING_CODE.captures(text) {
        Some(caps) => {
            let code = canonical_identifier(&caps[1]);
            let name = caps[2].trim();
            (Some(code), (!name.is_empty()).then(|| name.to_string()))
        }
        None => (None, Some(text.to_string())),
    }
}

fn customer_row(row_index: usize, remainder: &str, rest: &[Scalar]) -> ClassifiedRow {
    let (mut code, mut name) = if remainder.is_empty() {
        (None, None)
    } else {
        split_code_name(remainder)
    };

    // Exports that put the code and name in their own cells:
    // ["Cuenta:", 20.0, "PORTAL DEL IGUAZU S.A.", 498200.0]
    for cell in rest.iter().filter(|c| !c.is_empty()) {
        if name.is_some() {
            break;
        }
        match cell {
            Scalar::Number(n) if code.is_none() && n.fract().is_zero() => {
                code = Some(canonical_identifier(&n.normalize().to_string()));
            }
            Scalar::Text(text) if code.is_none() => {
                let (c, n) = split_code_name(text);
                code = c;
                name = n;
            }
            Scalar::Text(text) => name = Some(text.clone()),
            _ => {}
        }
    }

    let mut row = ClassifiedRow::new(row_index, RowKind::CustomerMarker);
    if let Some(code) = code {
        row.fields.insert(FieldKey::CustomerCode, Scalar::Text(code));
    }
    if let Some(name) = name {
        row.fields.insert(FieldKey::CustomerName, Scalar::Text(name));
    }
    row
}

fn contact_row(row_index: usize, remainder: &str, rest: &[Scalar]) -> ClassifiedRow {
    let parts: Vec<String> = std::iter::once(remainder.to_string())
        .chain(rest.iter().map(Scalar::display))
        .filter(|s| !s.is_empty())
        .collect();

    let mut row = ClassifiedRow::new(row_index, RowKind::ContactMarker);
    if !parts.is_empty() {
        row.fields.insert(FieldKey::Contact, Scalar::Text(parts.join(" ")));
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::normalize::normalize_row;
    use crate::models::grid::RawCell;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn classifier() -> SectionClassifier {
        SectionClassifier::new(&ClassifierConfig::default(), ColumnLayout::default()).unwrap()
    }

    fn classify(cells: &[&str]) -> ClassifiedRow {
        let raw: Vec<RawCell> = cells.iter().map(|c| RawCell::text(*c)).collect();
        classifier().classify(0, &normalize_row(&raw))
    }

    fn text(s: &str) -> Scalar {
        Scalar::Text(s.to_string())
    }

    #[test]
    fn test_blank_row() {
        assert_eq!(classify(&["", "  ", ""]).kind, RowKind::Blank);
        assert_eq!(classify(&[]).kind, RowKind::Blank);
    }

    #[test]
    fn test_branch_marker() {
        let row = classify(&["Sucursal: Casa Central"]);
        assert_eq!(row.kind, RowKind::BranchMarker);
        assert_eq!(row.field(FieldKey::BranchName), Some(&text("Casa Central")));

        let row = classify(&["", "SUC:", "Norte"]);
        assert_eq!(row.kind, RowKind::BranchMarker);
        assert_eq!(row.field(FieldKey::BranchName), Some(&text("Norte")));
    }

    #[test]
    fn test_customer_marker_in_one_cell() {
        let row = classify(&["Cuenta: 001 CLIENTE EJEMPLO SA"]);
        assert_eq!(row.kind, RowKind::CustomerMarker);
        assert_eq!(row.field(FieldKey::CustomerCode), Some(&text("1")));
        assert_eq!(row.field(FieldKey::CustomerName), Some(&text("CLIENTE EJEMPLO SA")));
    }

    #[test]
    fn test_customer_marker_across_cells() {
        let raw = vec![
            RawCell::text("Cuenta:"),
            RawCell::Number(20.0),
            RawCell::text("PORTAL DEL IGUAZU S.A."),
            RawCell::Number(498200.0),
        ];
        let row = classifier().classify(3, &normalize_row(&raw));

        assert_eq!(row.kind, RowKind::CustomerMarker);
        assert_eq!(row.field(FieldKey::CustomerCode), Some(&text("20")));
        assert_eq!(
            row.field(FieldKey::CustomerName),
            Some(&text("PORTAL DEL IGUAZU S.A."))
        );
    }

    #[test]
    fn test_customer_marker_without_code() {
        let row = classify(&["Cliente: DISTRIBUIDORA SUR"]);
        assert_eq!(row.field(FieldKey::CustomerCode), None);
        assert_eq!(row.field(FieldKey::CustomerName), Some(&text("DISTRIBUIDORA SUR")));
    }

    #[test]
    fn test_contact_marker() {
        let row = classify(&["Contacto:", "Juan Perez", "", "4444-5555"]);
        assert_eq!(row.kind, RowKind::ContactMarker);
        assert_eq!(row.field(FieldKey::Contact), Some(&text("Juan Perez 4444-5555")));
    }

    #[test]
    fn test_label_needs_word_boundary() {
        // "Cuentas corrientes" is a title, not a customer marker.
        let row = classify(&["Cuentas corrientes al 31/12/2025"]);
        assert_eq!(row.kind, RowKind::ReportHeader);

        assert_eq!(classify(&["Localidad", "x"]).kind, RowKind::Unrecognized);
    }

    #[test]
    fn test_report_header() {
        let row = classify(&["TC", "L", "Boca", "Numero", "Cuota", "Fec. Fac", "Venc", "Pendiente"]);
        assert_eq!(row.kind, RowKind::ReportHeader);
    }

    #[test]
    fn test_total_row() {
        assert_eq!(classify(&["", "", "Total Cliente", "", "50.000,00"]).kind, RowKind::TotalRow);
        assert_eq!(classify(&["SUBTOTAL"]).kind, RowKind::TotalRow);
        // Total wins over a type code in the type column.
        assert_eq!(classify(&["F/V", "Total"]).kind, RowKind::TotalRow);
        assert_eq!(classify(&["", "TotalCliente", "", "10"]).kind, RowKind::TotalRow);
        assert_eq!(classify(&["Subtotales"]).kind, RowKind::TotalRow);
    }

    #[test]
    fn test_total_needs_word_start() {
        assert_eq!(classify(&["XX", "CAPITOTAL SRL"]).kind, RowKind::Unrecognized);
    }

    #[test]
    fn test_title_keyword_needs_title_shaped_row() {
        let row = classify(&["FX", "A", "1", "99", "1", "", "", "500", "saldos pendientes"]);
        assert_eq!(row.kind, RowKind::Unrecognized);

        assert_eq!(classify(&["Listado de saldos", "Hoja 1"]).kind, RowKind::ReportHeader);
        assert_eq!(classify(&["Saldos al", "31/12/2025"]).kind, RowKind::ReportHeader);
        assert_eq!(classify(&["Reporte", "saldo", "500"]).kind, RowKind::Unrecognized);
    }

    #[test]
    fn test_document_row() {
        let row = classify(&["F/V", "A", "0001", "12345", "1", "01/2026", "02/2026", "50000"]);

        assert_eq!(row.kind, RowKind::DocumentRow);
        assert_eq!(row.field(FieldKey::TypeCode), Some(&text("F/V")));
        assert_eq!(row.field(FieldKey::PointOfSale), Some(&text("1")));
        assert_eq!(row.field(FieldKey::Number), Some(&text("12345")));
        assert_eq!(
            row.field(FieldKey::IssueDate),
            Some(&Scalar::Date(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()))
        );
        assert_eq!(
            row.field(FieldKey::PendingAmount),
            Some(&Scalar::Number(Decimal::from_str("50000").unwrap()))
        );
        assert_eq!(row.field(FieldKey::OriginalAmount), None);
    }

    #[test]
    fn test_document_row_short_row_leaves_fields_absent() {
        let row = classify(&["nc", "B", "2", "77"]);

        assert_eq!(row.kind, RowKind::DocumentRow);
        assert_eq!(row.field(FieldKey::TypeCode), Some(&text("NC")));
        assert_eq!(row.field(FieldKey::PendingAmount), None);
    }

    #[test]
    fn test_extra_type_codes() {
        let config = ClassifierConfig {
            extra_type_codes: vec!["ANT".to_string()],
            ..Default::default()
        };
        let classifier = SectionClassifier::new(&config, ColumnLayout::default()).unwrap();
        let row = classifier.classify(0, &[text("ANT"), text("X"), text("1"), text("9")]);
        assert_eq!(row.kind, RowKind::DocumentRow);

        assert_eq!(classify(&["ANT", "X", "1", "9"]).kind, RowKind::Unrecognized);
    }

    #[test]
    fn test_unrecognized_row() {
        assert_eq!(classify(&["XX", "A", "1", "2"]).kind, RowKind::Unrecognized);
    }
}
