//! Report-level detection run once before classification: column captions
//! and title metadata.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::config::ColumnLayout;
use crate::models::grid::{RawGrid, Scalar};

use super::normalize::normalize_row;
use super::rules::{find_date, parse_date};

/// Rows scanned for a caption row.
const HEADER_SCAN_ROWS: usize = 50;

/// Rows scanned for the report date.
const METADATA_SCAN_ROWS: usize = 20;

/// Rows scanned for the company name.
const COMPANY_SCAN_ROWS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    TypeCode,
    Letter,
    Installment,
    Number,
    PointOfSale,
    DueDate,
    IssueDate,
    PendingAmount,
    OriginalAmount,
    Observations,
    DaysOverdue,
}

/// How a caption keyword is compared to a cell.
#[derive(Debug, Clone, Copy)]
enum Match {
    Exact(&'static str),
    Contains(&'static str),
}

impl Match {
    fn matches(&self, caption: &str) -> bool {
        match self {
            Match::Exact(k) => caption == *k,
            Match::Contains(k) => caption.contains(k),
        }
    }
}

/// Caption rules in priority order. A cell maps to the first field it
/// matches that is still unassigned.
const CAPTIONS: &[(Column, &[Match])] = &[
    (
        Column::TypeCode,
        &[Match::Exact("tc"), Match::Contains("tipo"), Match::Contains("comp")],
    ),
    (
        Column::Letter,
        &[Match::Exact("l"), Match::Exact("l."), Match::Exact("let"), Match::Contains("letra")],
    ),
    (Column::Installment, &[Match::Contains("cuota"), Match::Exact("cta")]),
    (
        Column::Number,
        &[
            Match::Contains("núm"),
            Match::Contains("num"),
            Match::Contains("nro"),
            Match::Exact("n°"),
        ],
    ),
    (
        Column::PointOfSale,
        &[
            Match::Contains("boca"),
            Match::Contains("pto"),
            Match::Contains("punto"),
            Match::Contains("suc"),
        ],
    ),
    (Column::DueDate, &[Match::Contains("venc"), Match::Contains("vto")]),
    (
        Column::IssueDate,
        &[Match::Contains("fec"), Match::Contains("emisi")],
    ),
    (
        Column::PendingAmount,
        &[
            Match::Contains("pendiente"),
            Match::Contains("saldo"),
            Match::Contains("adeuda"),
        ],
    ),
    (
        Column::OriginalAmount,
        &[
            Match::Contains("original"),
            Match::Contains("importe"),
            Match::Contains("monto"),
        ],
    ),
    (Column::Observations, &[Match::Contains("obs")]),
    (
        Column::DaysOverdue,
        &[Match::Contains("mora"), Match::Contains("dias"), Match::Contains("días")],
    ),
];

impl ColumnLayout {
    /// Find the first caption row of `grid` and derive a layout from it.
    ///
    /// Returns the zero-based caption row and the detected layout. Fields
    /// without a caption keep their position in `self`. A row only counts as
    /// a caption row when it names the type column plus the number or the
    /// pending amount column.
    pub fn detect(&self, grid: &RawGrid) -> Option<(usize, ColumnLayout)> {
        grid.rows()
            .iter()
            .take(HEADER_SCAN_ROWS)
            .enumerate()
            .find_map(|(index, row)| {
                let layout = self.layout_from_captions(&normalize_row(row))?;
                debug!(row = index + 1, ?layout, "column layout detected");
                Some((index, layout))
            })
    }

    fn layout_from_captions(&self, cells: &[Scalar]) -> Option<ColumnLayout> {
        let mut found: Vec<(Column, usize)> = Vec::new();

        for (col, cell) in cells.iter().enumerate() {
            let Some(caption) = cell.as_text().map(str::to_lowercase) else {
                continue;
            };
            let hit = CAPTIONS.iter().find(|(column, rules)| {
                !found.iter().any(|(c, _)| c == column) && rules.iter().any(|r| r.matches(&caption))
            });
            if let Some((column, _)) = hit {
                found.push((*column, col));
            }
        }

        let position = |column: Column| found.iter().find(|(c, _)| *c == column).map(|(_, i)| *i);

        let type_code = position(Column::TypeCode)?;
        if position(Column::Number).is_none() && position(Column::PendingAmount).is_none() {
            return None;
        }

        Some(ColumnLayout {
            auto_detect: self.auto_detect,
            type_code,
            letter: position(Column::Letter).unwrap_or(self.letter),
            point_of_sale: position(Column::PointOfSale).unwrap_or(self.point_of_sale),
            number: position(Column::Number).unwrap_or(self.number),
            installment: position(Column::Installment).unwrap_or(self.installment),
            issue_date: position(Column::IssueDate).unwrap_or(self.issue_date),
            due_date: position(Column::DueDate).unwrap_or(self.due_date),
            pending_amount: position(Column::PendingAmount).unwrap_or(self.pending_amount),
            original_amount: position(Column::OriginalAmount).or(self.original_amount),
            observations: position(Column::Observations).or(self.observations),
            days_overdue: position(Column::DaysOverdue).or(self.days_overdue),
        })
    }
}

/// Facts about the report as a whole, read from its title rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// As-of date printed in the title ("Saldos al 31/12/2025").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_date: Option<NaiveDate>,

    /// Issuing company, when a title row names it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl ReportMetadata {
    /// Scan the first rows of `grid` for the report date and company name.
    pub fn detect(grid: &RawGrid) -> Self {
        let mut metadata = ReportMetadata::default();

        for (index, row) in grid.rows().iter().take(METADATA_SCAN_ROWS).enumerate() {
            let cells = normalize_row(row);

            if metadata.report_date.is_none() {
                let joined = cells
                    .iter()
                    .map(Scalar::display)
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                if joined.contains("saldo") {
                    metadata.report_date = cells.iter().find_map(|cell| match cell {
                        Scalar::Date(d) => Some(*d),
                        Scalar::Text(t) => find_date(t).or_else(|| parse_date(t)),
                        _ => None,
                    });
                }
            }

            if metadata.company_name.is_none() && index < COMPANY_SCAN_ROWS {
                metadata.company_name = cells
                    .iter()
                    .filter_map(Scalar::as_text)
                    .find(|t| looks_like_company(t))
                    .map(str::to_string);
            }
        }

        metadata
    }
}

fn looks_like_company(text: &str) -> bool {
    if text.chars().count() <= 5 {
        return false;
    }
    let lower = text.to_lowercase();
    if ["saldo", "fecha", "cuenta", "cliente", "sucursal"]
        .iter()
        .any(|label| lower.contains(label))
    {
        return false;
    }
    let upper_case =
        text.chars().any(char::is_alphabetic) && !text.chars().any(char::is_lowercase);
    let upper = text.to_uppercase();
    upper_case || upper.contains("S.A") || upper.contains("SRL") || upper.contains("S.R.L")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::grid::RawCell;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_legacy_statement_layout() {
        let grid = RawGrid::from_text_rows(vec![
            vec!["EMPRESA EJEMPLO S.A."],
            vec!["TC", "L", "Boca", "Número", "Cuota", "Fec. Fac", "Obs", "Venc", "Original", "$", "Pendiente", "-", "Mora"],
            vec!["F/V", "A", "1", "2"],
        ]);

        let (row, layout) = ColumnLayout::default().detect(&grid).unwrap();

        assert_eq!(row, 1);
        assert_eq!(layout, ColumnLayout::legacy_statement());
    }

    #[test]
    fn test_detect_keeps_unnamed_positions() {
        let grid = RawGrid::from_text_rows(vec![vec!["Tipo", "", "", "Nro", "", "", "", "", "Saldo"]]);

        let (_, layout) = ColumnLayout::default().detect(&grid).unwrap();

        assert_eq!(layout.type_code, 0);
        assert_eq!(layout.number, 3);
        assert_eq!(layout.pending_amount, 8);
        assert_eq!(layout.letter, ColumnLayout::default().letter);
    }

    #[test]
    fn test_no_caption_row() {
        let grid = RawGrid::from_text_rows(vec![vec!["Sucursal: Casa Central"], vec!["Tipo de cambio"]]);
        assert_eq!(ColumnLayout::default().detect(&grid), None);
    }

    #[test]
    fn test_detect_metadata() {
        let grid = RawGrid::new(vec![
            vec![RawCell::text("DISTRIBUIDORA DEL LITORAL SRL")],
            vec![
                RawCell::text("Saldos de cuentas corrientes al"),
                RawCell::Date(NaiveDate::from_ymd_opt(2025, 12, 31).unwrap()),
            ],
        ]);

        let metadata = ReportMetadata::detect(&grid);

        assert_eq!(
            metadata,
            ReportMetadata {
                report_date: NaiveDate::from_ymd_opt(2025, 12, 31),
                company_name: Some("DISTRIBUIDORA DEL LITORAL SRL".to_string()),
            }
        );
    }

    #[test]
    fn test_metadata_date_inside_title_text() {
        let grid = RawGrid::from_text_rows(vec![vec!["SALDOS AL 30/06/2025"]]);

        let metadata = ReportMetadata::detect(&grid);

        assert_eq!(metadata.report_date, NaiveDate::from_ymd_opt(2025, 6, 30));
        assert_eq!(metadata.company_name, None);
    }
}
