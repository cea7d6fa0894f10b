//! Customer master listing extraction.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::{Result, SaldosError};
use crate::models::customer::{CustomerExtraction, CustomerRecord, RejectedCustomer};
use crate::models::grid::{RawGrid, Scalar};

use super::normalize::{normalize_row, to_identifier};
use super::rules::digits_only;

/// Rows scanned for the caption row.
const HEADER_SCAN_ROWS: usize = 20;

/// Shortest tax identifier kept after reducing it to digits.
const MIN_TAX_ID_DIGITS: usize = 10;

/// Column positions of a customer listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct CustomerColumns {
    code: Option<usize>,
    name: Option<usize>,
    street: Option<usize>,
    city: Option<usize>,
    zip: Option<usize>,
    phone: Option<usize>,
    tax_id: Option<usize>,
    tax_category: Option<usize>,
    email: Option<usize>,
}

impl CustomerColumns {
    fn from_captions(cells: &[Scalar]) -> Self {
        let mut columns = Self::default();
        for (col, cell) in cells.iter().enumerate() {
            let Some(caption) = cell.as_text().map(str::to_lowercase) else {
                continue;
            };
            let has = |keys: &[&str]| keys.iter().any(|k| caption.contains(k));

            // One field per caption, checked in this order.
            let slot = if has(&["núm", "num"]) {
                &mut columns.code
            } else if has(&["nombre"]) {
                &mut columns.name
            } else if has(&["domic", "direc"]) {
                &mut columns.street
            } else if has(&["local", "ciudad"]) {
                &mut columns.city
            } else if has(&["cp", "postal"]) {
                &mut columns.zip
            } else if has(&["tel"]) {
                &mut columns.phone
            } else if has(&["cuit"]) {
                &mut columns.tax_id
            } else if has(&["iva"]) {
                &mut columns.tax_category
            } else if has(&["mail"]) {
                &mut columns.email
            } else {
                continue;
            };
            slot.get_or_insert(col);
        }
        columns
    }
}

/// Parser for the legacy customer master listing.
///
/// The listing is a plain table: a caption row mentioning "Número" within
/// the first rows, then one customer per row. Rows whose code cell is not
/// numeric (page breaks, repeated captions, footers) are skipped.
#[derive(Debug, Clone, Default)]
pub struct CustomerMasterParser;

impl CustomerMasterParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract customer records from `grid`.
    pub fn parse(&self, grid: &RawGrid) -> Result<CustomerExtraction> {
        let (header_index, columns) = grid
            .rows()
            .iter()
            .take(HEADER_SCAN_ROWS)
            .enumerate()
            .find_map(|(index, row)| {
                let cells = normalize_row(row);
                let joined = cells
                    .iter()
                    .filter_map(Scalar::as_text)
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase();
                (joined.contains("número") || joined.contains("numero"))
                    .then(|| (index, CustomerColumns::from_captions(&cells)))
            })
            .ok_or_else(|| {
                SaldosError::MissingHeader(format!(
                    "no row mentioning 'Número' in the first {} rows",
                    HEADER_SCAN_ROWS
                ))
            })?;

        debug!(row = header_index + 1, ?columns, "customer captions");

        let mut extraction = CustomerExtraction {
            header_row: header_index + 1,
            ..Default::default()
        };
        let mut seen: HashSet<String> = HashSet::new();

        for (index, row) in grid.rows().iter().enumerate().skip(header_index + 1) {
            let cells = normalize_row(row);
            let row_number = index + 1;

            let Some(code) = code_of(&cells, columns.code.unwrap_or(0)) else {
                continue;
            };

            let text = |col: Option<usize>| -> Option<String> {
                match cells.get(col?)? {
                    Scalar::Empty => None,
                    other => Some(other.display()),
                }
            };

            let Some(name) = text(columns.name) else {
                extraction.rejected.push(RejectedCustomer {
                    row_number,
                    code,
                    reason: "missing name".to_string(),
                });
                continue;
            };

            if !seen.insert(code.clone()) {
                let message = format!(
                    "row {}: duplicate customer code {} ignored",
                    row_number, code
                );
                warn!("{}", message);
                extraction.warnings.push(message);
                continue;
            }

            let tax_id = text(columns.tax_id)
                .map(|t| digits_only(&t))
                .filter(|t| t.len() >= MIN_TAX_ID_DIGITS);

            extraction.customers.push(CustomerRecord {
                row_number,
                code,
                name,
                street: text(columns.street),
                city: text(columns.city),
                zip: text(columns.zip),
                phone: text(columns.phone),
                tax_id,
                tax_category: text(columns.tax_category),
                email: text(columns.email),
            });
        }

        info!(
            customers = extraction.customers.len(),
            rejected = extraction.rejected.len(),
            "customer listing parsed"
        );

        Ok(extraction)
    }
}

/// Numeric customer code in `col`, canonicalized.
fn code_of(cells: &[Scalar], col: usize) -> Option<String> {
    match to_identifier(cells.get(col)?) {
        Scalar::Text(code) if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) => {
            Some(code)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::grid::RawCell;
    use pretty_assertions::assert_eq;

    fn listing() -> RawGrid {
        RawGrid::new(vec![
            vec![RawCell::text("LISTADO DE CLIENTES")],
            vec![
                RawCell::text("Número"),
                RawCell::text("Nombre"),
                RawCell::text("Domicilio"),
                RawCell::text("Localidad"),
                RawCell::text("CP"),
                RawCell::text("Teléfono"),
                RawCell::text("CUIT"),
                RawCell::text("IVA"),
                RawCell::text("E-mail"),
            ],
            vec![
                RawCell::Number(20.0),
                RawCell::text("PORTAL DEL IGUAZU S.A."),
                RawCell::text("Av. Victoria Aguirre 123"),
                RawCell::text("Puerto Iguazú"),
                RawCell::Number(3370.0),
                RawCell::text("03757-420000"),
                RawCell::text("30-71234567-9"),
                RawCell::text("RI"),
                RawCell::text("admin@portal.com.ar"),
            ],
            vec![RawCell::text("Número"), RawCell::text("Nombre")],
            vec![RawCell::Integer(21), RawCell::Empty],
            vec![
                RawCell::text("22"),
                RawCell::text("CONSUMIDOR FINAL"),
                RawCell::Empty,
                RawCell::Empty,
                RawCell::Empty,
                RawCell::Empty,
                RawCell::text("123"),
            ],
            vec![RawCell::text("20"), RawCell::text("OTRO NOMBRE")],
        ])
    }

    #[test]
    fn test_parse_customer_listing() {
        let extraction = CustomerMasterParser::new().parse(&listing()).unwrap();

        assert_eq!(extraction.header_row, 2);
        assert_eq!(extraction.customers.len(), 2);

        let first = &extraction.customers[0];
        assert_eq!(first.code, "20");
        assert_eq!(first.name, "PORTAL DEL IGUAZU S.A.");
        assert_eq!(first.city.as_deref(), Some("Puerto Iguazú"));
        assert_eq!(first.zip.as_deref(), Some("3370"));
        assert_eq!(first.tax_id.as_deref(), Some("30712345679"));
        assert_eq!(first.tax_category.as_deref(), Some("RI"));
        assert_eq!(first.email.as_deref(), Some("admin@portal.com.ar"));
    }

    #[test]
    fn test_short_tax_id_dropped() {
        let extraction = CustomerMasterParser::new().parse(&listing()).unwrap();

        let second = &extraction.customers[1];
        assert_eq!(second.code, "22");
        assert_eq!(second.tax_id, None);
    }

    #[test]
    fn test_rejections_and_duplicates() {
        let extraction = CustomerMasterParser::new().parse(&listing()).unwrap();

        assert_eq!(
            extraction.rejected,
            vec![RejectedCustomer {
                row_number: 5,
                code: "21".to_string(),
                reason: "missing name".to_string(),
            }]
        );
        assert_eq!(extraction.warnings.len(), 1);
        assert!(extraction.warnings[0].contains("duplicate customer code 20"));
    }

    #[test]
    fn test_missing_header() {
        let grid = RawGrid::from_text_rows(vec![vec!["Nombre", "CUIT"]]);
        let err = CustomerMasterParser::new().parse(&grid).unwrap_err();
        assert!(matches!(err, SaldosError::MissingHeader(_)));
    }
}
