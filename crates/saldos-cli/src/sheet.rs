//! Materializes a [`RawGrid`] from a spreadsheet or CSV export.

use std::borrow::Cow;
use std::path::Path;

use anyhow::Context;
use calamine::{DataType, Reader, open_workbook_auto};
use chrono::{Duration, NaiveDate};
use tracing::debug;

use saldos_core::{RawCell, RawGrid, SaldosConfig};

/// Extensions `load_grid` understands.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods", "csv"];

/// Whether `path` has a supported extension.
pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// Read `path` into a grid. `sheet` is the zero-based worksheet index for
/// workbooks; CSV files are split on `delimiter`.
pub fn load_grid(path: &Path, sheet: usize, delimiter: u8) -> anyhow::Result<RawGrid> {
    if !path.exists() {
        anyhow::bail!("Input file not found: {}", path.display());
    }

    match extension(path).as_deref() {
        Some("csv") => load_csv(path, delimiter),
        Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext) => load_workbook(path, sheet),
        Some(ext) => anyhow::bail!("Unsupported file format: {}", ext),
        None => anyhow::bail!("Cannot determine file format of {}", path.display()),
    }
}

/// Load the CLI configuration from `path`, or the defaults.
pub fn load_config(path: Option<&str>) -> anyhow::Result<SaldosConfig> {
    match path {
        Some(path) => SaldosConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to read config file {}", path)),
        None => Ok(SaldosConfig::default()),
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn load_workbook(path: &Path, sheet: usize) -> anyhow::Result<RawGrid> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook {}", path.display()))?;

    let range = workbook
        .worksheet_range_at(sheet)
        .ok_or_else(|| anyhow::anyhow!("Sheet {} not found in {}", sheet, path.display()))?
        .with_context(|| format!("Failed to read sheet {} of {}", sheet, path.display()))?;

    // Ranges start at the first used cell; pad so row and column indices
    // match what the operator sees in the sheet.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<RawCell>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![RawCell::Empty; col_offset];
        cells.extend(row.iter().map(convert_cell));
        rows.push(cells);
    }

    debug!(rows = rows.len(), sheet, "workbook sheet loaded");
    Ok(RawGrid::new(rows))
}

fn convert_cell(cell: &DataType) -> RawCell {
    match cell {
        DataType::Empty => RawCell::Empty,
        DataType::String(s) => RawCell::text(s.as_str()),
        DataType::Int(i) => RawCell::Integer(*i),
        DataType::Float(f) => RawCell::Number(*f),
        DataType::Bool(b) => RawCell::Bool(*b),
        DataType::DateTime(serial) => excel_serial_date(*serial)
            .map(RawCell::Date)
            .unwrap_or_else(|| RawCell::Error(serial.to_string())),
        DataType::Error(e) => RawCell::Error(e.to_string()),
        other => RawCell::text(other.to_string()),
    }
}

/// Date of an Excel serial day number (1900 date system).
fn excel_serial_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}

fn load_csv(path: &Path, delimiter: u8) -> anyhow::Result<RawGrid> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record?;
        rows.push(record.iter().map(|field| RawCell::text(decode_field(field))).collect());
    }

    debug!(rows = rows.len(), "csv loaded");
    Ok(RawGrid::new(rows))
}

/// UTF-8 when valid, else Latin-1, which legacy DOS/Windows exports use.
fn decode_field(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()),
    }
}
