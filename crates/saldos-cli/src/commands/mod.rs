//! Subcommands of the `saldos` binary.

pub mod config;
pub mod customers;
pub mod extract;
pub mod migrate;

use chrono::NaiveDate;
use clap::Args;

use saldos_core::{ColumnLayout, SaldosConfig};

/// Input and layout options shared by `extract` and `migrate`.
#[derive(Args, Debug, Clone)]
pub struct SheetOptions {
    /// Zero-based worksheet index (workbooks only)
    #[arg(long, default_value_t = 0)]
    pub sheet: usize,

    /// Field delimiter (CSV only)
    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    /// Detect the column layout from the caption row
    #[arg(long)]
    pub auto_detect: bool,

    /// Use the legacy account-statement column layout
    #[arg(long, conflicts_with = "auto_detect")]
    pub legacy_layout: bool,

    /// Extra document type code to recognize (repeatable)
    #[arg(long = "type-code", value_name = "CODE")]
    pub type_codes: Vec<String>,

    /// As-of date of the migration (YYYY-MM-DD), default today
    #[arg(long, value_name = "DATE")]
    pub migration_date: Option<NaiveDate>,
}

impl SheetOptions {
    /// Apply the overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut SaldosConfig) {
        if self.legacy_layout {
            config.layout = ColumnLayout::legacy_statement();
        }
        if self.auto_detect {
            config.layout.auto_detect = true;
        }
        config
            .classifier
            .extra_type_codes
            .extend(self.type_codes.iter().cloned());
        if let Some(date) = self.migration_date {
            config.posting.migration_date = Some(date);
        }
    }

    /// Delimiter as the single byte the CSV reader expects.
    pub fn delimiter_byte(&self) -> anyhow::Result<u8> {
        ascii_delimiter(self.delimiter)
    }
}

/// A CSV delimiter must be one ASCII byte.
pub fn ascii_delimiter(delimiter: char) -> anyhow::Result<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| anyhow::anyhow!("Delimiter must be an ASCII character: {:?}", delimiter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn options() -> SheetOptions {
        SheetOptions {
            sheet: 0,
            delimiter: ';',
            auto_detect: false,
            legacy_layout: false,
            type_codes: Vec::new(),
            migration_date: None,
        }
    }

    #[test]
    fn test_apply_overrides() {
        let mut config = SaldosConfig::default();
        let options = SheetOptions {
            legacy_layout: true,
            type_codes: vec!["FX".to_string()],
            migration_date: NaiveDate::from_ymd_opt(2026, 3, 31),
            ..options()
        };

        options.apply(&mut config);

        assert_eq!(config.layout, ColumnLayout::legacy_statement());
        assert_eq!(config.classifier.extra_type_codes, vec!["FX".to_string()]);
        assert_eq!(config.posting.migration_date, NaiveDate::from_ymd_opt(2026, 3, 31));
    }

    #[test]
    fn test_delimiter_byte() {
        assert_eq!(options().delimiter_byte().unwrap(), b';');
        let wide = SheetOptions {
            delimiter: '¦',
            ..options()
        };
        assert!(wide.delimiter_byte().is_err());
        assert!(ascii_delimiter('é').is_err());
        assert_eq!(ascii_delimiter('\t').unwrap(), b'\t');
    }
}
