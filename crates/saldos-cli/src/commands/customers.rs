//! Customers command - extract the legacy customer master listing.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use saldos_core::{CustomerExtraction, CustomerMasterParser};

use super::ascii_delimiter;
use super::migrate::{load_ledger, save_ledger};
use crate::sheet::{load_config, load_grid};

/// Arguments for the customers command.
#[derive(Args)]
pub struct CustomersArgs {
    /// Customer listing (xlsx, xls, ods or csv)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: CustomerFormat,

    /// Import the customers into this ledger file
    #[arg(short, long)]
    ledger: Option<PathBuf>,

    /// Fill contact fields of customers already in the ledger
    #[arg(long, requires = "ledger")]
    update_existing: bool,

    /// Zero-based worksheet index (workbooks only)
    #[arg(long, default_value_t = 0)]
    sheet: usize,

    /// Field delimiter (CSV only)
    #[arg(long, default_value_t = ',')]
    delimiter: char,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum CustomerFormat {
    /// Records, rejections and warnings as JSON
    Json,
    /// One line per customer
    Csv,
}

pub fn run(args: CustomersArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let update_existing = args.update_existing || config.customers.update_existing;
    let delimiter = ascii_delimiter(args.delimiter)?;
    let grid = load_grid(&args.input, args.sheet, delimiter)?;

    let extraction = CustomerMasterParser::new().parse(&grid)?;
    info!(
        header_row = extraction.header_row,
        customers = extraction.customers.len(),
        rejected = extraction.rejected.len(),
        "customer listing parsed"
    );

    if let Some(ledger_path) = &args.ledger {
        let mut ledger = load_ledger(ledger_path)?;
        let outcome = ledger.import_customers(&extraction.customers, update_existing);
        save_ledger(ledger_path, &ledger)?;
        eprintln!(
            "{} Imported {} customers into {} ({} updated, {} skipped)",
            style("✓").green(),
            outcome.created,
            ledger_path.display(),
            outcome.updated,
            outcome.skipped
        );
    }

    let output = match args.format {
        CustomerFormat::Json => serde_json::to_string_pretty(&extraction)?,
        CustomerFormat::Csv => format_csv(&extraction)?,
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} {} customers written to {}",
            style("✓").green(),
            extraction.customers.len(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    for rejected in &extraction.rejected {
        eprintln!(
            "{} row {}: customer {} skipped, {}",
            style("!").yellow(),
            rejected.row_number,
            rejected.code,
            rejected.reason
        );
    }
    for warning in &extraction.warnings {
        eprintln!("{} {}", style("!").yellow(), warning);
    }

    Ok(())
}

fn format_csv(extraction: &CustomerExtraction) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "row", "code", "name", "street", "city", "zip", "phone", "tax_id", "tax_category", "email",
    ])?;

    for customer in &extraction.customers {
        let field = |value: &Option<String>| value.clone().unwrap_or_default();
        wtr.write_record([
            customer.row_number.to_string(),
            customer.code.clone(),
            customer.name.clone(),
            field(&customer.street),
            field(&customer.city),
            field(&customer.zip),
            field(&customer.phone),
            field(&customer.tax_id),
            field(&customer.tax_category),
            field(&customer.email),
        ])?;
    }

    Ok(String::from_utf8(wtr.into_inner()?)?)
}
