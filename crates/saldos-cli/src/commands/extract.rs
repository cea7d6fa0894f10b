//! Extract command - documents, postings and report from a single export.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use saldos_core::report::ExtractionReport;
use saldos_core::{BalanceExtractor, Extraction};

use super::SheetOptions;
use crate::sheet::{load_config, load_grid};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (xlsx, xls, ods or csv)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Exit with an error when any row was rejected or warned about
    #[arg(long)]
    strict: bool,

    #[command(flatten)]
    sheet: SheetOptions,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// Documents, postings and report as JSON
    Json,
    /// One line per document
    Csv,
    /// Plain text report
    Text,
}

pub fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.sheet.apply(&mut config);

    info!("Extracting from {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );

    pb.set_message("Reading sheet...");
    let grid = load_grid(&args.input, args.sheet.sheet, args.sheet.delimiter_byte()?)?;

    pb.set_message(format!("Classifying {} rows...", grid.len()));
    let extractor = BalanceExtractor::new(config);
    let extraction = extractor.extract(&grid)?;

    pb.finish_and_clear();

    let output = format_extraction(&extraction, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
        print_brief(&extraction.report);
    } else {
        println!("{}", output);
    }

    debug!("Total extraction time: {:?}", start.elapsed());

    if args.strict && extraction.report.has_issues() {
        anyhow::bail!(
            "Extraction reported issues: {} rejected, {} unrecognized, {} duplicates, {} warnings",
            extraction.report.documents_rejected,
            extraction.report.unrecognized_rows,
            extraction.report.duplicates_suppressed,
            extraction.report.warnings.len()
        );
    }

    Ok(())
}

fn print_brief(report: &ExtractionReport) {
    println!(
        "{} {} documents accepted, {} rejected, total pending {}",
        style("ℹ").blue(),
        style(report.documents_accepted).green(),
        style(report.documents_rejected + report.unrecognized_rows).red(),
        report.total_pending
    );
}

fn format_extraction(extraction: &Extraction, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(extraction)?),
        OutputFormat::Csv => format_csv(extraction),
        OutputFormat::Text => Ok(format_text(&extraction.report)),
    }
}

fn format_csv(extraction: &Extraction) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "row",
        "fingerprint",
        "branch",
        "customer_code",
        "customer",
        "document",
        "issue_date",
        "due_date",
        "pending_amount",
        "posting_date",
        "receivable_account",
        "counterpart_account",
        "reference",
    ])?;

    for item in &extraction.documents {
        let doc = &item.document;
        let posting = &item.posting;
        wtr.write_record([
            doc.row_number().to_string(),
            item.fingerprint.to_string(),
            doc.branch_name().to_string(),
            doc.customer.code.clone().unwrap_or_default(),
            doc.customer.display_name(),
            doc.document_reference(),
            doc.issue_date.map(|d| d.to_string()).unwrap_or_default(),
            doc.due_date.map(|d| d.to_string()).unwrap_or_default(),
            posting.amount().to_string(),
            posting.date.map(|d| d.to_string()).unwrap_or_default(),
            posting.receivable.account.clone(),
            posting.counterpart.account.clone(),
            posting.reference.clone(),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(report: &ExtractionReport) -> String {
    let mut output = String::new();

    output.push_str("Extraction report\n");
    if let Some(company) = &report.metadata.company_name {
        output.push_str(&format!("Company: {}\n", company));
    }
    if let Some(date) = report.metadata.report_date {
        output.push_str(&format!("Report date: {}\n", date));
    }
    if let Some(date) = report.migration_date {
        output.push_str(&format!("Migration date: {}\n", date));
    }
    if let Some(row) = report.layout_row {
        output.push_str(&format!("Caption row: {}\n", row + 1));
    }
    output.push('\n');

    output.push_str(&format!("Rows: {}\n", report.total_rows));
    for (kind, count) in &report.rows_by_kind {
        output.push_str(&format!("  {:<16} {}\n", kind.label(), count));
    }
    output.push('\n');

    output.push_str(&format!("Accepted:   {}\n", report.documents_accepted));
    output.push_str(&format!("Rejected:   {}\n", report.documents_rejected));
    output.push_str(&format!("Unrecognized: {}\n", report.unrecognized_rows));
    output.push_str(&format!("Duplicates: {}\n", report.duplicates_suppressed));
    output.push_str(&format!("Total pending: {}\n", report.total_pending));
    output.push_str(&format!(
        "Branches: {}  Customers: {}\n",
        report.branches.len(),
        report.customers.len()
    ));

    if !report.rejections_by_reason.is_empty() {
        output.push_str("\nRejections:\n");
        for (reason, count) in &report.rejections_by_reason {
            output.push_str(&format!("  {}: {}\n", reason, count));
        }
    }

    if !report.accepted_sample.is_empty() {
        output.push_str("\nSample documents:\n");
        for sample in &report.accepted_sample {
            output.push_str(&format!(
                "  row {:>5}  {}  {}  {}  {}\n",
                sample.row,
                sample.fingerprint,
                sample.customer,
                sample.document,
                sample.pending_amount
            ));
        }
    }

    if !report.rejected_sample.is_empty() {
        output.push_str("\nSample rejections:\n");
        for sample in &report.rejected_sample {
            output.push_str(&format!(
                "  row {:>5}  {}  [{}]\n",
                sample.row, sample.reason, sample.preview
            ));
        }
    }

    if !report.warnings.is_empty() {
        output.push_str("\nWarnings:\n");
        for warning in &report.warnings {
            output.push_str(&format!("  - {}\n", warning));
        }
    }

    output
}
