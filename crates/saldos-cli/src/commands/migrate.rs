//! Migrate command - load exports into a file-backed ledger.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use saldos_core::{BalanceExtractor, InMemoryDestination, MigrationSummary, Migrator};

use super::SheetOptions;
use crate::sheet::{is_supported, load_config, load_grid};

/// Arguments for the migrate command.
#[derive(Args)]
pub struct MigrateArgs {
    /// Input files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Ledger file (JSON) holding customers and postings; created if missing
    #[arg(short, long)]
    ledger: PathBuf,

    /// Show what would be created without touching the ledger
    #[arg(long)]
    dry_run: bool,

    /// Post entries right after creating them
    #[arg(long)]
    auto_post: bool,

    /// Receivable account code
    #[arg(long)]
    receivable_account: Option<String>,

    /// Counterpart (opening balance) account code
    #[arg(long)]
    counterpart_account: Option<String>,

    /// Journal code
    #[arg(long)]
    journal: Option<String>,

    /// Write the migration summary as JSON to this file
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Stop at the first file that cannot be read
    #[arg(long)]
    fail_fast: bool,

    #[command(flatten)]
    sheet: SheetOptions,
}

pub fn run(args: MigrateArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.sheet.apply(&mut config);
    if args.auto_post {
        config.posting.auto_post = true;
    }
    if let Some(account) = &args.receivable_account {
        config.posting.receivable_account = account.clone();
    }
    if let Some(account) = &args.counterpart_account {
        config.posting.counterpart_account = account.clone();
    }
    if let Some(journal) = &args.journal {
        config.posting.journal = journal.clone();
    }

    let files = expand_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for: {}", args.inputs.join(", "));
    }

    println!(
        "{} Found {} files to migrate{}",
        style("ℹ").blue(),
        files.len(),
        if args.dry_run { " (dry run)" } else { "" }
    );

    let ledger = load_ledger(&args.ledger)?;
    let prefix = config.posting.reference_prefix.clone();
    let extractor = BalanceExtractor::new(config);
    let mut migrator = Migrator::new(ledger, prefix).with_dry_run(args.dry_run);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}")?
            .progress_chars("=>-"),
    );

    let delimiter = args.sheet.delimiter_byte()?;
    let mut summary = MigrationSummary {
        dry_run: args.dry_run,
        ..Default::default()
    };
    let mut failed: Vec<(PathBuf, String)> = Vec::new();
    let mut rejected_rows = 0;

    for path in &files {
        pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );

        let extraction = match load_grid(path, args.sheet.sheet, delimiter)
            .and_then(|grid| Ok(extractor.extract(&grid)?))
        {
            Ok(extraction) => extraction,
            Err(e) if !args.fail_fast => {
                warn!("Failed to read {}: {}", path.display(), e);
                failed.push((path.clone(), e.to_string()));
                pb.inc(1);
                continue;
            }
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return Err(e.context(format!("Migration stopped at {}", path.display())));
            }
        };

        let report = &extraction.report;
        rejected_rows += report.documents_rejected + report.unrecognized_rows;
        info!(
            file = %path.display(),
            accepted = report.documents_accepted,
            rejected = report.documents_rejected,
            "extracted"
        );

        summary.merge(migrator.migrate(&extraction.documents)?);
        pb.inc(1);
    }

    pb.finish_with_message("Complete");

    if !args.dry_run {
        save_ledger(&args.ledger, migrator.destination())?;
        debug!("Ledger written to {}", args.ledger.display());
    }

    if let Some(path) = &args.summary {
        fs::write(path, serde_json::to_string_pretty(&summary)?)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            path.display()
        );
    }

    print_summary(&summary, rejected_rows, start.elapsed());

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for (path, error) in &failed {
            println!("  - {}: {}", path.display(), error);
        }
    }

    if !summary.errors.is_empty() {
        println!();
        println!("{}", style("Errors:").red());
        for error in &summary.errors {
            println!("  - {}", error);
        }
    }

    Ok(())
}

fn expand_inputs(patterns: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let literal = Path::new(pattern);
        if literal.is_file() {
            files.push(literal.to_path_buf());
            continue;
        }
        let matches: Vec<PathBuf> = glob(pattern)?
            .filter_map(|r| r.ok())
            .filter(|p| is_supported(p))
            .collect();
        if matches.is_empty() {
            warn!("Pattern matched no supported files: {}", pattern);
        }
        files.extend(matches);
    }
    files.sort();
    files.dedup();
    Ok(files)
}

pub(crate) fn load_ledger(path: &Path) -> anyhow::Result<InMemoryDestination> {
    if !path.exists() {
        info!("Ledger {} not found, starting empty", path.display());
        return Ok(InMemoryDestination::new());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read ledger {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Ledger {} is not valid JSON", path.display()))
}

pub(crate) fn save_ledger(path: &Path, ledger: &InMemoryDestination) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(ledger)?)?;
    Ok(())
}

fn print_summary(summary: &MigrationSummary, rejected_rows: usize, elapsed: std::time::Duration) {
    println!();
    println!(
        "{} {} in {:?}",
        style("✓").green(),
        if summary.dry_run { "Dry run finished" } else { "Migration finished" },
        elapsed
    );
    println!(
        "   postings: {} created, {} already migrated",
        style(summary.postings_created).green(),
        style(summary.postings_skipped).yellow()
    );
    println!(
        "   customers: {} found, {} created",
        summary.customers_found,
        style(summary.customers_created).green()
    );
    println!("   total migrated: {}", summary.total_migrated);
    if rejected_rows > 0 {
        println!(
            "   {} rows rejected during extraction (run 'saldos extract -f text' for details)",
            style(rejected_rows).red()
        );
    }
}
