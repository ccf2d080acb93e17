//! Process command - reconcile invoice files once, without watching.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::debug;

use intake_core::{notifier, FileOutcome, IngestionService, ProcessingReport, Stores};

use super::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Data directory (overrides store.data_dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Also write a summary CSV to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Plain text summary
    Text,
}

/// Result of processing a single file.
#[derive(Serialize)]
struct FileResult {
    file: String,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<ProcessingReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl FileResult {
    fn new(path: &Path, outcome: FileOutcome) -> Self {
        let file = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let (status, report, error) = match outcome {
            FileOutcome::Reconciled(report) => ("reconciled", Some(report), None),
            FileOutcome::Duplicate {
                supplier_name,
                invoice_number,
            } => (
                "duplicate",
                None,
                Some(format!(
                    "invoice {} from {} already processed",
                    invoice_number, supplier_name
                )),
            ),
            FileOutcome::Rejected(e) => ("rejected", None, Some(e.to_string())),
            FileOutcome::Unreadable(e) => ("unreadable", None, Some(e.to_string())),
        };

        Self {
            file,
            status,
            report,
            error,
        }
    }

    fn failed(&self) -> bool {
        matches!(self.status, "rejected" | "unreadable")
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(data_dir) = args.data_dir {
        config.store.data_dir = data_dir;
    }

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file() && config.watch.accepts(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    let stores = Stores::json(&config.store.data_dir);
    let notifier = notifier::from_config(&config.notifier)?;
    let service = Arc::new(IngestionService::new(&config, stores, notifier));

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());
    for path in &files {
        debug!("Processing {}", path.display());
        let outcome = service.process_file(path).await;
        results.push(FileResult::new(path, outcome));
        pb.inc(1);
    }
    pb.finish_and_clear();

    if let Some(summary_path) = &args.summary {
        write_summary(summary_path, &results)?;
    }

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        OutputFormat::Text => print_text(&results),
    }

    if let Some(summary_path) = &args.summary {
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }
    debug!("Processed {} files in {:?}", results.len(), start.elapsed());

    let failed = results.iter().filter(|r| r.failed()).count();
    if failed > 0 {
        anyhow::bail!("{} of {} files could not be reconciled", failed, results.len());
    }
    Ok(())
}

fn print_text(results: &[FileResult]) {
    for result in results {
        match (&result.report, &result.error) {
            (Some(report), _) => println!(
                "{} {}: invoice {} from {}, {} lines: {} matched, {} unmatched, {} errors",
                style("✓").green(),
                result.file,
                report.invoice_number,
                report.supplier_name,
                report.total_lines,
                style(report.matched_count).green(),
                style(report.unmatched_count).yellow(),
                style(report.error_count).red()
            ),
            (None, Some(error)) if !result.failed() => {
                println!("{} {}: {}", style("•").yellow(), result.file, error)
            }
            (None, error) => println!(
                "{} {}: {}: {}",
                style("✗").red(),
                result.file,
                result.status,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    let stats = results.iter().fold((0, 0, 0), |(ok, dup, failed), r| match r.status {
        "reconciled" => (ok + 1, dup, failed),
        "duplicate" => (ok, dup + 1, failed),
        _ => (ok, dup, failed + 1),
    });
    println!();
    println!(
        "   {} reconciled, {} duplicates, {} failed",
        style(stats.0).green(),
        style(stats.1).yellow(),
        style(stats.2).red()
    );
}

fn write_summary(path: &Path, results: &[FileResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "supplier_name",
        "invoice_number",
        "invoice_date",
        "total_lines",
        "matched",
        "unmatched",
        "errors",
        "error",
    ])?;

    for result in results {
        if let Some(report) = &result.report {
            wtr.write_record([
                result.file.as_str(),
                result.status,
                &report.supplier_name,
                &report.invoice_number,
                &report.invoice_date.to_string(),
                &report.total_lines.to_string(),
                &report.matched_count.to_string(),
                &report.unmatched_count.to_string(),
                &report.error_count.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                result.file.as_str(),
                result.status,
                "",
                "",
                "",
                "",
                "",
                "",
                "",
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
