//! Unmatched command - inspect invoice lines waiting for manual review.

use std::path::PathBuf;

use clap::{Args, Subcommand};
use console::style;

use intake_core::{Stores, UnmatchedItem, UnmatchedStatus};

use super::load_config;

/// Arguments for the unmatched command.
#[derive(Args)]
pub struct UnmatchedArgs {
    /// Data directory (overrides store.data_dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: UnmatchedCommand,
}

#[derive(Subcommand)]
enum UnmatchedCommand {
    /// List unmatched lines
    List {
        /// Print CSV instead of a table
        #[arg(long)]
        csv: bool,

        /// Include resolved and ignored items
        #[arg(long)]
        all: bool,
    },
}

pub async fn run(args: UnmatchedArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(data_dir) = args.data_dir {
        config.store.data_dir = data_dir;
    }
    let stores = Stores::json(&config.store.data_dir);

    match args.command {
        UnmatchedCommand::List { csv, all } => {
            let items: Vec<UnmatchedItem> = stores
                .unmatched
                .items()
                .await?
                .into_iter()
                .filter(|item| all || item.status == UnmatchedStatus::Pending)
                .collect();

            if csv {
                write_csv(&items)
            } else {
                print_table(&items);
                Ok(())
            }
        }
    }
}

fn print_table(items: &[UnmatchedItem]) {
    if items.is_empty() {
        println!("{} Nothing waiting for review.", style("✓").green());
        return;
    }

    println!(
        "{:<5} {:<9} {:<40} {:>8} {:<12} {}",
        "ID", "STATUS", "DESCRIPTION", "QTY", "CODE", "INVOICE"
    );
    for item in items {
        println!(
            "{:<5} {:<9} {:<40} {:>8} {:<12} {} / {} ({})",
            item.id,
            item.status.as_str(),
            item.description,
            item.quantity.normalize(),
            item.supplier_code.as_deref().unwrap_or("-"),
            item.supplier_name,
            item.invoice_number,
            item.invoice_date
        );
    }
    println!();
    println!("   {} items", style(items.len()).yellow());
}

fn write_csv(items: &[UnmatchedItem]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());

    wtr.write_record([
        "id",
        "status",
        "description",
        "supplier_code",
        "quantity",
        "supplier_name",
        "invoice_number",
        "invoice_date",
        "source_file",
        "detected_at",
    ])?;

    for item in items {
        wtr.write_record([
            item.id.to_string(),
            item.status.as_str().to_string(),
            item.description.clone(),
            item.supplier_code.clone().unwrap_or_default(),
            item.quantity.to_string(),
            item.supplier_name.clone(),
            item.invoice_number.clone(),
            item.invoice_date.to_string(),
            item.source_file.clone(),
            item.detected_at.to_rfc3339(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
