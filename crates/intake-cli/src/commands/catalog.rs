//! Catalog command - list and maintain catalog entries and the movement ledger.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Subcommand};
use console::style;
use rust_decimal::Decimal;

use intake_core::{CatalogEntry, Stores};

use super::load_config;

/// Arguments for the catalog command.
#[derive(Args)]
pub struct CatalogArgs {
    /// Data directory (overrides store.data_dir)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: CatalogCommand,
}

#[derive(Subcommand)]
enum CatalogCommand {
    /// List catalog entries with quantities on hand
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Add or replace a catalog entry
    Add(AddArgs),

    /// List posted stock movements
    Movements {
        /// Print CSV instead of a table
        #[arg(long)]
        csv: bool,
    },
}

#[derive(Args)]
struct AddArgs {
    /// Entry identifier
    id: String,

    /// Display name, matched against invoice descriptions
    name: String,

    /// Unit of measure
    #[arg(short, long, default_value = "pz")]
    unit: String,

    /// Quantity on hand
    #[arg(short, long, default_value = "0")]
    quantity: String,

    /// Supplier article code as SUPPLIER=CODE (repeatable)
    #[arg(long = "code")]
    codes: Vec<String>,
}

pub async fn run(args: CatalogArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(data_dir) = args.data_dir {
        config.store.data_dir = data_dir;
    }
    let stores = Stores::json(&config.store.data_dir);

    match args.command {
        CatalogCommand::List { json } => list(&stores, json).await,
        CatalogCommand::Add(add_args) => add(&stores, add_args).await,
        CatalogCommand::Movements { csv } => movements(&stores, csv).await,
    }
}

async fn list(stores: &Stores, json: bool) -> anyhow::Result<()> {
    let entries = stores.catalog.entries().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{} Catalog is empty.", style("ℹ").blue());
        return Ok(());
    }

    println!("{:<20} {:<32} {:>12} {:<6} {}", "ID", "NAME", "ON HAND", "UNIT", "CODES");
    for entry in &entries {
        let codes: Vec<String> = entry
            .supplier_codes
            .iter()
            .map(|c| format!("{}={}", c.supplier, c.code))
            .collect();
        println!(
            "{:<20} {:<32} {:>12} {:<6} {}",
            entry.id,
            entry.name,
            entry.quantity_on_hand.normalize(),
            entry.unit,
            codes.join(", ")
        );
    }

    Ok(())
}

async fn add(stores: &Stores, args: AddArgs) -> anyhow::Result<()> {
    let quantity = Decimal::from_str(&args.quantity)
        .map_err(|e| anyhow::anyhow!("Invalid quantity {:?}: {}", args.quantity, e))?;
    if quantity.is_sign_negative() && !quantity.is_zero() {
        anyhow::bail!("Quantity on hand must not be negative");
    }

    let mut entry = CatalogEntry::new(&args.id, &args.name, &args.unit).with_quantity(quantity);
    for pair in &args.codes {
        let (supplier, code) = pair
            .split_once('=')
            .filter(|(s, c)| !s.trim().is_empty() && !c.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("Expected SUPPLIER=CODE, got {:?}", pair))?;
        entry = entry.with_supplier_code(supplier.trim(), code.trim());
    }

    stores.catalog.upsert(entry).await?;
    println!("{} Saved catalog entry {}", style("✓").green(), args.id);

    Ok(())
}

async fn movements(stores: &Stores, csv: bool) -> anyhow::Result<()> {
    let movements = stores.ledger.movements().await?;

    if csv {
        let mut wtr = csv::Writer::from_writer(std::io::stdout());
        wtr.write_record([
            "id",
            "catalog_entry_id",
            "quantity",
            "unit",
            "unit_price",
            "total_value",
            "supplier_name",
            "invoice_number",
            "invoice_date",
            "source_file",
            "created_at",
        ])?;
        for m in &movements {
            wtr.write_record([
                m.id.to_string(),
                m.catalog_entry_id.clone(),
                m.quantity.to_string(),
                m.unit.clone(),
                m.unit_price.to_string(),
                m.total_value.to_string(),
                m.supplier_name.clone(),
                m.invoice_number.clone(),
                m.invoice_date.to_string(),
                m.source_file.clone(),
                m.created_at.to_rfc3339(),
            ])?;
        }
        wtr.flush()?;
        return Ok(());
    }

    if movements.is_empty() {
        println!("{} No stock movements recorded.", style("ℹ").blue());
        return Ok(());
    }

    for m in &movements {
        println!(
            "#{:<5} {} {:>10} {:<4} -> {:<20} {} / {}",
            m.id,
            m.invoice_date,
            m.quantity.normalize(),
            m.unit,
            m.catalog_entry_id,
            m.supplier_name,
            m.invoice_number
        );
    }

    Ok(())
}
