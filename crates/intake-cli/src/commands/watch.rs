//! Watch command - run the ingestion service until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use console::style;
use tracing::info;

use intake_core::{notifier, IngestionService, IngestionStats, Stores};

use super::load_config;

/// Arguments for the watch command.
#[derive(Args)]
pub struct WatchArgs {
    /// Inbox folder (overrides watch.inbox_dir)
    #[arg(short, long)]
    dir: Option<PathBuf>,

    /// Data directory (overrides store.data_dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

pub async fn run(args: WatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(dir) = args.dir {
        config.watch.inbox_dir = dir;
    }
    if let Some(data_dir) = args.data_dir {
        config.store.data_dir = data_dir;
    }

    let stores = Stores::json(&config.store.data_dir);
    let notifier = notifier::from_config(&config.notifier)?;
    let service = Arc::new(IngestionService::new(&config, stores, notifier));

    service.start()?;
    println!(
        "{} Watching {} (data in {}). Press Ctrl-C to stop.",
        style("ℹ").blue(),
        config.watch.inbox_dir.display(),
        config.store.data_dir.display()
    );

    tokio::signal::ctrl_c().await?;
    info!("Interrupted, finishing current document");
    service.stop().await;

    print_stats(&service.stats());
    Ok(())
}

fn print_stats(stats: &IngestionStats) {
    println!();
    println!("{} Ingestion stopped", style("✓").green());
    println!("   Documents processed: {}", stats.documents_processed);
    println!("   Lines matched:       {}", style(stats.items_matched).green());
    println!("   Lines unmatched:     {}", style(stats.items_unmatched).yellow());
    println!("   Errors:              {}", style(stats.errors).red());
    if let Some(at) = stats.last_processed_at {
        println!("   Last document at:    {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}
