//! CLI application for supplier invoice intake.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use commands::{catalog, config, process, unmatched, watch};

/// Supplier invoice intake - Reconcile incoming invoices against the stock catalog
#[derive(Parser)]
#[command(name = "intake")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch the inbox folder and reconcile arriving invoices
    Watch(watch::WatchArgs),

    /// Reconcile invoice files once
    Process(process::ProcessArgs),

    /// Inspect and maintain the stock catalog
    Catalog(catalog::CatalogArgs),

    /// Inspect lines waiting for manual review
    Unmatched(unmatched::UnmatchedArgs),

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up logging based on verbosity, RUST_LOG wins when set
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Execute command
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Watch(args) => watch::run(args, config_path).await,
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Catalog(args) => catalog::run(args, config_path).await,
        Commands::Unmatched(args) => unmatched::run(args, config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
