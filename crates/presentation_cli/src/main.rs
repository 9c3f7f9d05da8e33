//! tenantctl
//!
//! Administration of the tenant store: migrations, lock and counter
//! inspection, and the table whitelist.

#![allow(clippy::print_stdout)]

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use infrastructure::{AppConfig, TelemetryAppConfig, init_tracing};

/// Tenant store administration
#[derive(Debug, Parser)]
#[command(name = "tenantctl")]
#[command(author, version, about = "Tenant store administration", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: ./config.toml if present)
    #[arg(short, long, env = "TENANCY_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Delete expired resource locks
    SweepLocks,

    /// Show who holds a resource lock
    LockStatus {
        /// Lock name
        name: String,
    },

    /// Read or increment a tenant counter
    ///
    /// Example: tenantctl counter acme seq:receipt --increment
    Counter {
        /// Tenant id
        tenant: String,

        /// Counter name
        name: String,

        /// Increment before printing
        #[arg(long)]
        increment: bool,
    },

    /// List whitelisted tables and their field mappings
    Tables,
}

/// Determine log filter level from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    init_tracing(&TelemetryAppConfig {
        log_filter: log_filter_from_verbosity(cli.verbose).to_string(),
        ..config.telemetry.clone()
    })?;
    tracing::debug!(
        environment = %config.environment,
        production = config.is_production(),
        "Configuration loaded"
    );

    let output = match cli.command {
        Commands::Migrate => commands::migrate(&config).await?,
        Commands::SweepLocks => commands::sweep_locks(&config).await?,
        Commands::LockStatus { name } => commands::lock_status(&config, &name).await?,
        Commands::Counter {
            tenant,
            name,
            increment,
        } => commands::counter(&config, &tenant, &name, increment).await?,
        Commands::Tables => commands::tables(&config),
    };

    println!("{output}");
    Ok(())
}
