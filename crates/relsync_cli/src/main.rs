//! relsync CLI
//!
//! Command-line tools that run the relsync engine over a SQLite file holding
//! the reference library tables.
//!
//! # Commands
//!
//! - `ddl` - Print the schema script
//! - `create` / `drop` / `purge` - Schema operations
//! - `seed` - Save the sample library
//! - `dump` - Load and print every table
//! - `count` - Print row counts

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// relsync command-line tools.
#[derive(Parser)]
#[command(name = "relsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(global = true, short, long)]
    db: Option<PathBuf>,

    /// JSON file with engine settings
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the CREATE script for the library tables
    Ddl,

    /// Create tables and indexes
    Create,

    /// Drop indexes and tables
    Drop,

    /// Delete every row
    Purge,

    /// Save the sample library
    Seed,

    /// Load the library and print it
    Dump {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the row count of every table
    Count,

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = commands::load_config(cli.config.as_deref())?;
    let db = || cli.db.clone().ok_or("Database path required (--db)");

    match cli.command {
        Commands::Ddl => commands::schema::ddl(config)?,
        Commands::Create => commands::schema::create(&db()?, config)?,
        Commands::Drop => commands::schema::drop(&db()?, config)?,
        Commands::Purge => commands::schema::purge(&db()?, config)?,
        Commands::Seed => commands::seed::run(&db()?, config)?,
        Commands::Dump { format } => commands::dump::run(&db()?, config, &format)?,
        Commands::Count => commands::count::run(&db()?, config)?,
        Commands::Version => {
            println!("relsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
