//! chronowal CLI
//!
//! Command-line tools for inspecting and maintaining chronowal WAL
//! directories.
//!
//! # Commands
//!
//! - `segments` - List the segments of a WAL directory
//! - `dump` - Print the records of a WAL
//! - `verify` - Replay a WAL and report corruption
//! - `repair` - Cut a corrupted WAL back to its readable prefix
//! - `truncate` - Delete segments below an index

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// chronowal write-ahead log tools.
#[derive(Parser)]
#[command(name = "chronowal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the WAL directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List segments with their sizes
    Segments,

    /// Print every record with its offset, length and checksum
    Dump {
        /// Maximum number of records to print
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Replay the WAL and report the first corruption
    Verify,

    /// Remove everything from the first corruption onwards
    Repair,

    /// Delete segments below an index
    Truncate {
        /// Lowest segment index to keep
        #[arg(short, long)]
        before: u64,
    },

    /// Show version information
    Version,
}

/// Output format for commands that print records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human readable lines
    Text,
    /// Pretty-printed JSON
    Json,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Segments => {
            let path = cli.path.ok_or("WAL path required for segments")?;
            commands::segments::run(&path)?;
        }
        Commands::Dump { limit, format } => {
            let path = cli.path.ok_or("WAL path required for dump")?;
            commands::dump::run(&path, limit, format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("WAL path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Repair => {
            let path = cli.path.ok_or("WAL path required for repair")?;
            commands::repair::run(&path)?;
        }
        Commands::Truncate { before } => {
            let path = cli.path.ok_or("WAL path required for truncate")?;
            commands::truncate::run(&path, before)?;
        }
        Commands::Version => {
            println!("chronowal CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
