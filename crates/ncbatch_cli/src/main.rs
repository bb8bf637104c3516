//! ncbatch CLI
//!
//! Offline tools for NETCONF configuration batches.
//!
//! # Commands
//!
//! - `inspect` - List or print the groups of a saved group listing
//! - `render` - Print the requests a batch file would send, in order
//! - `check-device` - Validate a device configuration file

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// ncbatch command-line tools.
#[derive(Parser)]
#[command(name = "ncbatch")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List or print the groups of a saved group listing
    Inspect {
        /// Saved reply to a group listing request
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Print this group as a configuration document
        #[arg(short, long)]
        group: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the requests a batch file would send, in order
    Render {
        /// JSON batch file with writes, deletes and replacements
        #[arg(short, long)]
        batch: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Validate a device configuration file
    CheckDevice {
        /// JSON device configuration
        #[arg(short, long)]
        config: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect {
            snapshot,
            group,
            format,
        } => {
            commands::inspect::run(&snapshot, group.as_deref(), &format)?;
        }
        Commands::Render { batch, format } => {
            commands::render::run(&batch, &format)?;
        }
        Commands::CheckDevice { config } => {
            commands::device::run(&config)?;
        }
        Commands::Version => {
            println!("ncbatch CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
