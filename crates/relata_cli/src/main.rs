//! Relata CLI
//!
//! Command-line tools around the Relata change-tracking engine.
//!
//! # Commands
//!
//! - `demo` - Run the order scenario against an in-memory store
//! - `inspect` - Display a saved store snapshot

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Relata command-line tools.
#[derive(Parser)]
#[command(name = "relata")]
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
    /// Run the order scenario against an in-memory store
    Demo {
        /// Number of orders to create
        #[arg(short, long, default_value = "3")]
        orders: usize,

        /// Number of items per order
        #[arg(short, long, default_value = "2")]
        items: usize,

        /// Save the resulting store snapshot to this file
        #[arg(short, long)]
        save: Option<PathBuf>,
    },

    /// Display a saved store snapshot
    Inspect {
        /// Path to the snapshot file
        path: PathBuf,

        /// List every record
        #[arg(short, long)]
        records: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

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

    match cli.command {
        Commands::Demo {
            orders,
            items,
            save,
        } => {
            commands::demo::run(orders, items, save.as_deref())?;
        }
        Commands::Inspect {
            path,
            records,
            format,
        } => {
            commands::inspect::run(&path, records, &format)?;
        }
        Commands::Version => {
            println!("Relata CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
