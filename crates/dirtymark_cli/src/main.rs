//! dirtymark CLI
//!
//! Command-line tools for inspecting and maintaining marker files.
//!
//! # Commands
//!
//! - `inspect` - Show the flags of a marker file without touching it
//! - `mark-dirty` / `mark-clean` - Force the dirty flag
//! - `schedule-rebuild` / `clear-rebuild` - Force the index-rebuild flag
//! - `reset` - Replace the marker with a fresh clean one

mod commands;

use clap::{Parser, Subcommand};
use commands::set::Transition;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// dirtymark marker file tools.
#[derive(Parser)]
#[command(name = "dirtymark")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the marker file
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
    /// Show marker flags without locking or upgrading the file
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Mark the storage dirty so recovery runs on next open
    MarkDirty,

    /// Mark the storage clean
    MarkClean,

    /// Schedule an index rebuild
    ScheduleRebuild,

    /// Clear a scheduled index rebuild
    ClearRebuild,

    /// Replace the marker with a fresh clean one
    Reset,

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
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let transition = match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Marker path required for inspect")?;
            return commands::inspect::run(&path, &format);
        }
        Commands::Version => {
            println!("dirtymark CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("dirtymark Core v{}", dirtymark_core::VERSION);
            return Ok(());
        }
        Commands::Reset => {
            let path = cli.path.ok_or("Marker path required for reset")?;
            return commands::set::reset(&path);
        }
        Commands::MarkDirty => Transition::MarkDirty,
        Commands::MarkClean => Transition::MarkClean,
        Commands::ScheduleRebuild => Transition::ScheduleRebuild,
        Commands::ClearRebuild => Transition::ClearRebuild,
    };

    let path = cli
        .path
        .ok_or_else(|| format!("Marker path required for {}", transition.name()))?;
    commands::set::run(&path, transition)
}
