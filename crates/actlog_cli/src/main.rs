//! actlog CLI
//!
//! Command-line tools for inspecting and approving logged actions.
//!
//! # Commands
//!
//! - `entries` - List logged actions
//! - `show` - Display one action
//! - `decide` - Approve or deny an action
//! - `watermark` - Display a watcher's persisted mark

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// actlog command-line tools.
#[derive(Parser)]
#[command(name = "actlog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
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
    /// List logged actions in key order
    Entries {
        /// Only list actions of this kind
        #[arg(short, long)]
        kind: Option<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display one action
    Show {
        /// Action kind
        #[arg(short, long)]
        kind: String,

        /// Key parts, encoded as a tuple of strings
        #[arg(required = true)]
        key: Vec<String>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Approve or deny an action
    Decide {
        /// Action kind
        #[arg(short, long)]
        kind: String,

        /// Name recorded with the decision
        #[arg(short, long)]
        name: String,

        /// Approve the action
        #[arg(long, conflicts_with = "deny", required_unless_present = "deny")]
        approve: bool,

        /// Deny the action
        #[arg(long)]
        deny: bool,

        /// Key parts, encoded as a tuple of strings
        #[arg(required = true)]
        key: Vec<String>,
    },

    /// Display a watcher's persisted mark
    Watermark {
        /// Watched kind
        #[arg(short, long)]
        kind: String,

        /// Watcher name
        #[arg(short, long)]
        name: String,
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
        Commands::Entries { kind, format } => {
            let path = cli.path.ok_or("Store path required for entries")?;
            commands::entries::run(&path, kind.as_deref(), &format)?;
        }
        Commands::Show { kind, key, format } => {
            let path = cli.path.ok_or("Store path required for show")?;
            commands::show::run(&path, &kind, &key, &format)?;
        }
        Commands::Decide {
            kind,
            name,
            approve,
            deny: _,
            key,
        } => {
            let path = cli.path.ok_or("Store path required for decide")?;
            commands::decide::run(&path, &kind, &key, &name, approve)?;
        }
        Commands::Watermark { kind, name } => {
            let path = cli.path.ok_or("Store path required for watermark")?;
            commands::watermark::run(&path, &kind, &name)?;
        }
        Commands::Version => {
            println!("actlog CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("actlog Core v{}", actlog_core::VERSION);
        }
    }

    Ok(())
}
