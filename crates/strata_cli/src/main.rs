//! StrataDB CLI
//!
//! Offline maintenance tools for StrataDB tables.
//!
//! # Commands
//!
//! - `upgrade` - Rewrite a table's segments to a target format version
//! - `list` - Show a table's segments and their format versions
//! - `version` - Show version information
//!
//! The process exits 0 on full success, including runs where individual
//! segments failed but were isolated, and 1 when a precondition (bad target
//! version, unknown table, unreadable directory) fails before any segment
//! is touched.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// StrataDB offline maintenance tools.
#[derive(Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a table's segments to a target format version
    Upgrade {
        /// Keyspace the table belongs to
        keyspace: String,

        /// Table name
        table: String,

        /// Target format version tag (e.g. "ma")
        target: String,

        /// Keep the original segment files alongside the rewritten ones
        #[arg(short, long)]
        keep_source: bool,

        /// Upgrade the named snapshot instead of the live segments
        #[arg(short, long)]
        snapshot: Option<String>,

        /// Bound on the shutdown compaction drain, in seconds
        #[arg(long, default_value = "300")]
        drain_timeout_secs: u64,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show a table's segments and their format versions
    List {
        /// Keyspace the table belongs to
        keyspace: String,

        /// Table name
        table: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Upgrade {
            keyspace,
            table,
            target,
            keep_source,
            snapshot,
            drain_timeout_secs,
            format,
        } => {
            let data_dir = cli.data_dir.ok_or("Data directory required for upgrade")?;
            commands::upgrade::run(commands::upgrade::UpgradeArgs {
                data_dir,
                keyspace,
                table,
                target,
                keep_source,
                snapshot,
                drain_timeout_secs,
                verbose: cli.verbose,
                format,
            })
        }
        Commands::List {
            keyspace,
            table,
            format,
        } => {
            let data_dir = cli.data_dir.ok_or("Data directory required for list")?;
            commands::list::run(&data_dir, &keyspace, &table, &format)
        }
        Commands::Version => {
            println!("StrataDB CLI v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
