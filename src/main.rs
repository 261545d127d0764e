//! Binary entry point for feedweave.
//!
//! Inspection and maintenance commands over a device's feed database.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow unnecessary_wraps for consistent command function signatures
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand, ValueEnum};
use feedweave::observability::{self, InitOptions};
use feedweave::storage::cursor::DEFAULT_SLOT;
use feedweave::storage::{CursorStore, InteractionLog, SqliteCursorStore, SqliteInteractionLog};
use feedweave::{ContentId, CursorCodec, FeedConfig, InteractionKind};
use std::path::Path;
use std::process::ExitCode;

/// Feedweave - composite feed paging engine.
#[derive(Parser)]
#[command(name = "feedweave")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "FEEDWEAVE_CONFIG_PATH")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Show the persisted resumption cursor.
    Cursor,

    /// Show which composite sources serve a global index.
    Eligible {
        /// Global item index.
        #[arg(short, long)]
        index: u64,

        /// Requested page size (defaults to the configured page size).
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Clear the persisted cursor so the next session starts fresh.
    Reset,

    /// Show interaction log statistics.
    Stats,

    /// Record an interaction on a surfaced item.
    Record {
        /// Content id.
        id: String,

        /// Interaction kind.
        #[arg(short, long, value_enum, default_value = "viewed")]
        kind: KindArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Viewed,
    Saved,
    Shared,
}

impl From<KindArg> for InteractionKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Viewed => Self::Viewed,
            KindArg::Saved => Self::Saved,
            KindArg::Shared => Self::Shared,
        }
    }
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    let _observability = match observability::init_from_env(InitOptions {
        verbose: cli.verbose,
        metrics_expose: false,
    }) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to initialize observability: {e}");
            return ExitCode::FAILURE;
        },
    };

    match run_command(cli.command, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: &FeedConfig) -> feedweave::Result<()> {
    match command {
        Commands::Cursor => cmd_cursor(config),
        Commands::Eligible { index, limit } => cmd_eligible(config, index, limit),
        Commands::Reset => cmd_reset(config),
        Commands::Stats => cmd_stats(config),
        Commands::Record { id, kind } => cmd_record(config, &id, kind.into()),
    }
}

/// Loads configuration from an explicit path or the default location.
fn load_config(path: Option<&str>) -> feedweave::Result<FeedConfig> {
    match path.filter(|p| !p.trim().is_empty()) {
        Some(config_path) => {
            FeedConfig::load_from_file(Path::new(config_path)).map(FeedConfig::with_env_overrides)
        },
        None => Ok(FeedConfig::load_default()),
    }
}

fn open_cursor_store(config: &FeedConfig) -> feedweave::Result<SqliteCursorStore> {
    SqliteCursorStore::new(config.database_path(), DEFAULT_SLOT)
}

/// Cursor command.
fn cmd_cursor(config: &FeedConfig) -> feedweave::Result<()> {
    let store = open_cursor_store(config)?;
    let token = store.get()?;
    let Some(token) = token else {
        println!("No persisted cursor");
        return Ok(());
    };

    match CursorCodec::decode(Some(&token)) {
        Some(cursor) => {
            let json = serde_json::to_string_pretty(&cursor)
                .map_err(|e| feedweave::Error::operation("render_cursor", e))?;
            println!("{json}");
        },
        None => println!("Persisted cursor is unreadable and will be discarded: {token}"),
    }
    Ok(())
}

/// Eligible command.
fn cmd_eligible(config: &FeedConfig, index: u64, limit: Option<usize>) -> feedweave::Result<()> {
    let table = config.boundary_table()?;
    let limit = limit.unwrap_or(config.page_size);
    let effective = table.effective_limit(index, limit);

    println!("Index {index}:");
    for source in table.eligible_sources(index) {
        println!("  {source}");
    }
    if effective == limit {
        println!("Page size: {limit}");
    } else {
        println!("Page size: {effective} (shrunk from {limit} at a boundary)");
    }
    Ok(())
}

/// Reset command.
fn cmd_reset(config: &FeedConfig) -> feedweave::Result<()> {
    open_cursor_store(config)?.clear()?;
    println!("Feed cursor cleared");
    Ok(())
}

/// Stats command.
fn cmd_stats(config: &FeedConfig) -> feedweave::Result<()> {
    let log = SqliteInteractionLog::new(config.database_path())?;
    let cursor = CursorCodec::decode(open_cursor_store(config)?.get()?.as_deref());

    println!("Database: {}", config.database_path().display());
    println!("Interactions: {}", log.count()?);
    match log.last_index()? {
        Some(index) => println!("Last feed index: {index}"),
        None => println!("Last feed index: none"),
    }
    println!("Installation seed: {:016x}", log.installation_seed()?);
    match cursor {
        Some(cursor) => println!("Items loaded: {}", cursor.total_items_loaded),
        None => println!("Items loaded: 0 (no cursor)"),
    }
    Ok(())
}

/// Record command.
fn cmd_record(config: &FeedConfig, id: &str, kind: InteractionKind) -> feedweave::Result<()> {
    let log = SqliteInteractionLog::new(config.database_path())?;
    if log.record(&ContentId::new(id), kind, chrono::Utc::now())? {
        println!("Recorded {kind} on {id}");
    } else {
        println!("{id} has not been surfaced; nothing recorded");
    }
    Ok(())
}
