//! Command-line client for the `barscan` scan store.
//!
//! Feeds serial/IUC lines into the local store, undoes batches, and writes
//! CSV/XLSX exports.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use barscan_core::ServiceConfig;
use scan::{ExportKind, ExportMode};

use crate::commands::Session;
use crate::config::FileConfig;

/// BarScan CLI tool.
#[derive(Parser, Debug)]
#[command(name = "barscan", about = "Per-device serial/IUC scan store")]
struct Cli {
    /// Path to config file (default: ~/.barscan/config.toml).
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<String>,

    /// Data directory (overrides the config file).
    #[arg(long = "data-dir", global = true)]
    data_dir: Option<String>,

    /// Database file (default: <data-dir>/scans.redb).
    #[arg(long = "db", global = true)]
    db: Option<String>,

    /// Export directory (default: <data-dir>/exports).
    #[arg(long = "export-dir", global = true)]
    export_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show this installation's device id.
    #[command(name = "device-id")]
    DeviceId {
        /// Forget the stored id; a new one is generated on next use.
        #[arg(long)]
        reset: bool,
    },

    /// Validate lines and commit them as one batch.
    Add {
        /// Lines to add. Reads stdin when neither lines nor --file are given.
        lines: Vec<String>,
        /// Read lines from a file.
        #[arg(short = 'f', long = "file")]
        file: Option<String>,
        /// Only report what would be added.
        #[arg(long)]
        dry_run: bool,
    },

    /// List this device's scans, newest first.
    List {
        /// Print JSON records.
        #[arg(long)]
        json: bool,
    },

    /// Delete one scan.
    Delete { id: String },

    /// Set the notes of a scan.
    Notes { id: String, notes: String },

    /// Delete every scan of this device.
    Clear {
        /// Skip confirmation.
        #[arg(long = "yes", short = 'y')]
        yes: bool,
    },

    /// Remove the last committed batch.
    Undo,

    /// Read decoded codes from stdin, one per line, until EOF or Ctrl-C.
    Capture {
        /// Minimum pause between two accepted codes.
        #[arg(long)]
        cooldown_ms: Option<u64>,
        /// Commit the captured lines as a batch when done.
        #[arg(long)]
        commit: bool,
    },

    /// Write the table to a CSV or XLSX file.
    Export {
        /// csv or xlsx.
        #[arg(long)]
        kind: Option<ExportKind>,
        /// serial, iuc or both.
        #[arg(long)]
        mode: Option<ExportMode>,
        /// File name without extension.
        #[arg(long)]
        name: Option<String>,
        /// Output directory.
        #[arg(short = 'o', long = "out")]
        out: Option<String>,
        /// Don't keep a copy in the saved exports.
        #[arg(long)]
        no_save: bool,
    },

    /// Saved exports.
    Exports {
        #[command(subcommand)]
        action: ExportsAction,
    },

    /// Move scans from the legacy single-list layout.
    Migrate,

    /// Show version.
    Version,
}

#[derive(Subcommand, Debug)]
enum ExportsAction {
    /// List saved exports, newest first.
    List {
        /// Case-insensitive name filter.
        #[arg(long)]
        query: Option<String>,
        /// Only csv or xlsx.
        #[arg(long)]
        kind: Option<ExportKind>,
    },
    /// Write a saved export back to disk.
    Save {
        id: String,
        #[arg(short = 'o', long = "out")]
        out: Option<String>,
    },
    /// Delete a saved export.
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Version = cli.command {
        println!("barscan v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config_path = cli
        .config
        .map(PathBuf::from)
        .unwrap_or_else(FileConfig::default_path);
    let file_config = FileConfig::load(&config_path)?;
    let flags = ServiceConfig {
        data_dir: cli.data_dir.map(PathBuf::from),
        db_path: cli.db.map(PathBuf::from),
        export_dir: cli.export_dir.map(PathBuf::from),
    };
    let session = Session::open(file_config, &flags)?;

    match cli.command {
        Commands::DeviceId { reset } => commands::scans::device_id(&session, reset),
        Commands::Add {
            lines,
            file,
            dry_run,
        } => {
            let text = if !lines.is_empty() {
                lines.join("\n")
            } else if let Some(path) = file {
                std::fs::read_to_string(&path)?
            } else {
                commands::read_stdin()?
            };
            commands::scans::add(&session, &text, dry_run)
        }
        Commands::List { json } => commands::scans::list(&session, json),
        Commands::Delete { id } => commands::scans::delete(&session, &id),
        Commands::Notes { id, notes } => commands::scans::notes(&session, &id, &notes),
        Commands::Clear { yes } => {
            if !yes && !commands::confirm("Delete every scan of this device?")? {
                println!("Cancelled.");
                return Ok(());
            }
            commands::scans::clear(&session)
        }
        Commands::Undo => commands::scans::undo(&session),
        Commands::Capture {
            cooldown_ms,
            commit,
        } => {
            let cooldown = cooldown_ms
                .map(std::time::Duration::from_millis)
                .unwrap_or_else(|| session.file.capture.cooldown());
            commands::capture::run(&session, cooldown, commit).await
        }
        Commands::Export {
            kind,
            mode,
            name,
            out,
            no_save,
        } => commands::export::export(
            &session,
            commands::export::ExportRequest {
                kind,
                mode,
                name,
                out: out.map(PathBuf::from),
                save: !no_save,
            },
        ),
        Commands::Exports { action } => match action {
            ExportsAction::List { query, kind } => {
                commands::export::list(&session, query.as_deref(), kind)
            }
            ExportsAction::Save { id, out } => {
                commands::export::save(&session, &id, out.map(PathBuf::from))
            }
            ExportsAction::Delete { id } => commands::export::delete(&session, &id),
        },
        Commands::Migrate => commands::scans::migrate(&session),
        Commands::Version => Ok(()),
    }
}
