//! # casegraph CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server (`--csv` preloads the source collection)
//! - `setup` - Create the managed collections
//! - `ingest-csv` - Load a CSV file into the source collection
//! - `synthesize` - Build case entities from the source collection
//! - `link` - Materialize edges
//! - `status` - List collections and their sizes

mod commands;

use crate::config::{BackendKind, Config};
use casegraph_core::{CasegraphError, NgsiNamespace};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// casegraph - NGSI-LD case graphs over a document/edge store
///
/// Turns tabular case records into typed entities and materializes the
/// relationships between them as edges.
#[derive(Parser, Debug)]
#[command(name = "casegraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend: "redb" or "memory" (overrides the config file)
    #[arg(short = 'B', long, global = true)]
    pub backend: Option<BackendKind>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides the config file)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// CSV file to load into the source collection before serving
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Create the managed collections if they are missing
    Setup,

    /// Load CSV rows into the source collection
    IngestCsv {
        /// Path to the CSV file (header row required)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Synthesize case entities from the source collection
    Synthesize,

    /// Materialize relationship edges
    Link {
        /// Which edges to build
        #[arg(short, long, value_enum, default_value_t = LinkTarget::Cases)]
        target: LinkTarget,
    },

    /// List collections and document counts
    Status,
}

/// Edge jobs selectable from the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkTarget {
    /// Case entities into the case edge collection
    Cases,
    /// Entries by `_key` into the entry edge collection
    EntriesByKey,
    /// Entries by `id` into the entry edge collection
    EntriesById,
}

// =============================================================================
// SETTINGS
// =============================================================================

/// Configuration after merging the file with command-line overrides.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: PathBuf,
    pub backend: BackendKind,
    pub host: String,
    pub port: u16,
    pub namespace: NgsiNamespace,
    pub json_mode: bool,
}

impl Settings {
    /// Merge the config file (if any) with the global flags.
    pub fn resolve(cli: &Cli) -> Result<Self, CasegraphError> {
        let config = Config::load_optional(cli.config.as_deref())?;
        Ok(Self {
            database: cli.database.clone().unwrap_or(config.storage.database),
            backend: cli.backend.unwrap_or(config.storage.backend),
            host: config.server.host,
            port: config.server.port,
            namespace: config.ngsi,
            json_mode: cli.json_mode,
        })
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), CasegraphError> {
    let mut settings = Settings::resolve(&cli)?;

    match cli.command {
        Some(Commands::Server { host, port, csv }) => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            cmd_server(&settings, csv.as_deref()).await
        }
        Some(Commands::Setup) => cmd_setup(&settings),
        Some(Commands::IngestCsv { file }) => cmd_ingest_csv(&settings, &file),
        Some(Commands::Synthesize) => cmd_synthesize(&settings),
        Some(Commands::Link { target }) => cmd_link(&settings, target),
        Some(Commands::Status) | None => cmd_status(&settings),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::parse_from([
            "casegraph",
            "--backend",
            "memory",
            "-D",
            "cases.redb",
            "link",
            "--target",
            "entries-by-id",
        ]);
        let settings = Settings::resolve(&cli).expect("settings");

        assert_eq!(settings.backend, BackendKind::Memory);
        assert_eq!(settings.database, PathBuf::from("cases.redb"));
        assert!(matches!(
            cli.command,
            Some(Commands::Link {
                target: LinkTarget::EntriesById
            })
        ));
    }

    #[test]
    fn config_file_fills_unset_flags() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("casegraph.toml");
        std::fs::write(&path, "[storage]\nbackend = \"memory\"\n[server]\nport = 9100\n")
            .expect("write");

        let cli = Cli::parse_from([
            "casegraph",
            "--config",
            path.to_str().expect("utf-8 path"),
            "status",
        ]);
        let settings = Settings::resolve(&cli).expect("settings");
        assert_eq!(settings.backend, BackendKind::Memory);
        assert_eq!(settings.port, 9100);
    }
}
