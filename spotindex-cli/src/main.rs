//! spotindex CLI - Command-line interface
//!
//! This binary provides a command-line interface to the spotindex library.

mod commands;
mod error;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use spotindex::config::{config_file_path, ConfigFile};
use spotindex::logging::init_logging;
use tracing::info;

use commands::history::HistoryArgs;
use commands::import_listing::ImportListingArgs;
use commands::index::IndexArgs;
use commands::lookup::LookupArgs;
use commands::meter::MeterArgs;
use commands::sources::SourcesAction;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "spotindex", version = spotindex::VERSION)]
#[command(about = "Index meter-reading photos across local and network folders")]
struct Cli {
    /// Print debug logs to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file (defaults to ~/.spotindex/config.ini)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a default configuration file and create state directories
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
    /// Rescan image folders and rebuild the index
    Index(IndexArgs),
    /// Show the images of a consumer
    Lookup(LookupArgs),
    /// Show the images of the consumer owning a meter
    Meter(MeterArgs),
    /// Manage source folders
    Sources {
        #[command(subcommand)]
        action: SourcesAction,
    },
    /// Show sources, reachability and snapshot ages
    Status,
    /// Show recently searched ids and meter numbers
    History(HistoryArgs),
    /// Keep the index current as folders come and go
    Watch,
    /// Seed snapshots from a listing file
    ImportListing(ImportListingArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path()?,
    };

    if let Commands::Init { force } = cli.command {
        return commands::init::run(&config_path, force);
    }

    let config = ConfigFile::load(&config_path)?;
    let _guard = init_logging(&config.logging.directory, &config.logging.filter, cli.verbose)
        .map_err(CliError::Logging)?;
    info!(
        version = spotindex::VERSION,
        config = %config_path.display(),
        "spotindex starting"
    );

    match cli.command {
        Commands::Init { .. } => Ok(()),
        Commands::Sources { action } => commands::sources::run(&config, action),
        Commands::Status => commands::status::run(&config),
        Commands::History(args) => commands::history::run(&config, args),
        command => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(CliError::Runtime)?;
            runtime.block_on(run_async(&config, command))
        }
    }
}

async fn run_async(config: &ConfigFile, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Index(args) => commands::index::run(config, args).await,
        Commands::Lookup(args) => commands::lookup::run(config, args).await,
        Commands::Meter(args) => commands::meter::run(config, args).await,
        Commands::Watch => commands::watch::run(config).await,
        Commands::ImportListing(args) => commands::import_listing::run(config, args).await,
        Commands::Init { .. }
        | Commands::Sources { .. }
        | Commands::Status
        | Commands::History(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_lookup_defaults() {
        let cli = Cli::try_parse_from(["spotindex", "lookup", "123456789"]).unwrap();
        match cli.command {
            Commands::Lookup(args) => {
                assert_eq!(args.consumer_id, "123456789");
                assert_eq!(args.latest, spotindex::query::DEFAULT_LATEST_LIMIT);
                assert!(!args.prefix);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["spotindex", "status", "--verbose", "--config", "/tmp/x.ini"])
                .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/x.ini")));
    }

    #[test]
    fn test_parse_sources_remove_purge() {
        let cli =
            Cli::try_parse_from(["spotindex", "sources", "remove", "/mnt/share", "--purge"])
                .unwrap();
        match cli.command {
            Commands::Sources {
                action: SourcesAction::Remove { path, purge },
            } => {
                assert_eq!(path, PathBuf::from("/mnt/share"));
                assert!(purge);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
