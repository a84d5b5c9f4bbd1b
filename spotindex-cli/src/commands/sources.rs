//! Source management CLI commands.

use std::path::PathBuf;

use clap::Subcommand;
use spotindex::config::ConfigFile;
use spotindex::index::SnapshotCache;

use super::common::open_registry;
use crate::error::CliError;

/// Source action subcommands.
#[derive(Debug, Subcommand)]
pub enum SourcesAction {
    /// List configured sources in merge priority order
    List,
    /// Append a secondary folder
    Add {
        /// Folder to add
        path: PathBuf,
    },
    /// Remove a secondary folder
    Remove {
        /// Folder to remove
        path: PathBuf,

        /// Also delete the folder's snapshot
        #[arg(long)]
        purge: bool,
    },
}

/// Run a sources subcommand.
pub fn run(config: &ConfigFile, action: SourcesAction) -> Result<(), CliError> {
    let registry = open_registry(config)?;

    match action {
        SourcesAction::List => {
            for (position, source) in registry.ordered().iter().enumerate() {
                println!("  {}. {}", position + 1, source);
            }
            println!();
            println!("List file: {}", config.sources.list_file.display());
        }
        SourcesAction::Add { path } => match registry.add_secondary(&path)? {
            Some(source) => {
                println!("Added {}", source);
                if !source.root().exists() {
                    println!("  (currently unreachable, it will be picked up when it appears)");
                }
                println!("Run 'spotindex index --source {}' to scan it.", source.root().display());
            }
            None => println!("{} is already configured", path.display()),
        },
        SourcesAction::Remove { path, purge } => {
            let source = registry.find(&path);
            if !registry.remove_secondary(&path)? {
                return Err(CliError::UnknownSource(path));
            }
            println!("Removed {}", path.display());

            if purge {
                if let Some(source) = source {
                    let cache = SnapshotCache::new(&config.index.cache_dir);
                    if cache.remove(&source)? {
                        println!("Deleted its snapshot");
                    }
                }
            }
        }
    }
    Ok(())
}
