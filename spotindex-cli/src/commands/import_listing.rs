//! Import-listing command - seed snapshots from a flat listing file.

use std::path::PathBuf;

use clap::Args;
use spotindex::config::ConfigFile;
use spotindex::engine::Engine;
use spotindex::index::read_listing;

use super::common::print_failures;
use crate::error::CliError;

/// Arguments for the import-listing command.
#[derive(Debug, Args)]
pub struct ImportListingArgs {
    /// Listing file with one `<folder>/<filename>` per line
    pub file: PathBuf,

    /// Register folders in the listing that aren't configured yet
    #[arg(long)]
    pub add: bool,
}

/// Run the import-listing command.
pub async fn run(config: &ConfigFile, args: ImportListingArgs) -> Result<(), CliError> {
    let indices = read_listing(&args.file)?;
    let engine = Engine::start(config.engine_config())?;

    let mut imported = 0usize;
    for (root, index) in &indices {
        let source = match engine.registry().find(root) {
            Some(source) => Some(source),
            None if args.add => engine.registry().add_secondary(root)?,
            None => None,
        };
        let Some(source) = source else {
            println!("  skipped {} (not configured, use --add)", root.display());
            continue;
        };

        engine.cache().save(&source, index)?;
        println!("  {} - {} images", source, index.image_count());
        imported += 1;
    }

    let report = engine.coordinator().trigger_merge().wait().await;
    engine.shutdown().await;
    let report = report.ok_or(CliError::WorkerStopped)?;

    println!();
    println!(
        "Imported {} of {} folder(s); index now holds {} images",
        imported,
        indices.len(),
        report.total_images
    );
    print_failures(&report);
    Ok(())
}
