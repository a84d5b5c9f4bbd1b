//! Status command - sources, reachability and snapshot ages.

use console::style;
use spotindex::config::ConfigFile;
use spotindex::index::SnapshotCache;

use super::common::{open_history, open_registry};
use crate::error::CliError;

/// Run the status command.
pub fn run(config: &ConfigFile) -> Result<(), CliError> {
    let registry = open_registry(config)?;
    let cache = SnapshotCache::new(&config.index.cache_dir);

    println!("{}", style("Sources").bold());
    let mut images = 0usize;
    for source in registry.ordered() {
        let reachable = if source.root().exists() {
            style("online ").green()
        } else {
            style("offline").red()
        };
        let snapshot = match cache.info(&source) {
            Some(info) => {
                images += info.images;
                format!(
                    "{} consumers, {} images, {}",
                    info.consumers,
                    info.images,
                    info.age_human()
                )
            }
            None => "no snapshot".to_string(),
        };
        println!("  {} {}", reachable, source);
        println!("          {}", snapshot);
    }

    println!();
    println!("Snapshots: {}", cache.dir().display());
    println!("Images in snapshots: {}", images);

    if let Ok(history) = open_history(config) {
        if let Some(last) = history.recent_consumers(1).last() {
            println!("Last searched consumer: {}", last);
        }
    }
    Ok(())
}
