//! History command - recently searched ids and meters.

use clap::Args;
use spotindex::config::ConfigFile;

use super::common::open_history;
use crate::error::CliError;

/// Arguments for the history command.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Entries to show per list (defaults to the configured limit)
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,
}

/// Run the history command.
pub fn run(config: &ConfigFile, args: HistoryArgs) -> Result<(), CliError> {
    let history = open_history(config)?;
    let limit = args.limit.unwrap_or(config.lookup.history_limit);

    println!("Consumer ids:");
    print_list(history.recent_consumers(limit));
    println!();
    println!("Meter numbers:");
    print_list(history.recent_meters(limit));
    Ok(())
}

fn print_list(entries: &[String]) {
    if entries.is_empty() {
        println!("  (none)");
    }
    // Newest first.
    for entry in entries.iter().rev() {
        println!("  {}", entry);
    }
}
