//! Lookup command - show a consumer's images.

use clap::Args;
use console::style;
use spotindex::config::ConfigFile;
use spotindex::query::DEFAULT_LATEST_LIMIT;

use super::common::{print_record, remember_search, start_loaded_engine};
use crate::error::CliError;

/// Maximum rows printed in prefix mode.
const PREFIX_ROWS: usize = 20;

/// Arguments for the lookup command.
#[derive(Debug, Args)]
pub struct LookupArgs {
    /// 9-digit consumer id, or the start of one with --prefix
    pub consumer_id: String,

    /// List consumers whose id starts with the given digits
    #[arg(long)]
    pub prefix: bool,

    /// Print every path, not only the first per date
    #[arg(long)]
    pub all: bool,

    /// Number of recent images to preview
    #[arg(long, value_name = "N", default_value_t = DEFAULT_LATEST_LIMIT)]
    pub latest: usize,
}

/// Run the lookup command.
pub async fn run(config: &ConfigFile, args: LookupArgs) -> Result<(), CliError> {
    let engine = start_loaded_engine(config).await?;
    let facade = engine.facade().clone();
    engine.shutdown().await;

    if args.prefix {
        let prefix = args.consumer_id.trim();
        let matches = facade.lookup_prefix(prefix, PREFIX_ROWS + 1);
        if matches.is_empty() {
            println!("No consumers start with '{}'", prefix);
            return Ok(());
        }
        for (id, count) in matches.iter().take(PREFIX_ROWS) {
            println!("  {}  {} image(s)", id, count);
        }
        if matches.len() > PREFIX_ROWS {
            println!("  ... more matches, refine the prefix");
        }
        return Ok(());
    }

    let record = facade.consumer_record(&args.consumer_id)?;
    print_record(&record, args.all);

    if args.latest > 0 {
        let latest = facade.latest(&record.consumer_id, args.latest)?;
        println!();
        println!("{}", style(format!("Latest {}:", latest.len())).bold());
        for (date, path) in latest {
            println!("  {:<12} {}", date.display(), path.display());
        }
    }

    remember_search(config, &record.consumer_id, None);
    Ok(())
}
