//! Meter command - look a consumer up by meter number.

use clap::Args;
use spotindex::config::ConfigFile;

use super::common::{print_record, remember_search, start_loaded_engine};
use crate::error::CliError;

/// Arguments for the meter command.
#[derive(Debug, Args)]
pub struct MeterArgs {
    /// Meter number as printed on the meter
    pub meter_number: String,

    /// Print every path, not only the first per date
    #[arg(long)]
    pub all: bool,
}

/// Run the meter command.
pub async fn run(config: &ConfigFile, args: MeterArgs) -> Result<(), CliError> {
    let engine = start_loaded_engine(config).await?;
    let facade = engine.facade().clone();
    engine.shutdown().await;

    if facade.meter_map().is_none() {
        println!(
            "No meter mapping loaded (expected at {})",
            config.lookup.meter_mapping.display()
        );
    }

    let record = facade.lookup_by_meter(&args.meter_number)?;
    print_record(&record, args.all);

    remember_search(config, &record.consumer_id, Some(&args.meter_number));
    Ok(())
}
