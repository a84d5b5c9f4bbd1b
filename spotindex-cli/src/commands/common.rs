//! Common helpers shared across CLI commands.

use console::style;
use spotindex::config::ConfigFile;
use spotindex::engine::Engine;
use spotindex::history::SearchHistory;
use spotindex::query::ConsumerRecord;
use spotindex::reindex::ReindexReport;
use spotindex::source::SourceRegistry;
use tracing::warn;

use crate::error::CliError;

/// Build the source registry described by the config.
pub fn open_registry(config: &ConfigFile) -> Result<SourceRegistry, CliError> {
    Ok(SourceRegistry::with_list_file(
        &config.sources.primary,
        &config.sources.list_file,
    )?)
}

/// Open the search history described by the config.
pub fn open_history(config: &ConfigFile) -> Result<SearchHistory, CliError> {
    Ok(SearchHistory::open(&config.lookup.search_history)?)
}

/// Record a successful search in the history file.
///
/// History is a convenience: failures are logged and reported as `false`
/// without affecting the lookup that triggered them.
pub fn remember_search(config: &ConfigFile, consumer_id: &str, meter: Option<&str>) -> bool {
    let result = open_history(config).and_then(|mut history| {
        if let Some(meter) = meter {
            history.record_meter(meter)?;
        }
        history.record_consumer(consumer_id)?;
        Ok(())
    });

    match result {
        Ok(()) => true,
        Err(e) => {
            warn!(
                path = %config.lookup.search_history.display(),
                error = %e,
                "Search history not updated"
            );
            false
        }
    }
}

/// Start the engine and bring the published index up to date from the
/// snapshots, rescanning only sources that have none.
pub async fn start_loaded_engine(config: &ConfigFile) -> Result<Engine, CliError> {
    let engine = Engine::start(config.engine_config())?;

    let report = engine
        .coordinator()
        .trigger_merge()
        .wait()
        .await
        .ok_or(CliError::WorkerStopped)?;
    print_failures(&report);

    if engine.facade().snapshot().is_empty() {
        engine.shutdown().await;
        return Err(CliError::NoIndex);
    }
    Ok(engine)
}

/// Print per-source errors of a run, if any.
pub fn print_failures(report: &ReindexReport) {
    for failure in report.failures() {
        eprintln!(
            "{} {}: {}",
            style("warning:").yellow().bold(),
            failure.source.root().display(),
            failure.outcome
        );
    }
}

/// Print a consumer record.
pub fn print_record(record: &ConsumerRecord, all_paths: bool) {
    println!("{}", style(format!("Consumer {}", record.consumer_id)).bold());
    println!("  Device code: {}", record.device_code);
    println!(
        "  Meter:       {}",
        record.meter_number.as_deref().unwrap_or("(unknown)")
    );
    println!("  Images:      {}", record.image_count);
    println!();

    for entry in &record.dates {
        let label = format!("{:<12}", entry.date.display());
        match entry.paths.split_first() {
            Some((front, rest)) => {
                println!("  {} {}", style(label).cyan(), front.display());
                if all_paths {
                    for path in rest {
                        println!("  {:<12} {}", "", path.display());
                    }
                } else if !rest.is_empty() {
                    println!("  {:<12} (+{} more)", "", rest.len());
                }
            }
            None => println!("  {}", style(label).cyan()),
        }
    }
}
