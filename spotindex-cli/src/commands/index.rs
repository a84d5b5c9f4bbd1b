//! Index command - rescan sources with a progress bar.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use spotindex::config::ConfigFile;
use spotindex::engine::Engine;
use spotindex::reindex::{ReindexEvent, ReindexPhase, ReindexReport, SourceOutcome};
use spotindex::source::normalize_root;
use spotindex::IndexError;
use tokio::sync::broadcast::error::RecvError;

use super::common::print_failures;
use crate::error::CliError;

/// Arguments for the index command.
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Rescan only this configured source, reusing snapshots for the others
    #[arg(long, value_name = "PATH")]
    pub source: Option<PathBuf>,
}

/// Run the index command.
pub async fn run(config: &ConfigFile, args: IndexArgs) -> Result<(), CliError> {
    let engine = Engine::start(config.engine_config())?;
    let result = reindex(&engine, args).await;
    engine.shutdown().await;

    let report = result?;
    print_summary(&report);
    Ok(())
}

async fn reindex(engine: &Engine, args: IndexArgs) -> Result<ReindexReport, CliError> {
    let mut events = engine.coordinator().subscribe();

    let ticket = match args.source {
        Some(path) => {
            let root = normalize_root(&path);
            let source = engine
                .registry()
                .find(&root)
                .ok_or_else(|| CliError::UnknownSource(root.clone()))?;
            if !source.root().exists() {
                return Err(IndexError::SourceUnavailable(root).into());
            }
            println!("Rescanning {}", source);
            engine.coordinator().trigger_for_source(&source)
        }
        None => {
            println!(
                "Rescanning {} source(s)",
                engine.registry().ordered().len()
            );
            engine.coordinator().trigger_full()
        }
    };

    let bar = ProgressBar::new_spinner();
    bar.enable_steady_tick(Duration::from_millis(120));
    let determinate = ProgressStyle::with_template(
        "{spinner:.green} {msg:<10} [{bar:40.cyan/blue}] {pos}/{len} entries",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("=> ");

    let wait = ticket.wait();
    tokio::pin!(wait);

    let report = loop {
        tokio::select! {
            report = &mut wait => break report,

            event = events.recv() => match event {
                Ok(ReindexEvent::PhaseChanged(phase)) => bar.set_message(phase.to_string()),
                Ok(ReindexEvent::Progress(progress)) => {
                    if progress.is_indeterminate() {
                        bar.set_message(format!("listing, {} entries found", progress.processed));
                    } else {
                        if bar.length().is_none() {
                            bar.set_style(determinate.clone());
                            bar.set_message(ReindexPhase::Scanning.to_string());
                        }
                        bar.set_length(progress.total as u64);
                        bar.set_position(progress.processed as u64);
                    }
                }
                Ok(ReindexEvent::SourceFailed { root, reason }) => {
                    bar.println(format!(
                        "{} {}: {}",
                        style("scan failed").red(),
                        root.display(),
                        reason
                    ));
                }
                Ok(ReindexEvent::Published(_)) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break (&mut wait).await,
            },
        }
    };

    bar.finish_and_clear();
    report.ok_or(CliError::WorkerStopped).map(|r| (*r).clone())
}

fn print_summary(report: &ReindexReport) {
    println!();
    for source in &report.sources {
        let marker = match source.outcome {
            SourceOutcome::Scanned { .. } | SourceOutcome::Cached { .. } => style("ok").green(),
            SourceOutcome::Unavailable => style("--").dim(),
            _ => style("!!").red(),
        };
        println!("  {} {} - {}", marker, source.source, source.outcome);
    }
    println!();
    println!(
        "Indexed {} images for {} consumers in {:.1}s",
        report.total_images,
        report.consumers,
        report.duration.as_secs_f64()
    );
    if let Some(listing) = &report.legacy_listing {
        println!("Listing written to {}", listing.display());
    }
    print_failures(report);
}
