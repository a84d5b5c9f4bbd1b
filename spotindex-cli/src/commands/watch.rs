//! Watch command - keep the index current while sources come and go.

use console::style;
use spotindex::config::ConfigFile;
use spotindex::engine::Engine;
use spotindex::reindex::ReindexEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::common::print_failures;
use crate::error::CliError;

/// Run the watch command until Ctrl+C.
pub async fn run(config: &ConfigFile) -> Result<(), CliError> {
    let mut engine = Engine::start(config.engine_config())?;
    let mut events = engine.coordinator().subscribe();

    let shutdown = CancellationToken::new();
    let handler_token = shutdown.clone();
    ctrlc::set_handler(move || {
        println!();
        println!("Received shutdown signal, stopping...");
        handler_token.cancel();
    })
    .map_err(|e| CliError::Signal(e.to_string()))?;

    engine.start_monitor();

    println!(
        "Watching {} source(s), probing every {}s",
        engine.registry().ordered().len(),
        config.probe_interval().as_secs()
    );
    println!("Press Ctrl+C to stop");
    println!();

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            event = events.recv() => match event {
                Ok(ReindexEvent::Published(report)) => {
                    println!(
                        "{} {} run: {} images, {} consumers ({:.1}s)",
                        style("published").green(),
                        report.scope,
                        report.total_images,
                        report.consumers,
                        report.duration.as_secs_f64()
                    );
                    print_failures(&report);
                }
                Ok(ReindexEvent::SourceFailed { root, reason }) => {
                    println!("{} {}: {}", style("scan failed").red(), root.display(), reason);
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
        }
    }

    engine.shutdown().await;
    Ok(())
}
