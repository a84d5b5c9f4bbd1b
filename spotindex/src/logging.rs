//! Logging setup for front ends.
//!
//! Log output goes to two places: a daily-rolling file in the configured
//! log directory (plain text, non-blocking writer) and stderr. `RUST_LOG`
//! takes precedence over the configured filter.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::DEFAULT_LOG_FILTER;

/// Log file name prefix; files are suffixed with the date.
pub const LOG_FILE_PREFIX: &str = "spotindex.log";

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process. Console output is limited to warnings unless
/// `verbose` is set.
pub fn init_logging(
    directory: &Path,
    filter: &str,
    verbose: bool,
) -> Result<WorkerGuard, std::io::Error> {
    std::fs::create_dir_all(directory)?;

    let file_appender = tracing_appender::rolling::daily(directory, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::new("warn")
    };

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_filter(file_filter);
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init();

    Ok(guard)
}
