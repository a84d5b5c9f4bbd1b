//! CLI error type.

use std::fmt;
use std::path::PathBuf;

use spotindex::config::ConfigError;
use spotindex::history::HistoryError;
use spotindex::IndexError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Loading or saving the configuration failed.
    Config(ConfigError),
    /// An engine operation failed.
    Index(IndexError),
    /// The search history could not be read or written.
    History(HistoryError),
    /// The log directory could not be prepared.
    Logging(std::io::Error),
    /// The async runtime could not be created.
    Runtime(std::io::Error),
    /// No source contributed any images.
    NoIndex,
    /// The reindex worker stopped before answering.
    WorkerStopped,
    /// A path given on the command line is not a configured source.
    UnknownSource(PathBuf),
    /// The signal handler could not be installed.
    Signal(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(e) => write!(f, "{}", e),
            CliError::Index(e) => write!(f, "{}", e),
            CliError::History(e) => write!(f, "{}", e),
            CliError::Logging(e) => write!(f, "Failed to set up logging: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::NoIndex => write!(
                f,
                "No index found yet. Check that the image folders are reachable and run 'spotindex index'."
            ),
            CliError::WorkerStopped => write!(f, "Reindex worker stopped unexpectedly"),
            CliError::UnknownSource(path) => write!(
                f,
                "{} is not a configured source (see 'spotindex sources list')",
                path.display()
            ),
            CliError::Signal(e) => write!(f, "Failed to set signal handler: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(e) => Some(e),
            CliError::Index(e) => Some(e),
            CliError::History(e) => Some(e),
            CliError::Logging(e) | CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e)
    }
}

impl From<IndexError> for CliError {
    fn from(e: IndexError) -> Self {
        CliError::Index(e)
    }
}

impl From<HistoryError> for CliError {
    fn from(e: HistoryError) -> Self {
        CliError::History(e)
    }
}
