//! Error types for the index engine.
//!
//! Most failure modes of the engine are recoverable and are modelled as
//! values instead of errors: a malformed filename is simply not indexed, an
//! unreachable source contributes nothing to a merge, and a corrupt snapshot
//! is a cache miss. [`IndexError`] covers what remains and is what the
//! per-source outcomes of a reindex run carry.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for index engine operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors that can occur while building, persisting or querying an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// No record exists for the given consumer id or meter number.
    #[error("no images found for {0}")]
    NotFound(String),

    /// A consumer id supplied by a caller is not a 9-digit number.
    #[error("consumer id must be a 9-digit number, got '{0}'")]
    InvalidConsumerId(String),

    /// The source root is not currently reachable.
    #[error("source is not reachable: {}", .0.display())]
    SourceUnavailable(PathBuf),

    /// Enumerating a source folder failed.
    #[error("failed to scan {}: {source}", root.display())]
    ScanFailed {
        root: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A snapshot file exists but cannot be decoded.
    #[error("snapshot {} is unreadable: {reason}", path.display())]
    CacheCorrupt { path: PathBuf, reason: String },

    /// Reading or writing a state file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl IndexError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is the expected "no such record" outcome of a query.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
