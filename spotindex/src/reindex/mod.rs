//! Background reindexing.
//!
//! The [`ReindexCoordinator`] owns the only path by which a new merged index
//! reaches readers. Requests never block the caller: each one is folded into
//! a single pending request that a dedicated worker services, one run at a
//! time.
//!
//! # Run Lifecycle
//!
//! ```text
//! Idle ──► Scanning ──► Merging ──► Publishing ──► Idle
//!             │
//!             └─ per-source Failed outcomes are recorded, the run goes on
//! ```
//!
//! # Coalescing
//!
//! Requests that arrive while a run is active are merged into one pending
//! request (see [`ReindexScope::absorb`]) and serviced by the next run.
//! Runs are never parallel and never aborted; every caller's
//! [`ReindexTicket`] resolves with the report of the run that covered it.

mod coordinator;
mod progress;
mod report;

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::oneshot;

use crate::source::normalize_root;

pub use coordinator::{CoordinatorBuilder, ReindexCoordinator, DEFAULT_EVENT_CAPACITY};
pub use progress::ScanProgress;
pub use report::{ReindexReport, SourceOutcome, SourceReport};

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReindexPhase {
    #[default]
    Idle,
    Scanning,
    Merging,
    Publishing,
}

impl fmt::Display for ReindexPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Scanning => write!(f, "scanning"),
            Self::Merging => write!(f, "merging"),
            Self::Publishing => write!(f, "publishing"),
        }
    }
}

/// What a run has to rescan before merging.
///
/// Sources outside the scope are merged from their snapshots; a reachable
/// source without a usable snapshot is rescanned regardless of scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReindexScope {
    /// Re-merge from snapshots only.
    Merge,
    /// Rescan these roots.
    Sources(BTreeSet<PathBuf>),
    /// Rescan every reachable source.
    Full,
}

impl ReindexScope {
    /// Scope rescanning a single root.
    pub fn source(root: impl AsRef<Path>) -> Self {
        Self::Sources(BTreeSet::from([normalize_root(root.as_ref())]))
    }

    /// Combine two requests into one that covers both.
    pub fn absorb(self, other: Self) -> Self {
        match (self, other) {
            (Self::Full, _) | (_, Self::Full) => Self::Full,
            (Self::Sources(mut a), Self::Sources(b)) => {
                a.extend(b);
                Self::Sources(a)
            }
            (Self::Sources(a), Self::Merge) | (Self::Merge, Self::Sources(a)) => Self::Sources(a),
            (Self::Merge, Self::Merge) => Self::Merge,
        }
    }

    /// Whether this scope forces a rescan of `root`.
    pub fn requires_scan(&self, root: &Path) -> bool {
        match self {
            Self::Merge => false,
            Self::Sources(roots) => roots.contains(root),
            Self::Full => true,
        }
    }

    /// Check if this is a full reindex.
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Full)
    }
}

impl fmt::Display for ReindexScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Merge => write!(f, "merge"),
            Self::Sources(roots) => write!(f, "{} source(s)", roots.len()),
            Self::Full => write!(f, "full"),
        }
    }
}

/// Notifications emitted by the coordinator.
#[derive(Debug, Clone)]
pub enum ReindexEvent {
    PhaseChanged(ReindexPhase),
    Progress(ScanProgress),
    SourceFailed { root: PathBuf, reason: String },
    /// A new merged index replaced the previous one.
    Published(Arc<ReindexReport>),
}

/// Handle for awaiting the run that services a request.
#[derive(Debug)]
pub struct ReindexTicket {
    rx: oneshot::Receiver<Arc<ReindexReport>>,
}

impl ReindexTicket {
    pub(crate) fn new(rx: oneshot::Receiver<Arc<ReindexReport>>) -> Self {
        Self { rx }
    }

    /// Wait for the covering run to finish.
    ///
    /// Returns `None` if the coordinator shut down before servicing the
    /// request.
    pub async fn wait(self) -> Option<Arc<ReindexReport>> {
        self.rx.await.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_absorbs_everything() {
        assert_eq!(
            ReindexScope::Merge.absorb(ReindexScope::Full),
            ReindexScope::Full
        );
        assert_eq!(
            ReindexScope::Full.absorb(ReindexScope::source("/a")),
            ReindexScope::Full
        );
    }

    #[test]
    fn test_sources_union() {
        let scope = ReindexScope::source("/a")
            .absorb(ReindexScope::Merge)
            .absorb(ReindexScope::source("/b"))
            .absorb(ReindexScope::source("/a"));

        assert!(scope.requires_scan(Path::new("/a")));
        assert!(scope.requires_scan(Path::new("/b")));
        assert!(!scope.requires_scan(Path::new("/c")));
        assert_eq!(scope.to_string(), "2 source(s)");
    }

    #[test]
    fn test_merge_scans_nothing() {
        let scope = ReindexScope::Merge.absorb(ReindexScope::Merge);
        assert_eq!(scope, ReindexScope::Merge);
        assert!(!scope.requires_scan(Path::new("/a")));
    }
}
