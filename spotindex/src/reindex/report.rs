//! Per-run outcome reporting.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::source::SourceDescriptor;

use super::ReindexScope;

/// What happened to one source during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// The folder was scanned and its snapshot replaced.
    Scanned { entries: usize, images: usize },
    /// The folder was scanned but the snapshot could not be written.
    ScannedUncached {
        entries: usize,
        images: usize,
        reason: String,
    },
    /// The existing snapshot was used.
    Cached { images: usize },
    /// Scanning failed; the source contributed nothing this run.
    Failed { reason: String },
    /// The root was not reachable.
    Unavailable,
}

impl SourceOutcome {
    /// Images this source contributed before deduplication.
    pub fn images(&self) -> usize {
        match self {
            Self::Scanned { images, .. }
            | Self::ScannedUncached { images, .. }
            | Self::Cached { images } => *images,
            Self::Failed { .. } | Self::Unavailable => 0,
        }
    }

    /// Whether the source was rescanned.
    pub fn was_scanned(&self) -> bool {
        matches!(self, Self::Scanned { .. } | Self::ScannedUncached { .. })
    }

    /// Whether the run hit an error for this source.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::ScannedUncached { .. })
    }
}

impl fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scanned { entries, images } => {
                write!(f, "scanned {} entries, {} images", entries, images)
            }
            Self::ScannedUncached {
                entries,
                images,
                reason,
            } => write!(
                f,
                "scanned {} entries, {} images (snapshot not saved: {})",
                entries, images, reason
            ),
            Self::Cached { images } => write!(f, "cached, {} images", images),
            Self::Failed { reason } => write!(f, "failed: {}", reason),
            Self::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Outcome for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReport {
    pub source: SourceDescriptor,
    pub outcome: SourceOutcome,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct ReindexReport {
    /// The (possibly coalesced) scope that was serviced.
    pub scope: ReindexScope,
    /// Per-source outcomes in priority order.
    pub sources: Vec<SourceReport>,
    /// Consumers in the published index.
    pub consumers: usize,
    /// Images in the published index.
    pub total_images: usize,
    /// Legacy listing written by this run, if any.
    pub legacy_listing: Option<PathBuf>,
    pub duration: Duration,
}

impl ReindexReport {
    /// Sources that hit an error.
    pub fn failures(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|s| s.outcome.is_failure())
    }

    /// Check if any source hit an error.
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Number of sources rescanned.
    pub fn scanned_count(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.outcome.was_scanned())
            .count()
    }

    /// Outcome recorded for a root.
    pub fn outcome_for(&self, root: &std::path::Path) -> Option<&SourceOutcome> {
        self.sources
            .iter()
            .find(|s| s.source.same_root(root))
            .map(|s| &s.outcome)
    }
}
