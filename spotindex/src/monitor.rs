//! Source availability monitoring.
//!
//! Secondary sources usually live on network shares that come and go. The
//! [`AvailabilityMonitor`] probes every configured source root on a fixed
//! interval and emits a [`TopologyChange`] whenever the set of reachable
//! sources differs from the one it last recorded. It never rebuilds
//! anything itself; a consumer (normally the reindex coordinator) decides
//! what to do with the event.
//!
//! # Thread Safety
//!
//! Probing can block for a long time on a dead network mount, so the
//! background task runs each tick on the blocking pool.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::source::{SourceDescriptor, SourceRegistry};

/// Default probe interval.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(3);

/// Decides whether a source root is currently reachable.
///
/// Implementations must be cheap enough to call for every source on every
/// tick. Only existence is checked, never folder contents.
pub trait PathProbe: Send + Sync {
    /// Check whether `root` currently resolves.
    fn is_reachable(&self, root: &Path) -> bool;
}

/// Probe using the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsProbe;

impl PathProbe for FsProbe {
    fn is_reachable(&self, root: &Path) -> bool {
        root.exists()
    }
}

/// A change in which configured sources are reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyChange {
    /// Sources reachable now that weren't at the previous tick.
    pub became_available: Vec<SourceDescriptor>,
    /// Sources reachable at the previous tick that no longer are (including
    /// sources removed from the configuration).
    pub became_unavailable: Vec<SourceDescriptor>,
    /// All reachable sources, in priority order.
    pub reachable: Vec<SourceDescriptor>,
}

/// Periodic prober of configured sources.
///
/// The recorded set starts empty, so the first tick reports every reachable
/// source as newly available.
pub struct AvailabilityMonitor {
    registry: SourceRegistry,
    probe: Arc<dyn PathProbe>,
    recorded: Vec<SourceDescriptor>,
}

impl AvailabilityMonitor {
    /// Create a monitor over the registry's sources using the given probe.
    pub fn new(registry: SourceRegistry, probe: Arc<dyn PathProbe>) -> Self {
        Self {
            registry,
            probe,
            recorded: Vec::new(),
        }
    }

    /// Create a monitor using [`FsProbe`].
    pub fn with_fs_probe(registry: SourceRegistry) -> Self {
        Self::new(registry, Arc::new(FsProbe))
    }

    /// Sources considered reachable as of the last tick, in priority order.
    pub fn reachable(&self) -> &[SourceDescriptor] {
        &self.recorded
    }

    /// Probe every configured source once.
    ///
    /// Returns the change if the reachable set differs from the recorded
    /// one; the recorded set is updated before returning.
    pub fn tick(&mut self) -> Option<TopologyChange> {
        let reachable: Vec<SourceDescriptor> = self
            .registry
            .ordered()
            .into_iter()
            .filter(|source| self.probe.is_reachable(source.root()))
            .collect();

        let now: BTreeSet<PathBuf> = roots(&reachable);
        let before: BTreeSet<PathBuf> = roots(&self.recorded);
        if now == before {
            return None;
        }

        let became_available = reachable
            .iter()
            .filter(|s| !before.contains(s.root()))
            .cloned()
            .collect();
        let became_unavailable = self
            .recorded
            .iter()
            .filter(|s| !now.contains(s.root()))
            .cloned()
            .collect();

        self.recorded = reachable.clone();

        Some(TopologyChange {
            became_available,
            became_unavailable,
            reachable,
        })
    }

    /// Run the monitor on a background task until cancelled.
    ///
    /// Every change is sent on `events`; the task stops when the token is
    /// cancelled or the receiver is dropped.
    pub fn spawn(
        self,
        interval: Duration,
        events: mpsc::Sender<TopologyChange>,
        cancellation: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut monitor = self;
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;

                    _ = cancellation.cancelled() => {
                        debug!("Availability monitor cancelled");
                        break;
                    }

                    _ = ticker.tick() => {}
                }

                let probed = tokio::task::spawn_blocking(move || {
                    let change = monitor.tick();
                    (monitor, change)
                })
                .await;

                let change = match probed {
                    Ok((returned, change)) => {
                        monitor = returned;
                        change
                    }
                    Err(e) => {
                        warn!(error = %e, "Availability probe task failed");
                        break;
                    }
                };

                let Some(change) = change else {
                    continue;
                };

                info!(
                    available = change.became_available.len(),
                    unavailable = change.became_unavailable.len(),
                    reachable = change.reachable.len(),
                    "Source topology changed"
                );

                if events.send(change).await.is_err() {
                    debug!("Topology receiver dropped, stopping monitor");
                    break;
                }
            }
        })
    }
}

fn roots(sources: &[SourceDescriptor]) -> BTreeSet<PathBuf> {
    sources.iter().map(|s| s.root().to_path_buf()).collect()
}
