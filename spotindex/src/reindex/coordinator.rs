//! Reindex worker and its request queue.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::IndexResult;
use crate::index::{
    merge_indices, write_listing, FsScanner, SnapshotCache, SourceIndex, SourceListing,
    SourceScanner,
};
use crate::monitor::{FsProbe, PathProbe, TopologyChange};
use crate::query::QueryFacade;
use crate::source::{SourceDescriptor, SourceRegistry};

use super::progress::ProgressCounter;
use super::report::{ReindexReport, SourceOutcome, SourceReport};
use super::{ReindexEvent, ReindexPhase, ReindexScope, ReindexTicket};

/// Default capacity of the event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Builder for [`ReindexCoordinator`].
pub struct CoordinatorBuilder {
    registry: SourceRegistry,
    cache: SnapshotCache,
    facade: QueryFacade,
    scanner: Arc<dyn SourceScanner>,
    probe: Arc<dyn PathProbe>,
    legacy_listing: Option<PathBuf>,
    event_capacity: usize,
}

impl CoordinatorBuilder {
    /// Start from the sources to index and where their snapshots live.
    pub fn new(registry: SourceRegistry, cache: SnapshotCache) -> Self {
        Self {
            registry,
            cache,
            facade: QueryFacade::new(),
            scanner: Arc::new(FsScanner),
            probe: Arc::new(FsProbe),
            legacy_listing: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }

    /// Publish into an existing facade.
    pub fn facade(mut self, facade: QueryFacade) -> Self {
        self.facade = facade;
        self
    }

    /// Replace the folder scanner.
    pub fn scanner(mut self, scanner: Arc<dyn SourceScanner>) -> Self {
        self.scanner = scanner;
        self
    }

    /// Replace the reachability probe.
    pub fn probe(mut self, probe: Arc<dyn PathProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Regenerate a legacy listing file on every full run.
    pub fn legacy_listing(mut self, path: Option<PathBuf>) -> Self {
        self.legacy_listing = path;
        self
    }

    /// Set the event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Start the worker on the current tokio runtime.
    ///
    /// The worker exits when `cancellation` fires; a run in flight finishes
    /// first.
    pub fn spawn(self, cancellation: CancellationToken) -> (ReindexCoordinator, JoinHandle<()>) {
        let (events, _) = broadcast::channel(self.event_capacity);
        let shared = Arc::new(Shared {
            registry: self.registry,
            cache: self.cache,
            facade: self.facade,
            scanner: self.scanner,
            probe: self.probe,
            legacy_listing: self.legacy_listing,
            pending: Mutex::new(Pending::default()),
            wake: Notify::new(),
            phase: Mutex::new(ReindexPhase::Idle),
            events,
            completed_runs: AtomicU64::new(0),
            last_report: Mutex::new(None),
        });

        let worker = tokio::spawn(worker_loop(Arc::clone(&shared), cancellation));
        (ReindexCoordinator { shared }, worker)
    }
}

/// Request queue shared between handles and the worker.
#[derive(Default)]
struct Pending {
    request: Option<PendingRequest>,
    stopped: bool,
}

/// Requests folded together while a run is active.
struct PendingRequest {
    scope: ReindexScope,
    waiters: Vec<oneshot::Sender<Arc<ReindexReport>>>,
}

struct Shared {
    registry: SourceRegistry,
    cache: SnapshotCache,
    facade: QueryFacade,
    scanner: Arc<dyn SourceScanner>,
    probe: Arc<dyn PathProbe>,
    legacy_listing: Option<PathBuf>,
    pending: Mutex<Pending>,
    wake: Notify,
    phase: Mutex<ReindexPhase>,
    events: broadcast::Sender<ReindexEvent>,
    completed_runs: AtomicU64,
    last_report: Mutex<Option<Arc<ReindexReport>>>,
}

/// How a source takes part in a run.
enum SourcePlan {
    Unavailable,
    Cached(SourceIndex),
    Scan,
}

enum ScanResult {
    Built {
        listing: SourceListing,
        index: SourceIndex,
        cache_error: Option<String>,
    },
    Failed(String),
}

/// Handle to the reindex worker.
///
/// Cloning is cheap; all clones feed the same worker.
#[derive(Clone)]
pub struct ReindexCoordinator {
    shared: Arc<Shared>,
}

impl ReindexCoordinator {
    /// Start building a coordinator.
    pub fn builder(registry: SourceRegistry, cache: SnapshotCache) -> CoordinatorBuilder {
        CoordinatorBuilder::new(registry, cache)
    }

    /// Rescan every reachable source, then merge and publish.
    pub fn trigger_full(&self) -> ReindexTicket {
        self.request(ReindexScope::Full)
    }

    /// Rescan one source, then merge with the snapshots of the others.
    pub fn trigger_for_source(&self, source: &SourceDescriptor) -> ReindexTicket {
        self.request(ReindexScope::source(source.root()))
    }

    /// Re-merge from snapshots, rescanning only sources without one.
    pub fn trigger_merge(&self) -> ReindexTicket {
        self.request(ReindexScope::Merge)
    }

    /// React to a change in source availability.
    pub fn on_topology_change(&self, change: &TopologyChange) -> ReindexTicket {
        debug!(
            available = change.became_available.len(),
            unavailable = change.became_unavailable.len(),
            "Topology changed, scheduling re-merge"
        );
        self.trigger_merge()
    }

    /// Queue a request, coalescing with one already pending.
    pub fn request(&self, scope: ReindexScope) -> ReindexTicket {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock();
            if pending.stopped {
                debug!("Reindex worker stopped, request dropped");
                return ReindexTicket::new(rx);
            }
            match pending.request.as_mut() {
                Some(request) => {
                    let current = std::mem::replace(&mut request.scope, ReindexScope::Merge);
                    request.scope = current.absorb(scope);
                    request.waiters.push(tx);
                    debug!(scope = %request.scope, "Coalesced reindex request");
                }
                None => {
                    pending.request = Some(PendingRequest {
                        scope,
                        waiters: vec![tx],
                    });
                }
            }
        }
        self.shared.wake.notify_one();
        ReindexTicket::new(rx)
    }

    /// Forward topology changes from a monitor until cancelled.
    pub fn watch_topology(
        &self,
        mut changes: mpsc::Receiver<TopologyChange>,
        cancellation: CancellationToken,
    ) -> JoinHandle<()> {
        let coordinator = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;

                    _ = cancellation.cancelled() => break,

                    change = changes.recv() => match change {
                        Some(change) => {
                            // The ticket is not awaited; the publish event reports completion.
                            let _ = coordinator.on_topology_change(&change);
                        }
                        None => break,
                    },
                }
            }
        })
    }

    /// Subscribe to phase, progress and publish events.
    pub fn subscribe(&self) -> broadcast::Receiver<ReindexEvent> {
        self.shared.events.subscribe()
    }

    /// Current phase.
    pub fn phase(&self) -> ReindexPhase {
        *self.shared.phase.lock()
    }

    /// Runs finished since start.
    pub fn completed_runs(&self) -> u64 {
        self.shared.completed_runs.load(Ordering::SeqCst)
    }

    /// Report of the most recent run.
    pub fn last_report(&self) -> Option<Arc<ReindexReport>> {
        self.shared.last_report.lock().clone()
    }

    /// The facade runs publish into.
    pub fn facade(&self) -> &QueryFacade {
        &self.shared.facade
    }

    /// The configured sources.
    pub fn registry(&self) -> &SourceRegistry {
        &self.shared.registry
    }

    /// The snapshot cache.
    pub fn cache(&self) -> &SnapshotCache {
        &self.shared.cache
    }
}

async fn worker_loop(shared: Arc<Shared>, cancellation: CancellationToken) {
    debug!("Reindex worker started");

    loop {
        let request = tokio::select! {
            biased;

            _ = cancellation.cancelled() => break,

            request = shared.next_request() => request,
        };

        let PendingRequest { scope, waiters } = request;
        let run_shared = Arc::clone(&shared);
        let result = tokio::task::spawn_blocking(move || run_shared.run(scope)).await;

        match result {
            Ok(report) => {
                let report = Arc::new(report);
                shared.completed_runs.fetch_add(1, Ordering::SeqCst);
                *shared.last_report.lock() = Some(Arc::clone(&report));
                let _ = shared
                    .events
                    .send(ReindexEvent::Published(Arc::clone(&report)));
                for waiter in waiters {
                    let _ = waiter.send(Arc::clone(&report));
                }
            }
            Err(e) => {
                // Waiters are dropped and observe `None`.
                error!(error = %e, "Reindex run panicked");
                shared.set_phase(ReindexPhase::Idle);
            }
        }
    }

    let mut pending = shared.pending.lock();
    pending.stopped = true;
    pending.request = None;
    debug!("Reindex worker stopped");
}

impl Shared {
    async fn next_request(&self) -> PendingRequest {
        loop {
            let next = self.pending.lock().request.take();
            if let Some(request) = next {
                return request;
            }
            self.wake.notified().await;
        }
    }

    fn set_phase(&self, phase: ReindexPhase) {
        *self.phase.lock() = phase;
        let _ = self.events.send(ReindexEvent::PhaseChanged(phase));
    }

    /// Execute one run. Blocking; called on the blocking pool.
    fn run(&self, scope: ReindexScope) -> ReindexReport {
        let started = Instant::now();
        let sources = self.registry.ordered();
        info!(scope = %scope, sources = sources.len(), "Reindex started");

        self.set_phase(ReindexPhase::Scanning);
        let plans: Vec<(SourceDescriptor, SourcePlan)> = sources
            .into_iter()
            .map(|source| {
                let plan = self.plan(&source, &scope);
                (source, plan)
            })
            .collect();

        let to_scan: Vec<&SourceDescriptor> = plans
            .iter()
            .filter(|(_, plan)| matches!(plan, SourcePlan::Scan))
            .map(|(source, _)| source)
            .collect();

        // Entry counts are unknown until every listing is back.
        let listed = ProgressCounter::new(0, &self.events);
        listed.report();
        let listings: Vec<IndexResult<SourceListing>> = to_scan
            .par_iter()
            .map(|source| {
                let listing = self.scanner.list(source);
                if let Ok(listing) = &listing {
                    listed.advance(listing.len());
                }
                listing
            })
            .collect();

        let total = listings
            .iter()
            .filter_map(|listing| listing.as_ref().ok())
            .map(SourceListing::len)
            .sum();
        let progress = ProgressCounter::new(total, &self.events);
        progress.report();

        let results: Vec<ScanResult> = listings
            .into_par_iter()
            .map(|listing| self.build(listing, &progress))
            .collect();

        debug!(
            processed = progress.processed(),
            total, "Scanning finished"
        );

        let mut results = results.into_iter();
        let mut reports = Vec::with_capacity(plans.len());
        let mut contributions: Vec<(SourceDescriptor, SourceIndex)> = Vec::new();
        let mut fresh_listings = Vec::new();

        for (source, plan) in plans {
            let outcome = match plan {
                SourcePlan::Unavailable => SourceOutcome::Unavailable,
                SourcePlan::Cached(index) => {
                    let images = index.image_count();
                    contributions.push((source.clone(), index));
                    SourceOutcome::Cached { images }
                }
                SourcePlan::Scan => match results.next() {
                    Some(ScanResult::Built {
                        listing,
                        index,
                        cache_error,
                    }) => {
                        let entries = listing.len();
                        let images = index.image_count();
                        contributions.push((source.clone(), index));
                        fresh_listings.push(listing);
                        match cache_error {
                            None => SourceOutcome::Scanned { entries, images },
                            Some(reason) => SourceOutcome::ScannedUncached {
                                entries,
                                images,
                                reason,
                            },
                        }
                    }
                    Some(ScanResult::Failed(reason)) => {
                        let _ = self.events.send(ReindexEvent::SourceFailed {
                            root: source.root().to_path_buf(),
                            reason: reason.clone(),
                        });
                        contributions.push((source.clone(), SourceIndex::new(source.root())));
                        SourceOutcome::Failed { reason }
                    }
                    None => SourceOutcome::Failed {
                        reason: "scan result missing".to_string(),
                    },
                },
            };
            reports.push(SourceReport { source, outcome });
        }

        let legacy_listing = if scope.is_full() {
            self.write_legacy_listing(&fresh_listings)
        } else {
            None
        };

        self.set_phase(ReindexPhase::Merging);
        let merged = merge_indices(contributions.iter().map(|(source, index)| (source, index)));
        let consumers = merged.consumer_count();
        let total_images = merged.total_image_count();

        self.set_phase(ReindexPhase::Publishing);
        self.facade.publish(Arc::new(merged));

        let report = ReindexReport {
            scope,
            sources: reports,
            consumers,
            total_images,
            legacy_listing,
            duration: started.elapsed(),
        };

        let failures = report.failures().count();
        if failures > 0 {
            warn!(failures, "Reindex finished with source failures");
        }
        info!(
            scope = %report.scope,
            scanned = report.scanned_count(),
            consumers,
            images = total_images,
            elapsed_ms = report.duration.as_millis() as u64,
            "Reindex finished"
        );

        self.set_phase(ReindexPhase::Idle);
        report
    }

    fn plan(&self, source: &SourceDescriptor, scope: &ReindexScope) -> SourcePlan {
        if !self.probe.is_reachable(source.root()) {
            debug!(source = %source, "Source unreachable, excluded");
            return SourcePlan::Unavailable;
        }
        if scope.requires_scan(source.root()) {
            return SourcePlan::Scan;
        }

        match self.cache.try_load(source) {
            Ok(Some(index)) => {
                debug!(source = %source, images = index.image_count(), "Using snapshot");
                SourcePlan::Cached(index)
            }
            Ok(None) => {
                debug!(source = %source, "No snapshot, rescanning");
                SourcePlan::Scan
            }
            Err(e) => {
                warn!(source = %source, error = %e, "Unusable snapshot, rescanning");
                SourcePlan::Scan
            }
        }
    }

    fn build(
        &self,
        listing: IndexResult<SourceListing>,
        progress: &ProgressCounter<'_>,
    ) -> ScanResult {
        let listing = match listing {
            Ok(listing) => listing,
            Err(e) => {
                warn!(error = %e, "Source scan failed");
                return ScanResult::Failed(e.to_string());
            }
        };

        let index = listing.build_index_with_progress(|entries| progress.advance(entries));
        let cache_error = match self.cache.save(listing.source(), &index) {
            Ok(()) => None,
            Err(e) => {
                warn!(source = %listing.source(), error = %e, "Failed to save snapshot");
                Some(e.to_string())
            }
        };

        ScanResult::Built {
            listing,
            index,
            cache_error,
        }
    }

    fn write_legacy_listing(&self, listings: &[SourceListing]) -> Option<PathBuf> {
        let path = self.legacy_listing.as_ref()?;
        match write_listing(path, listings) {
            Ok(_) => Some(path.clone()),
            Err(e) => {
                warn!(error = %e, "Failed to write legacy listing");
                None
            }
        }
    }
}
