//! Engine bootstrap.
//!
//! [`Engine`] wires the pieces together in the right order: the source
//! registry and snapshot cache first, then the query facade (with the meter
//! mapping if one is configured), then the reindex worker. The availability
//! monitor is optional and started separately, since one-shot front ends
//! don't need it.
//!
//! # Example
//!
//! ```ignore
//! use spotindex::config::EngineConfig;
//! use spotindex::engine::Engine;
//!
//! let engine = Engine::start(EngineConfig::new("/data/images", "/data/snapshots"))?;
//! engine.coordinator().trigger_merge().wait().await;
//! let count = engine.facade().total_image_count();
//! engine.shutdown().await;
//! ```

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::IndexResult;
use crate::index::SnapshotCache;
use crate::meter::ConsumerMeterMap;
use crate::monitor::AvailabilityMonitor;
use crate::query::QueryFacade;
use crate::reindex::ReindexCoordinator;
use crate::source::SourceRegistry;

/// Capacity of the monitor to coordinator channel.
const TOPOLOGY_CHANNEL_CAPACITY: usize = 16;

/// A running index engine.
pub struct Engine {
    registry: SourceRegistry,
    cache: SnapshotCache,
    facade: QueryFacade,
    coordinator: ReindexCoordinator,
    probe_interval: Duration,
    cancellation: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Start the engine on the current tokio runtime.
    ///
    /// Nothing is indexed until a reindex is requested.
    pub fn start(config: EngineConfig) -> IndexResult<Self> {
        let registry = match &config.source_list {
            Some(list) => SourceRegistry::with_list_file(&config.primary, list)?,
            None => SourceRegistry::new(&config.primary),
        };
        let cache = SnapshotCache::new(&config.cache_dir);

        let facade = match config
            .meter_mapping
            .as_deref()
            .and_then(ConsumerMeterMap::load_optional)
        {
            Some(meters) => QueryFacade::with_meter_map(meters),
            None => QueryFacade::new(),
        };

        let cancellation = CancellationToken::new();
        let (coordinator, worker) = ReindexCoordinator::builder(registry.clone(), cache.clone())
            .facade(facade.clone())
            .legacy_listing(config.legacy_listing.clone())
            .spawn(cancellation.child_token());

        info!(
            primary = %registry.primary(),
            secondaries = registry.secondaries().len(),
            cache = %cache.dir().display(),
            "Engine started"
        );

        Ok(Self {
            registry,
            cache,
            facade,
            coordinator,
            probe_interval: config.probe_interval,
            cancellation,
            tasks: vec![worker],
        })
    }

    /// Start probing sources and re-merging on topology changes.
    pub fn start_monitor(&mut self) {
        let (tx, rx) = mpsc::channel(TOPOLOGY_CHANNEL_CAPACITY);
        let monitor = AvailabilityMonitor::with_fs_probe(self.registry.clone());

        let probe = monitor.spawn(self.probe_interval, tx, self.cancellation.child_token());
        let bridge = self
            .coordinator
            .watch_topology(rx, self.cancellation.child_token());
        self.tasks.push(probe);
        self.tasks.push(bridge);

        info!(
            interval_secs = self.probe_interval.as_secs(),
            "Availability monitor started"
        );
    }

    /// The configured sources.
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// The snapshot cache.
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Read access to the published index.
    pub fn facade(&self) -> &QueryFacade {
        &self.facade
    }

    /// The reindex worker.
    pub fn coordinator(&self) -> &ReindexCoordinator {
        &self.coordinator
    }

    /// Stop all background tasks. A run in progress completes first.
    pub async fn shutdown(self) {
        self.cancellation.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Engine task ended abnormally");
            }
        }
        info!("Engine stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_start_index_and_shutdown() {
        let temp = TempDir::new().unwrap();
        let primary = temp.path().join("images");
        std::fs::create_dir_all(&primary).unwrap();
        std::fs::write(primary.join("01012024AB123456123456789.jpg"), b"").unwrap();
        let meters = temp.path().join("meter_mapping.json");
        std::fs::write(&meters, r#"{"123456789": {"meter_no": "M-1"}}"#).unwrap();

        let config = EngineConfig::new(&primary, temp.path().join("snapshots"))
            .with_source_list(temp.path().join("sources.json"))
            .with_meter_mapping(&meters);
        let engine = Engine::start(config).unwrap();

        let report = engine.coordinator().trigger_full().wait().await.unwrap();
        assert_eq!(report.total_images, 1);

        let record = engine.facade().lookup_by_meter("m-1").unwrap();
        assert_eq!(record.consumer_id, "123456789");

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn test_monitor_publishes_without_explicit_request() {
        let temp = TempDir::new().unwrap();
        let primary = temp.path().join("images");
        std::fs::create_dir_all(&primary).unwrap();
        std::fs::write(primary.join("01012024AB123456123456789.jpg"), b"").unwrap();

        let config = EngineConfig::new(&primary, temp.path().join("snapshots"))
            .with_probe_interval(Duration::from_millis(20));
        let mut engine = Engine::start(config).unwrap();
        let mut published = engine.facade().subscribe();

        engine.start_monitor();

        tokio::time::timeout(Duration::from_secs(10), published.changed())
            .await
            .expect("monitor should trigger a publish")
            .unwrap();
        assert_eq!(engine.facade().total_image_count(), 1);

        engine.shutdown().await;
    }
}
