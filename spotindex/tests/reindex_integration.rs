//! End-to-end tests for the reindex pipeline: scanning real folders,
//! snapshot caching, merging and publishing through the engine.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use spotindex::config::EngineConfig;
use spotindex::engine::Engine;
use spotindex::reindex::SourceOutcome;
use spotindex::IndexError;
use tempfile::TempDir;

struct Fixture {
    _temp: TempDir,
    primary: PathBuf,
    share: PathBuf,
    snapshots: PathBuf,
    list_file: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let primary = temp.path().join("primary");
        let share = temp.path().join("share");
        fs::create_dir_all(&primary).unwrap();
        fs::create_dir_all(&share).unwrap();

        Self {
            primary,
            share,
            snapshots: temp.path().join("snapshots"),
            list_file: temp.path().join("sources.json"),
            _temp: temp,
        }
    }

    fn config(&self) -> EngineConfig {
        EngineConfig::new(&self.primary, &self.snapshots).with_source_list(&self.list_file)
    }

    fn start(&self) -> Engine {
        let engine = Engine::start(self.config()).unwrap();
        engine.registry().add_secondary(&self.share).unwrap();
        engine
    }
}

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"jpeg").unwrap();
    path
}

#[tokio::test]
async fn test_primary_paths_come_first_for_shared_date() {
    let fx = Fixture::new();
    let a = touch(&fx.primary, "01012024AB123456123456789.jpg");
    let b = touch(&fx.share, "01012024CD654321123456789.jpg");

    let engine = fx.start();
    let report = engine.coordinator().trigger_full().wait().await.unwrap();
    assert!(!report.has_failures());
    assert_eq!(report.total_images, 2);

    let images = engine.facade().lookup("123456789").unwrap();
    assert_eq!(images.paths_for("01012024").unwrap(), &[a.clone(), b]);
    assert_eq!(
        engine.facade().representative_path("123456789", "01012024"),
        Some(a)
    );
    assert_eq!(images.device_code(), "AB123456");

    engine.shutdown().await;
}

#[tokio::test]
async fn test_unknown_consumer_is_not_found() {
    let fx = Fixture::new();
    touch(&fx.primary, "01012024AB123456123456789.jpg");

    let engine = fx.start();
    engine.coordinator().trigger_full().wait().await.unwrap();

    assert!(engine.facade().lookup("000000000").is_none());
    let err = engine.facade().consumer_record("000000000").unwrap_err();
    assert!(matches!(err, IndexError::NotFound(ref id) if id == "000000000"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_vanished_secondary_drops_out_of_next_merge() {
    let fx = Fixture::new();
    touch(&fx.primary, "01012024AB123456123456789.jpg");
    touch(&fx.share, "02012024CD654321123456789.jpg");
    touch(&fx.share, "02012024CD654321987654321.jpg");

    let engine = fx.start();
    engine.coordinator().trigger_full().wait().await.unwrap();
    assert_eq!(engine.facade().total_image_count(), 3);

    fs::remove_dir_all(&fx.share).unwrap();
    let report = engine.coordinator().trigger_merge().wait().await.unwrap();

    assert_eq!(
        report.outcome_for(&fx.share),
        Some(&SourceOutcome::Unavailable)
    );
    assert_eq!(engine.facade().total_image_count(), 1);
    assert!(engine.facade().lookup("987654321").is_none());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_monitor_notices_removed_share() {
    let fx = Fixture::new();
    touch(&fx.primary, "01012024AB123456123456789.jpg");
    touch(&fx.share, "02012024CD654321987654321.jpg");

    let mut engine =
        Engine::start(fx.config().with_probe_interval(Duration::from_millis(20))).unwrap();
    engine.registry().add_secondary(&fx.share).unwrap();
    engine.coordinator().trigger_full().wait().await.unwrap();
    assert_eq!(engine.facade().total_image_count(), 2);

    engine.start_monitor();
    fs::remove_dir_all(&fx.share).unwrap();

    let mut published = engine.facade().subscribe();
    let dropped = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if engine.facade().total_image_count() == 1 {
                return;
            }
            if published.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    assert!(dropped.is_ok(), "monitor did not republish after removal");
    assert_eq!(engine.facade().total_image_count(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_truncated_snapshot_is_rebuilt() {
    let fx = Fixture::new();
    touch(&fx.primary, "01012024AB123456123456789.jpg");
    touch(&fx.share, "02012024CD654321987654321.jpg");

    let engine = fx.start();
    engine.coordinator().trigger_full().wait().await.unwrap();

    let share = engine.registry().find(&fx.share).unwrap();
    let slot = engine.cache().slot_path(&share);
    let bytes = fs::read(&slot).unwrap();
    fs::write(&slot, &bytes[..bytes.len() / 2]).unwrap();
    assert!(engine.cache().load(&share).is_none());

    let report = engine.coordinator().trigger_merge().wait().await.unwrap();
    assert!(!report.has_failures());
    assert!(report.outcome_for(&fx.share).unwrap().was_scanned());
    assert_eq!(engine.facade().total_image_count(), 2);

    let rebuilt = engine.cache().load(&share).unwrap();
    assert_eq!(rebuilt.image_count(), 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_restart_merges_from_snapshots() {
    let fx = Fixture::new();
    touch(&fx.primary, "01012024AB123456123456789.jpg");
    touch(&fx.share, "02012024CD654321987654321.jpg");

    let engine = fx.start();
    engine.coordinator().trigger_full().wait().await.unwrap();
    engine.shutdown().await;

    // New files are invisible until a rescan; the restart uses snapshots.
    touch(&fx.share, "03012024CD654321555555555.jpg");

    let engine = Engine::start(fx.config()).unwrap();
    assert_eq!(engine.registry().secondaries().len(), 1);
    let report = engine.coordinator().trigger_merge().wait().await.unwrap();

    assert_eq!(report.scanned_count(), 0);
    assert_eq!(engine.facade().total_image_count(), 2);
    assert!(engine.facade().lookup("555555555").is_none());

    let share = engine.registry().find(&fx.share).unwrap();
    engine.coordinator().trigger_for_source(&share).wait().await.unwrap();
    assert_eq!(engine.facade().total_image_count(), 3);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_burst_of_requests_is_coalesced() {
    let fx = Fixture::new();
    touch(&fx.primary, "01012024AB123456123456789.jpg");

    let engine = fx.start();
    let tickets: Vec<_> = (0..5)
        .map(|_| engine.coordinator().trigger_full())
        .collect();

    for ticket in tickets {
        let report = ticket.wait().await.unwrap();
        assert_eq!(report.total_images, 1);
    }
    assert!(engine.coordinator().completed_runs() <= 2);

    engine.shutdown().await;
}
