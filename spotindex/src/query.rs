//! Read-only queries against the published merged index.
//!
//! The [`QueryFacade`] owns the single shared resource of the engine: the
//! reference to the current [`MergedIndex`]. Publishing swaps that
//! reference in one step, so a reader holding an older snapshot keeps a
//! complete, consistent index until it drops it, and never sees a partial
//! one.
//!
//! Every query clones what it returns out of the snapshot, which keeps
//! results valid across a concurrent publish.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::error::{IndexError, IndexResult};
use crate::filename::{is_valid_consumer_id, CaptureDate};
use crate::index::{ConsumerImages, MergedIndex};
use crate::meter::ConsumerMeterMap;

/// Previews returned by [`QueryFacade::latest`] by default.
pub const DEFAULT_LATEST_LIMIT: usize = 5;

/// Images of one capture date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateImages {
    pub date: CaptureDate,
    pub paths: Vec<PathBuf>,
}

/// A consumer as presented to front ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerRecord {
    pub consumer_id: String,
    pub device_code: String,
    pub meter_number: Option<String>,
    /// Newest date first; unparsable dates last.
    pub dates: Vec<DateImages>,
    pub image_count: usize,
}

impl ConsumerRecord {
    fn from_images(
        consumer_id: &str,
        images: &ConsumerImages,
        meter_number: Option<String>,
    ) -> Self {
        Self {
            consumer_id: consumer_id.to_string(),
            device_code: images.device_code().to_string(),
            meter_number,
            dates: images
                .dates_newest_first()
                .map(|(date, paths)| DateImages {
                    date: date.clone(),
                    paths: paths.to_vec(),
                })
                .collect(),
            image_count: images.image_count(),
        }
    }
}

struct FacadeInner {
    current: watch::Sender<Arc<MergedIndex>>,
    generation: AtomicU64,
    meters: Option<Arc<ConsumerMeterMap>>,
}

/// Cheaply cloneable handle to the published index.
#[derive(Clone)]
pub struct QueryFacade {
    inner: Arc<FacadeInner>,
}

impl Default for QueryFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for QueryFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryFacade")
            .field("generation", &self.generation())
            .field("has_meter_map", &self.inner.meters.is_some())
            .finish()
    }
}

impl QueryFacade {
    /// Create a facade serving an empty index.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create a facade that can resolve meter numbers.
    pub fn with_meter_map(meters: ConsumerMeterMap) -> Self {
        Self::build(Some(Arc::new(meters)))
    }

    fn build(meters: Option<Arc<ConsumerMeterMap>>) -> Self {
        let (current, _) = watch::channel(Arc::new(MergedIndex::default()));
        Self {
            inner: Arc::new(FacadeInner {
                current,
                generation: AtomicU64::new(0),
                meters,
            }),
        }
    }

    /// Replace the published index.
    ///
    /// Readers holding the previous snapshot are unaffected; subscribers are
    /// notified.
    pub fn publish(&self, index: Arc<MergedIndex>) {
        let images = index.total_image_count();
        let consumers = index.consumer_count();
        self.inner.current.send_replace(index);
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        info!(generation, consumers, images, "Published merged index");
    }

    /// The current index.
    pub fn snapshot(&self) -> Arc<MergedIndex> {
        Arc::clone(&self.inner.current.borrow())
    }

    /// Receive a notification every time a new index is published.
    pub fn subscribe(&self) -> watch::Receiver<Arc<MergedIndex>> {
        self.inner.current.subscribe()
    }

    /// Number of indices published so far.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Whether any index has been published yet.
    pub fn has_index(&self) -> bool {
        self.generation() > 0
    }

    /// The meter mapping, if one was loaded.
    pub fn meter_map(&self) -> Option<&ConsumerMeterMap> {
        self.inner.meters.as_deref()
    }

    /// Exact lookup of a consumer id.
    pub fn lookup(&self, consumer_id: &str) -> Option<ConsumerImages> {
        self.snapshot().lookup(consumer_id).cloned()
    }

    /// Sum of all path-list lengths in the current index.
    pub fn total_image_count(&self) -> usize {
        self.snapshot().total_image_count()
    }

    /// Front path for a consumer and raw `DDMMYYYY` date.
    pub fn representative_path(&self, consumer_id: &str, date: &str) -> Option<PathBuf> {
        self.snapshot()
            .representative_path(consumer_id, date)
            .map(|p| p.to_path_buf())
    }

    /// Consumer ids starting with `prefix` and their image counts, at most
    /// `limit` of them.
    pub fn lookup_prefix(&self, prefix: &str, limit: usize) -> Vec<(String, usize)> {
        self.snapshot()
            .lookup_prefix(prefix)
            .take(limit)
            .map(|(id, images)| (id.to_string(), images.image_count()))
            .collect()
    }

    /// Validated lookup returning the presentation record.
    pub fn consumer_record(&self, consumer_id: &str) -> IndexResult<ConsumerRecord> {
        let consumer_id = consumer_id.trim();
        if !is_valid_consumer_id(consumer_id) {
            return Err(IndexError::InvalidConsumerId(consumer_id.to_string()));
        }

        let snapshot = self.snapshot();
        let images = snapshot.lookup(consumer_id).ok_or_else(|| {
            debug!(consumer_id, "Consumer not in index");
            IndexError::NotFound(consumer_id.to_string())
        })?;

        let meter = self
            .meter_map()
            .and_then(|m| m.meter_for(consumer_id))
            .map(str::to_string);

        Ok(ConsumerRecord::from_images(consumer_id, images, meter))
    }

    /// The `limit` most recent images of a consumer, newest first.
    pub fn latest(
        &self,
        consumer_id: &str,
        limit: usize,
    ) -> IndexResult<Vec<(CaptureDate, PathBuf)>> {
        let snapshot = self.snapshot();
        let images = snapshot
            .lookup(consumer_id)
            .ok_or_else(|| IndexError::NotFound(consumer_id.to_string()))?;

        Ok(images
            .latest(limit)
            .into_iter()
            .map(|(date, path)| (date.clone(), path.to_path_buf()))
            .collect())
    }

    /// Resolve a meter number to its consumer and return the record.
    ///
    /// Fails with `NotFound` when no meter map is loaded, the meter is
    /// unknown, or the consumer has no images.
    pub fn lookup_by_meter(&self, meter: &str) -> IndexResult<ConsumerRecord> {
        let consumer_id = self
            .meter_map()
            .and_then(|m| m.consumer_for_meter(meter))
            .ok_or_else(|| IndexError::NotFound(meter.trim().to_string()))?
            .to_string();

        self.consumer_record(&consumer_id)
    }
}
