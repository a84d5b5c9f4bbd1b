//! Progress reporting for reindex runs.
//!
//! Listing and index building run on several rayon threads at once; each
//! adds its processed entries to a shared atomic counter and emits the
//! aggregate. Emitted values never decrease within one counter.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use tokio::sync::broadcast;

use super::ReindexEvent;

/// Progress of the scanning phase.
///
/// `total` is the number of directory entries across every source being
/// scanned. A total of zero means the amount of work is unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanProgress {
    pub processed: usize,
    pub total: usize,
}

impl ScanProgress {
    /// Check if the total is unknown.
    pub fn is_indeterminate(&self) -> bool {
        self.total == 0
    }

    /// Completed fraction in `0.0..=1.0`, if the total is known.
    pub fn fraction(&self) -> Option<f64> {
        if self.is_indeterminate() {
            return None;
        }
        Some((self.processed.min(self.total) as f64) / (self.total as f64))
    }
}

/// Shared progress counter for one phase of a run.
///
/// A counter created with a total of zero reports indeterminate progress,
/// used while directories are still being listed.
#[derive(Debug)]
pub(crate) struct ProgressCounter<'a> {
    processed: AtomicUsize,
    total: usize,
    last_sent: Mutex<Option<usize>>,
    events: &'a broadcast::Sender<ReindexEvent>,
}

impl<'a> ProgressCounter<'a> {
    pub(crate) fn new(total: usize, events: &'a broadcast::Sender<ReindexEvent>) -> Self {
        Self {
            processed: AtomicUsize::new(0),
            total,
            last_sent: Mutex::new(None),
            events,
        }
    }

    /// Emit the current state without advancing.
    pub(crate) fn report(&self) {
        self.emit(self.processed.load(Ordering::SeqCst));
    }

    /// Record `entries` more processed entries and emit the new total.
    pub(crate) fn advance(&self, entries: usize) {
        let processed = self.processed.fetch_add(entries, Ordering::SeqCst) + entries;
        self.emit(processed);
    }

    pub(crate) fn processed(&self) -> usize {
        self.processed.load(Ordering::SeqCst)
    }

    fn emit(&self, processed: usize) {
        // Held across the send so a slower thread can't publish a stale count.
        let mut last_sent = self.last_sent.lock();
        if last_sent.is_some_and(|last| processed <= last) {
            return;
        }
        *last_sent = Some(processed);

        // No subscribers is fine; progress is advisory.
        let _ = self.events.send(ReindexEvent::Progress(ScanProgress {
            processed,
            total: self.total,
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fraction() {
        let progress = ScanProgress {
            processed: 25,
            total: 100,
        };
        assert_eq!(progress.fraction(), Some(0.25));
        assert!(!progress.is_indeterminate());

        let unknown = ScanProgress::default();
        assert!(unknown.is_indeterminate());
        assert_eq!(unknown.fraction(), None);
    }

    #[test]
    fn test_counter_emits_running_total() {
        let (tx, mut rx) = broadcast::channel(16);
        let counter = ProgressCounter::new(10, &tx);

        counter.report();
        counter.advance(4);
        counter.advance(6);
        assert_eq!(counter.processed(), 10);

        let mut seen = Vec::new();
        while let Ok(ReindexEvent::Progress(p)) = rx.try_recv() {
            seen.push(p.processed);
        }
        assert_eq!(seen, vec![0, 4, 10]);
    }

    #[test]
    fn test_parallel_advances_never_go_backwards() {
        use rayon::prelude::*;

        let (tx, mut rx) = broadcast::channel(4096);
        let counter = ProgressCounter::new(2000, &tx);

        (0..2000).into_par_iter().for_each(|_| counter.advance(1));
        assert_eq!(counter.processed(), 2000);

        let mut seen = Vec::new();
        while let Ok(ReindexEvent::Progress(p)) = rx.try_recv() {
            seen.push(p.processed);
        }
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(seen.last(), Some(&2000));
    }

    #[test]
    fn test_zero_total_counter_is_indeterminate() {
        let (tx, mut rx) = broadcast::channel(16);
        let counter = ProgressCounter::new(0, &tx);

        counter.report();
        counter.advance(3);

        let mut seen = Vec::new();
        while let Ok(ReindexEvent::Progress(p)) = rx.try_recv() {
            seen.push(p);
        }
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(ScanProgress::is_indeterminate));
        assert_eq!(seen[1].processed, 3);
    }
}
