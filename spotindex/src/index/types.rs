//! Index data structures.
//!
//! Both the per-source [`SourceIndex`] and the [`MergedIndex`] map a consumer
//! id to a [`ConsumerImages`] record. Ordered maps are used throughout so an
//! index has exactly one serialized form: merging the same inputs twice
//! produces byte-identical snapshots.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::filename::{CaptureDate, ImageName};

/// All images known for one consumer, grouped by capture date.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerImages {
    device_code: String,
    dates: BTreeMap<CaptureDate, Vec<PathBuf>>,
}

impl ConsumerImages {
    /// Create an empty record with the given device code.
    pub fn new(device_code: impl Into<String>) -> Self {
        Self {
            device_code: device_code.into(),
            dates: BTreeMap::new(),
        }
    }

    /// Device (meter-reader) code for this consumer.
    pub fn device_code(&self) -> &str {
        &self.device_code
    }

    /// Paths per capture date, oldest date first, unparsable dates last.
    pub fn dates(&self) -> &BTreeMap<CaptureDate, Vec<PathBuf>> {
        &self.dates
    }

    /// Paths for a raw `DDMMYYYY` date.
    pub fn paths_for(&self, date: &str) -> Option<&[PathBuf]> {
        self.dates.get(&CaptureDate::new(date)).map(Vec::as_slice)
    }

    /// The preferred image for a date: the front of its path list.
    pub fn representative(&self, date: &str) -> Option<&Path> {
        self.paths_for(date)
            .and_then(|paths| paths.first())
            .map(PathBuf::as_path)
    }

    /// Number of image paths across all dates.
    pub fn image_count(&self) -> usize {
        self.dates.values().map(Vec::len).sum()
    }

    /// Dates newest first. Unparsable dates come last, in raw-string order.
    pub fn dates_newest_first(&self) -> impl Iterator<Item = (&CaptureDate, &[PathBuf])> {
        let parsed = self
            .dates
            .iter()
            .rev()
            .filter(|(date, _)| date.date().is_some());
        let unparsed = self.dates.iter().filter(|(date, _)| date.date().is_none());
        parsed
            .chain(unparsed)
            .map(|(date, paths)| (date, paths.as_slice()))
    }

    /// The `limit` most recent images, newest date first.
    ///
    /// Within a date, paths keep their list order, so the representative
    /// image of the newest date always comes first.
    pub fn latest(&self, limit: usize) -> Vec<(&CaptureDate, &Path)> {
        self.dates_newest_first()
            .flat_map(|(date, paths)| paths.iter().map(move |p| (date, p.as_path())))
            .take(limit)
            .collect()
    }

    /// Append a path to a date's list unless it is already there.
    ///
    /// Returns whether the path was added.
    pub(crate) fn push_unique(&mut self, date: CaptureDate, path: PathBuf) -> bool {
        let paths = self.dates.entry(date).or_default();
        if paths.contains(&path) {
            return false;
        }
        paths.push(path);
        true
    }
}

/// Index of a single source folder.
///
/// Every path in the index lives directly under [`SourceIndex::root`]. Paths
/// within a date keep discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceIndex {
    root: PathBuf,
    consumers: BTreeMap<String, ConsumerImages>,
}

impl SourceIndex {
    /// Create an empty index for a source root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            consumers: BTreeMap::new(),
        }
    }

    /// Root folder this index covers.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record one image file.
    ///
    /// The device code of the first file seen for a consumer is kept.
    /// Returns whether the path was new.
    pub fn insert(&mut self, name: ImageName, path: PathBuf) -> bool {
        self.consumers
            .entry(name.consumer_id)
            .or_insert_with(|| ConsumerImages::new(name.device_code))
            .push_unique(name.capture_date, path)
    }

    /// Look up one consumer.
    pub fn get(&self, consumer_id: &str) -> Option<&ConsumerImages> {
        self.consumers.get(consumer_id)
    }

    /// Iterate consumers in id order.
    pub fn consumers(&self) -> impl Iterator<Item = (&str, &ConsumerImages)> {
        self.consumers.iter().map(|(id, images)| (id.as_str(), images))
    }

    /// Number of distinct consumers.
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Number of image paths.
    pub fn image_count(&self) -> usize {
        self.consumers.values().map(ConsumerImages::image_count).sum()
    }

    /// Check if no images are indexed.
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

/// The unified, prioritized index served to readers.
///
/// Built fresh by [`crate::index::merge_indices`] and never mutated after
/// publication.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedIndex {
    consumers: BTreeMap<String, ConsumerImages>,
    sources: Vec<PathBuf>,
    image_count: usize,
}

impl MergedIndex {
    pub(crate) fn from_parts(
        consumers: BTreeMap<String, ConsumerImages>,
        sources: Vec<PathBuf>,
    ) -> Self {
        let image_count = consumers.values().map(ConsumerImages::image_count).sum();
        Self {
            consumers,
            sources,
            image_count,
        }
    }

    /// Exact lookup of a consumer id.
    pub fn lookup(&self, consumer_id: &str) -> Option<&ConsumerImages> {
        self.consumers.get(consumer_id)
    }

    /// All consumers whose id starts with `prefix`, in id order.
    pub fn lookup_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a ConsumerImages)> + 'a {
        self.consumers
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(move |(id, _)| id.starts_with(prefix))
            .map(|(id, images)| (id.as_str(), images))
    }

    /// Front path of a consumer's list for a raw `DDMMYYYY` date.
    pub fn representative_path(&self, consumer_id: &str, date: &str) -> Option<&Path> {
        self.lookup(consumer_id)?.representative(date)
    }

    /// Sum of all path-list lengths.
    pub fn total_image_count(&self) -> usize {
        self.image_count
    }

    /// Number of distinct consumers.
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Roots of the sources that contributed, in priority order.
    pub fn sources(&self) -> &[PathBuf] {
        &self.sources
    }

    /// Check if the index holds no images.
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::parse_image_filename;

    fn source_with(root: &str, names: &[&str]) -> SourceIndex {
        let mut index = SourceIndex::new(root);
        for name in names {
            let parsed = parse_image_filename(name).unwrap();
            index.insert(parsed, Path::new(root).join(name));
        }
        index
    }

    #[test]
    fn test_insert_groups_by_consumer_and_date() {
        let index = source_with(
            "/a",
            &[
                "01012024AB123456123456789.jpg",
                "01012024AB123456123456789_2.jpg",
                "01022024AB123456123456789.jpg",
                "01012024AB123456987654321.jpg",
            ],
        );

        assert_eq!(index.consumer_count(), 2);
        assert_eq!(index.image_count(), 4);

        let consumer = index.get("123456789").unwrap();
        assert_eq!(consumer.device_code(), "AB123456");
        assert_eq!(consumer.paths_for("01012024").unwrap().len(), 2);
        assert_eq!(consumer.paths_for("01022024").unwrap().len(), 1);
    }

    #[test]
    fn test_first_device_code_wins_within_source() {
        let index = source_with(
            "/a",
            &[
                "01012024AB123456123456789.jpg",
                "02012024CD654321123456789.jpg",
            ],
        );
        assert_eq!(index.get("123456789").unwrap().device_code(), "AB123456");
    }

    #[test]
    fn test_insert_same_path_twice_is_ignored() {
        let mut index = source_with("/a", &["01012024AB123456123456789.jpg"]);
        let again = parse_image_filename("01012024AB123456123456789.jpg").unwrap();

        assert!(!index.insert(again, PathBuf::from("/a/01012024AB123456123456789.jpg")));
        assert_eq!(index.image_count(), 1);
    }

    #[test]
    fn test_dates_newest_first_puts_unparsable_last() {
        let index = source_with(
            "/a",
            &[
                "31122023AB123456123456789.jpg",
                "XXXXXXXXAB123456123456789.jpg",
                "01012024AB123456123456789.jpg",
            ],
        );
        let consumer = index.get("123456789").unwrap();

        let order: Vec<_> = consumer
            .dates_newest_first()
            .map(|(date, _)| date.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["01012024", "31122023", "XXXXXXXX"]);
    }

    #[test]
    fn test_latest_limits_and_orders() {
        let index = source_with(
            "/a",
            &[
                "01012023AB123456123456789.jpg",
                "01012024AB123456123456789_a.jpg",
                "01012024AB123456123456789_b.jpg",
                "01062023AB123456123456789.jpg",
            ],
        );
        let consumer = index.get("123456789").unwrap();

        let latest = consumer.latest(3);
        assert_eq!(latest.len(), 3);
        assert_eq!(latest[0].0.as_str(), "01012024");
        assert!(latest[0].1.ends_with("01012024AB123456123456789_a.jpg"));
        assert!(latest[1].1.ends_with("01012024AB123456123456789_b.jpg"));
        assert_eq!(latest[2].0.as_str(), "01062023");
    }

    #[test]
    fn test_merged_prefix_lookup() {
        let mut consumers = BTreeMap::new();
        for id in ["123000001", "123000002", "124000000"] {
            consumers.insert(id.to_string(), ConsumerImages::new("AB123456"));
        }
        let merged = MergedIndex::from_parts(consumers, vec![]);

        let ids: Vec<_> = merged.lookup_prefix("123").map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["123000001", "123000002"]);
        assert_eq!(merged.lookup_prefix("9").count(), 0);
    }

    #[test]
    fn test_merged_lookup_missing_is_none() {
        let merged = MergedIndex::default();
        assert!(merged.lookup("000000000").is_none());
        assert!(merged.representative_path("000000000", "01012024").is_none());
        assert_eq!(merged.total_image_count(), 0);
        assert!(merged.is_empty());
    }
}
