//! Merging per-source indices into the unified index.
//!
//! # Precedence Rules
//!
//! Sources are folded in priority order: the primary source first, then
//! secondaries in their configured order.
//!
//! 1. The primary source's paths lead every `(consumer, date)` list.
//! 2. Every later source appends a path only if that exact path is not
//!    already in the list.
//! 3. A consumer's device code comes from the first source that has the
//!    consumer.
//!
//! So "pick the representative image for a date" (the list front) always
//! prefers the primary source, and no path appears twice for a date.
//!
//! The merge allocates a fresh [`MergedIndex`]; previously published indices
//! are never touched.

use std::collections::BTreeMap;

use tracing::debug;

use crate::source::SourceDescriptor;

use super::types::{ConsumerImages, MergedIndex, SourceIndex};

/// Fold source indices into a merged index.
///
/// Inputs may arrive in any order; primary sources are moved to the front
/// (stably) before folding, so the precedence rules hold regardless.
pub fn merge_indices<'a, I>(inputs: I) -> MergedIndex
where
    I: IntoIterator<Item = (&'a SourceDescriptor, &'a SourceIndex)>,
{
    let mut ordered: Vec<_> = inputs.into_iter().collect();
    ordered.sort_by_key(|(source, _)| !source.is_primary());

    let mut consumers: BTreeMap<String, ConsumerImages> = BTreeMap::new();
    let mut contributing = Vec::with_capacity(ordered.len());
    let mut duplicates = 0usize;

    for (source, index) in ordered {
        contributing.push(source.root().to_path_buf());

        for (consumer_id, images) in index.consumers() {
            let merged = consumers
                .entry(consumer_id.to_string())
                .or_insert_with(|| ConsumerImages::new(images.device_code()));

            for (date, paths) in images.dates() {
                for path in paths {
                    if !merged.push_unique(date.clone(), path.clone()) {
                        duplicates += 1;
                    }
                }
            }
        }
    }

    let merged = MergedIndex::from_parts(consumers, contributing);
    debug!(
        sources = merged.sources().len(),
        consumers = merged.consumer_count(),
        images = merged.total_image_count(),
        duplicates,
        "Merged source indices"
    );
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::parse_image_filename;
    use std::path::{Path, PathBuf};

    fn index_of(source: &SourceDescriptor, names: &[&str]) -> SourceIndex {
        let mut index = SourceIndex::new(source.root());
        for name in names {
            index.insert(
                parse_image_filename(name).unwrap(),
                source.root().join(name),
            );
        }
        index
    }

    #[test]
    fn test_primary_path_comes_first() {
        let a = SourceDescriptor::primary("/a");
        let b = SourceDescriptor::secondary("/b");
        let index_a = index_of(&a, &["01012024AB123456123456789.jpg"]);
        let index_b = index_of(&b, &["01012024CD123456123456789.jpg"]);

        let merged = merge_indices([(&a, &index_a), (&b, &index_b)]);

        let consumer = merged.lookup("123456789").unwrap();
        assert_eq!(
            consumer.paths_for("01012024").unwrap(),
            &[
                PathBuf::from("/a/01012024AB123456123456789.jpg"),
                PathBuf::from("/b/01012024CD123456123456789.jpg"),
            ]
        );
        assert_eq!(
            merged.representative_path("123456789", "01012024"),
            Some(Path::new("/a/01012024AB123456123456789.jpg"))
        );
    }

    #[test]
    fn test_primary_wins_when_passed_last() {
        let a = SourceDescriptor::primary("/a");
        let b = SourceDescriptor::secondary("/b");
        let index_a = index_of(&a, &["01012024AB123456123456789.jpg"]);
        let index_b = index_of(&b, &["01012024CD123456123456789.jpg"]);

        let merged = merge_indices([(&b, &index_b), (&a, &index_a)]);

        assert_eq!(
            merged.representative_path("123456789", "01012024"),
            Some(Path::new("/a/01012024AB123456123456789.jpg"))
        );
        assert_eq!(merged.lookup("123456789").unwrap().device_code(), "AB123456");
        assert_eq!(merged.sources(), &[PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn test_device_code_from_first_secondary_in_order() {
        let a = SourceDescriptor::primary("/a");
        let b = SourceDescriptor::secondary("/b");
        let c = SourceDescriptor::secondary("/c");
        let index_a = index_of(&a, &[]);
        let index_b = index_of(&b, &["01012024BBBBBBBB123456789.jpg"]);
        let index_c = index_of(&c, &["01012024CCCCCCCC123456789.jpg"]);

        let merged = merge_indices([(&a, &index_a), (&b, &index_b), (&c, &index_c)]);
        assert_eq!(merged.lookup("123456789").unwrap().device_code(), "BBBBBBBB");

        let merged = merge_indices([(&a, &index_a), (&c, &index_c), (&b, &index_b)]);
        assert_eq!(merged.lookup("123456789").unwrap().device_code(), "CCCCCCCC");
    }

    #[test]
    fn test_same_path_is_never_duplicated() {
        let a = SourceDescriptor::primary("/a");
        let index = index_of(&a, &["01012024AB123456123456789.jpg"]);
        let alias = SourceDescriptor::secondary("/a");

        let merged = merge_indices([(&a, &index), (&alias, &index)]);

        assert_eq!(
            merged
                .lookup("123456789")
                .unwrap()
                .paths_for("01012024")
                .unwrap()
                .len(),
            1
        );
        assert_eq!(merged.total_image_count(), 1);
    }

    #[test]
    fn test_merge_is_deterministic() {
        let a = SourceDescriptor::primary("/a");
        let b = SourceDescriptor::secondary("/b");
        let index_a = index_of(
            &a,
            &[
                "01012024AB123456123456789.jpg",
                "05052023AB123456111111111.jpg",
            ],
        );
        let index_b = index_of(
            &b,
            &[
                "01012024CD123456123456789.jpg",
                "07072022CD123456222222222.jpg",
            ],
        );

        let first = merge_indices([(&a, &index_a), (&b, &index_b)]);
        let second = merge_indices([(&a, &index_a), (&b, &index_b)]);

        assert_eq!(
            bincode::serialize(&first).unwrap(),
            bincode::serialize(&second).unwrap()
        );
    }

    #[test]
    fn test_total_counts_all_sources() {
        let a = SourceDescriptor::primary("/a");
        let b = SourceDescriptor::secondary("/b");
        let index_a = index_of(&a, &["01012024AB123456123456789.jpg"]);
        let index_b = index_of(
            &b,
            &[
                "01012024CD123456123456789.jpg",
                "02012024CD123456987654321.jpg",
            ],
        );

        let merged = merge_indices([(&a, &index_a), (&b, &index_b)]);
        assert_eq!(merged.total_image_count(), 3);
        assert_eq!(merged.consumer_count(), 2);
    }

    #[test]
    fn test_merge_of_nothing_is_empty() {
        let merged = merge_indices(std::iter::empty::<(&SourceDescriptor, &SourceIndex)>());
        assert!(merged.is_empty());
        assert!(merged.sources().is_empty());
    }
}
