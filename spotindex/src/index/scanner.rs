//! Source folder scanning.
//!
//! Scanning is split into two steps so a caller can learn the total amount
//! of work before doing it:
//!
//! 1. [`SourceScanner::list`] enumerates the folder's direct children (the
//!    slow part on network shares).
//! 2. [`SourceListing::build_index`] runs the filename codec over every
//!    entry and reports progress as it goes.
//!
//! Neither step writes anything; persisting the result is up to the caller.

use std::path::Path;

use tracing::{debug, trace};

use crate::error::{IndexError, IndexResult};
use crate::filename::parse_image_filename;
use crate::source::SourceDescriptor;

use super::types::SourceIndex;

/// Entries between progress callbacks.
pub const PROGRESS_BATCH: usize = 256;

/// Enumerates the entries of a source folder.
///
/// This abstraction lets the reindex coordinator be exercised with scanners
/// that fail or block on demand.
pub trait SourceScanner: Send + Sync {
    /// List the file names directly under the source root.
    fn list(&self, source: &SourceDescriptor) -> IndexResult<SourceListing>;
}

/// Scanner reading the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsScanner;

impl SourceScanner for FsScanner {
    fn list(&self, source: &SourceDescriptor) -> IndexResult<SourceListing> {
        let root = source.root();
        let scan_err = |e: std::io::Error| IndexError::ScanFailed {
            root: root.to_path_buf(),
            source: e,
        };

        let mut names = Vec::new();
        let mut skipped = 0usize;

        for entry in std::fs::read_dir(root).map_err(scan_err)? {
            let entry = entry.map_err(scan_err)?;

            // Sub-folders are never images; the scan is not recursive.
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                skipped += 1;
                continue;
            }

            match entry.file_name().into_string() {
                Ok(name) => names.push(name),
                Err(raw) => {
                    trace!(name = ?raw, "Skipping non UTF-8 entry");
                    skipped += 1;
                }
            }
        }

        debug!(
            root = %root.display(),
            entries = names.len(),
            skipped,
            "Listed source folder"
        );

        Ok(SourceListing::new(source.clone(), names))
    }
}

/// File names found directly under one source root.
#[derive(Debug, Clone)]
pub struct SourceListing {
    source: SourceDescriptor,
    names: Vec<String>,
}

impl SourceListing {
    /// Create a listing from already-known names, in discovery order.
    pub fn new(source: SourceDescriptor, names: Vec<String>) -> Self {
        Self { source, names }
    }

    /// The listed source.
    pub fn source(&self) -> &SourceDescriptor {
        &self.source
    }

    /// Listed file names.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of listed entries.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if the folder had no entries.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Build the source index without progress reporting.
    pub fn build_index(&self) -> SourceIndex {
        self.build_index_with_progress(|_| {})
    }

    /// Build the source index, calling `progress` with the number of
    /// entries processed since the previous call.
    ///
    /// Names that don't parse are skipped silently; unrelated files may
    /// share the folder.
    pub fn build_index_with_progress<F>(&self, mut progress: F) -> SourceIndex
    where
        F: FnMut(usize),
    {
        let root: &Path = self.source.root();
        let mut index = SourceIndex::new(root);
        let mut pending = 0usize;
        let mut malformed = 0usize;

        for name in &self.names {
            match parse_image_filename(name) {
                Some(parsed) => {
                    index.insert(parsed, root.join(name));
                }
                None => malformed += 1,
            }

            pending += 1;
            if pending == PROGRESS_BATCH {
                progress(pending);
                pending = 0;
            }
        }

        if pending > 0 {
            progress(pending);
        }

        debug!(
            root = %root.display(),
            consumers = index.consumer_count(),
            images = index.image_count(),
            malformed,
            "Indexed source folder"
        );

        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    fn scan(source: &SourceDescriptor) -> IndexResult<SourceIndex> {
        Ok(FsScanner.list(source)?.build_index())
    }

    #[test]
    fn test_scan_indexes_matching_files() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "01012024AB123456123456789.jpg");
        touch(temp.path(), "02012024AB123456123456789.jpg");
        touch(temp.path(), "01012024CD000001987654321.JPG");

        let source = SourceDescriptor::primary(temp.path());
        let index = scan(&source).unwrap();

        assert_eq!(index.consumer_count(), 2);
        assert_eq!(index.image_count(), 3);
        assert_eq!(index.root(), source.root());
    }

    #[test]
    fn test_scan_skips_short_names_and_directories() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "01012024AB123456123456789.jpg");
        touch(temp.path(), "Thumbs.db");
        touch(temp.path(), "01012024AB12345612345");
        std::fs::create_dir(temp.path().join("01012024AB123456555555555_dir")).unwrap();

        let source = SourceDescriptor::primary(temp.path());
        let listing = FsScanner.list(&source).unwrap();
        assert_eq!(listing.len(), 3);

        let index = listing.build_index();
        assert_eq!(index.image_count(), 1);
        assert!(index.get("555555555").is_none());
    }

    #[test]
    fn test_paths_live_under_root() {
        let temp = TempDir::new().unwrap();
        touch(temp.path(), "01012024AB123456123456789.jpg");

        let source = SourceDescriptor::secondary(temp.path());
        let index = scan(&source).unwrap();

        for (_, images) in index.consumers() {
            for paths in images.dates().values() {
                for path in paths {
                    assert!(path.starts_with(source.root()));
                }
            }
        }
    }

    #[test]
    fn test_missing_root_is_scan_error() {
        let temp = TempDir::new().unwrap();
        let source = SourceDescriptor::secondary(temp.path().join("gone"));

        let err = scan(&source).unwrap_err();
        assert!(matches!(err, IndexError::ScanFailed { .. }));
    }

    #[test]
    fn test_progress_reports_every_entry() {
        let names: Vec<String> = (0..PROGRESS_BATCH * 2 + 7)
            .map(|i| format!("01012024AB123456{:09}.jpg", i))
            .collect();
        let listing = SourceListing::new(SourceDescriptor::primary("/images"), names);

        let mut calls = Vec::new();
        let index = listing.build_index_with_progress(|n| calls.push(n));

        assert_eq!(calls, vec![PROGRESS_BATCH, PROGRESS_BATCH, 7]);
        assert_eq!(index.image_count(), PROGRESS_BATCH * 2 + 7);
        assert_eq!(
            index.get("000000000").unwrap().paths_for("01012024").unwrap()[0],
            PathBuf::from("/images/01012024AB123456000000000.jpg")
        );
    }

    #[test]
    fn test_empty_listing_reports_nothing() {
        let listing = SourceListing::new(SourceDescriptor::primary("/images"), Vec::new());
        let mut called = false;
        let index = listing.build_index_with_progress(|_| called = true);

        assert!(!called);
        assert!(index.is_empty());
        assert!(listing.is_empty());
    }
}
