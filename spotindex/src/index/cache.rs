//! Per-source snapshot caching.
//!
//! Each source's [`SourceIndex`] is stored as its own bincode snapshot so a
//! restart (or a topology change) can re-merge without rescanning folders.
//! The snapshot slot is named after a SHA-256 of the normalized root path,
//! which makes the mapping from folder to file stable across processes and
//! releases.
//!
//! A snapshot that can't be decoded, was written by a different format
//! version, or belongs to another root is treated exactly like a missing one.

use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{IndexError, IndexResult};
use crate::persist::write_atomic;
use crate::source::SourceDescriptor;

use super::types::SourceIndex;

/// Snapshot layout version; bump when [`SourceIndex`] changes shape.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// File extension of snapshot slots.
pub const SNAPSHOT_EXTENSION: &str = "snapshot";

/// Serialized snapshot envelope.
#[derive(Debug, Serialize, Deserialize)]
struct SourceSnapshot {
    format_version: u32,
    root: PathBuf,
    created_at_secs: u64,
    index: SourceIndex,
}

/// Borrowing form of [`SourceSnapshot`]; encodes identically.
#[derive(Serialize)]
struct SourceSnapshotRef<'a> {
    format_version: u32,
    root: &'a Path,
    created_at_secs: u64,
    index: &'a SourceIndex,
}

/// Summary of a stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    /// When the snapshot was written (secs since UNIX_EPOCH).
    pub created_at_secs: u64,
    /// Consumers in the snapshot.
    pub consumers: usize,
    /// Image paths in the snapshot.
    pub images: usize,
}

impl SnapshotInfo {
    /// Get snapshot age in seconds.
    pub fn age_secs(&self) -> u64 {
        now_secs().saturating_sub(self.created_at_secs)
    }

    /// Get human-readable snapshot age.
    pub fn age_human(&self) -> String {
        let secs = self.age_secs();

        if secs < 60 {
            format!("{}s ago", secs)
        } else if secs < 3600 {
            format!("{}m ago", secs / 60)
        } else if secs < 86400 {
            format!("{}h ago", secs / 3600)
        } else {
            format!("{}d ago", secs / 86400)
        }
    }
}

/// Directory of per-source snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    dir: PathBuf,
}

impl SnapshotCache {
    /// Create a cache rooted at `dir`. The directory is created lazily.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Snapshot directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stable slot key for a source root.
    pub fn slot_key(root: &Path) -> String {
        let mut hasher = Sha256::new();
        hasher.update(root.to_string_lossy().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Path of the snapshot slot for a source.
    pub fn slot_path(&self, source: &SourceDescriptor) -> PathBuf {
        self.dir.join(format!(
            "{}.{}",
            Self::slot_key(source.root()),
            SNAPSHOT_EXTENSION
        ))
    }

    /// Persist a source index, replacing any previous snapshot atomically.
    pub fn save(&self, source: &SourceDescriptor, index: &SourceIndex) -> IndexResult<()> {
        let path = self.slot_path(source);
        let snapshot = SourceSnapshotRef {
            format_version: SNAPSHOT_FORMAT_VERSION,
            root: source.root(),
            created_at_secs: now_secs(),
            index,
        };

        write_atomic(&path, |writer| {
            bincode::serialize_into(writer, &snapshot)
                .map_err(|e| io::Error::other(format!("Failed to serialize snapshot: {}", e)))
        })
        .map_err(|e| IndexError::io(&path, e))?;

        info!(
            root = %source.root().display(),
            path = %path.display(),
            consumers = index.consumer_count(),
            images = index.image_count(),
            "Saved source snapshot"
        );
        Ok(())
    }

    /// Load the last snapshot for a source.
    ///
    /// Returns `None` if the snapshot is missing or unusable; corruption is
    /// logged, never propagated.
    pub fn load(&self, source: &SourceDescriptor) -> Option<SourceIndex> {
        match self.try_load(source) {
            Ok(Some(index)) => Some(index),
            Ok(None) => {
                debug!(root = %source.root().display(), "No snapshot for source");
                None
            }
            Err(e) => {
                warn!(root = %source.root().display(), error = %e, "Ignoring unusable snapshot");
                None
            }
        }
    }

    /// Load the last snapshot, distinguishing "absent" from "corrupt".
    pub fn try_load(&self, source: &SourceDescriptor) -> IndexResult<Option<SourceIndex>> {
        Ok(self.read_snapshot(source)?.map(|s| s.index))
    }

    /// Describe the stored snapshot for a source without keeping it.
    pub fn info(&self, source: &SourceDescriptor) -> Option<SnapshotInfo> {
        let snapshot = self.read_snapshot(source).ok()??;
        Some(SnapshotInfo {
            created_at_secs: snapshot.created_at_secs,
            consumers: snapshot.index.consumer_count(),
            images: snapshot.index.image_count(),
        })
    }

    /// Delete the snapshot for a source. Returns whether one existed.
    pub fn remove(&self, source: &SourceDescriptor) -> IndexResult<bool> {
        let path = self.slot_path(source);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(IndexError::io(&path, e)),
        }
    }

    fn read_snapshot(&self, source: &SourceDescriptor) -> IndexResult<Option<SourceSnapshot>> {
        let path = self.slot_path(source);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(IndexError::io(&path, e)),
        };

        let corrupt = |reason: String| IndexError::CacheCorrupt {
            path: path.clone(),
            reason,
        };

        let snapshot: SourceSnapshot =
            bincode::deserialize(&bytes).map_err(|e| corrupt(e.to_string()))?;

        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(corrupt(format!(
                "format version {} (expected {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }
        if snapshot.root != source.root() || snapshot.index.root() != source.root() {
            return Err(corrupt(format!(
                "belongs to {}",
                snapshot.root.display()
            )));
        }

        Ok(Some(snapshot))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
