//! The configured set of sources, in merge priority order.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{IndexError, IndexResult};
use crate::persist::write_bytes_atomic;

use super::descriptor::{normalize_root, SourceDescriptor};

/// On-disk shape of the secondary source list.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SourceListFile {
    #[serde(default)]
    secondary: Vec<PathBuf>,
}

#[derive(Debug)]
struct RegistryState {
    primary: SourceDescriptor,
    secondaries: Vec<SourceDescriptor>,
}

/// Shared, cloneable registry of configured sources.
///
/// Holds the fixed primary source and the user-managed, ordered list of
/// secondary sources. When created with a list file, every change to the
/// secondary list is persisted before it becomes visible.
///
/// Clones share state, so the availability monitor and the reindex
/// coordinator always see the same configuration.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    state: Arc<RwLock<RegistryState>>,
    list_path: Option<PathBuf>,
}

impl SourceRegistry {
    /// Create an in-memory registry with only a primary source.
    pub fn new(primary: impl AsRef<Path>) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState {
                primary: SourceDescriptor::primary(primary),
                secondaries: Vec::new(),
            })),
            list_path: None,
        }
    }

    /// Create a registry backed by a secondary list file.
    ///
    /// A missing or unparsable list file means no secondaries; the next
    /// change rewrites it. Relative entries are resolved against the list
    /// file's directory. Entries naming the primary folder or repeating an
    /// earlier entry are dropped.
    pub fn with_list_file(
        primary: impl AsRef<Path>,
        list_path: impl Into<PathBuf>,
    ) -> IndexResult<Self> {
        let list_path = list_path.into();
        let mut registry = Self::new(primary);

        let listed = match std::fs::read(&list_path) {
            Ok(bytes) => match serde_json::from_slice::<SourceListFile>(&bytes) {
                Ok(file) => file.secondary,
                Err(e) => {
                    warn!(
                        list = %list_path.display(),
                        error = %e,
                        "Unreadable source list, continuing with the primary source only"
                    );
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(IndexError::io(&list_path, e)),
        };
        let list_dir = list_path.parent().unwrap_or_else(|| Path::new(""));

        {
            let mut state = registry.state.write();
            for path in listed {
                let candidate = SourceDescriptor::secondary(list_dir.join(path));
                if !contains_root(&state, candidate.root()) {
                    state.secondaries.push(candidate);
                }
            }
            debug!(
                list = %list_path.display(),
                secondaries = state.secondaries.len(),
                "Loaded source list"
            );
        }

        registry.list_path = Some(list_path);
        Ok(registry)
    }

    /// The primary source.
    pub fn primary(&self) -> SourceDescriptor {
        self.state.read().primary.clone()
    }

    /// Secondary sources in configured order.
    pub fn secondaries(&self) -> Vec<SourceDescriptor> {
        self.state.read().secondaries.clone()
    }

    /// All sources in merge priority order: primary first, then secondaries.
    pub fn ordered(&self) -> Vec<SourceDescriptor> {
        let state = self.state.read();
        std::iter::once(state.primary.clone())
            .chain(state.secondaries.iter().cloned())
            .collect()
    }

    /// Find the configured source for a folder.
    pub fn find(&self, path: &Path) -> Option<SourceDescriptor> {
        let root = normalize_root(path);
        let state = self.state.read();
        std::iter::once(&state.primary)
            .chain(state.secondaries.iter())
            .find(|s| s.root() == root)
            .cloned()
    }

    /// Append a secondary source.
    ///
    /// Returns `None` if the folder is already configured (as primary or
    /// secondary); the list is left unchanged in that case.
    pub fn add_secondary(&self, path: impl AsRef<Path>) -> IndexResult<Option<SourceDescriptor>> {
        let candidate = SourceDescriptor::secondary(path);
        let mut state = self.state.write();

        if contains_root(&state, candidate.root()) {
            return Ok(None);
        }

        let mut updated = state.secondaries.clone();
        updated.push(candidate.clone());
        self.persist(&updated)?;
        state.secondaries = updated;

        info!(root = %candidate.root().display(), "Added secondary source");
        Ok(Some(candidate))
    }

    /// Remove a secondary source. Returns whether anything was removed.
    pub fn remove_secondary(&self, path: impl AsRef<Path>) -> IndexResult<bool> {
        let root = normalize_root(path.as_ref());
        let mut state = self.state.write();

        let before = state.secondaries.len();
        let updated: Vec<_> = state
            .secondaries
            .iter()
            .filter(|s| s.root() != root)
            .cloned()
            .collect();
        if updated.len() == before {
            return Ok(false);
        }

        self.persist(&updated)?;
        state.secondaries = updated;

        info!(root = %root.display(), "Removed secondary source");
        Ok(true)
    }

    fn persist(&self, secondaries: &[SourceDescriptor]) -> IndexResult<()> {
        let Some(list_path) = &self.list_path else {
            return Ok(());
        };

        let file = SourceListFile {
            secondary: secondaries.iter().map(|s| s.root().to_path_buf()).collect(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| IndexError::io(list_path, e.into()))?;
        write_bytes_atomic(list_path, &json).map_err(|e| IndexError::io(list_path, e))
    }
}

fn contains_root(state: &RegistryState, root: &Path) -> bool {
    state.primary.root() == root || state.secondaries.iter().any(|s| s.root() == root)
}
