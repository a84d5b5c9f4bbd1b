//! Source folder descriptors.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Role of a source in merge priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceRole {
    /// The fixed, configured default folder. Wins every merge tie.
    Primary,

    /// A user-added folder, often on a network share.
    Secondary,
}

impl std::fmt::Display for SourceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceRole::Primary => write!(f, "primary"),
            SourceRole::Secondary => write!(f, "secondary"),
        }
    }
}

/// A folder of image files that contributes to the merged index.
///
/// The root is stored normalized (see [`normalize_root`]) so two descriptors
/// for the same folder compare equal and map to the same snapshot slot.
///
/// # Example
///
/// ```
/// use spotindex::source::SourceDescriptor;
///
/// let primary = SourceDescriptor::primary("/data/images/");
/// let share = SourceDescriptor::secondary("/mnt/share/./images");
///
/// assert!(primary.is_primary());
/// assert!(!share.is_primary());
/// assert_eq!(share.root(), std::path::Path::new("/mnt/share/images"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceDescriptor {
    root: PathBuf,
    role: SourceRole,
}

impl SourceDescriptor {
    /// Create the primary source descriptor.
    pub fn primary(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize_root(root.as_ref()),
            role: SourceRole::Primary,
        }
    }

    /// Create a secondary source descriptor.
    pub fn secondary(root: impl AsRef<Path>) -> Self {
        Self {
            root: normalize_root(root.as_ref()),
            role: SourceRole::Secondary,
        }
    }

    /// Normalized root folder.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Merge role of this source.
    pub fn role(&self) -> SourceRole {
        self.role
    }

    /// Check if this is the primary source.
    pub fn is_primary(&self) -> bool {
        self.role == SourceRole::Primary
    }

    /// Check whether `path` names the same folder as this source.
    pub fn same_root(&self, path: &Path) -> bool {
        self.root == normalize_root(path)
    }
}

impl std::fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.root.display(), self.role)
    }
}

/// Normalize a source root lexically.
///
/// Relative paths are anchored at the current directory; `.` components,
/// repeated separators and trailing separators are dropped. Symlinks are not
/// resolved because the folder may be offline.
pub fn normalize_root(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    absolute
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(SourceRole::Primary.to_string(), "primary");
        assert_eq!(SourceRole::Secondary.to_string(), "secondary");
    }

    #[test]
    fn test_descriptor_roles() {
        let primary = SourceDescriptor::primary("/data/images");
        let secondary = SourceDescriptor::secondary("/mnt/share");

        assert!(primary.is_primary());
        assert_eq!(primary.role(), SourceRole::Primary);
        assert!(!secondary.is_primary());
        assert_eq!(secondary.role(), SourceRole::Secondary);
    }

    #[test]
    fn test_normalize_strips_trailing_and_dot_components() {
        assert_eq!(
            normalize_root(Path::new("/data//images/./")),
            PathBuf::from("/data/images")
        );
    }

    #[test]
    fn test_normalize_anchors_relative_paths() {
        let normalized = normalize_root(Path::new("images"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("images"));
    }

    #[test]
    fn test_same_root() {
        let source = SourceDescriptor::secondary("/mnt/share/images");
        assert!(source.same_root(Path::new("/mnt/share/images/")));
        assert!(!source.same_root(Path::new("/mnt/share")));
    }

    #[test]
    fn test_display() {
        let source = SourceDescriptor::primary("/data/images");
        assert_eq!(source.to_string(), "/data/images (primary)");
    }
}
