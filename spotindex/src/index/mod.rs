//! Per-source indexing, snapshot caching and merging.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  list   ┌───────────────┐ build_index ┌─────────────┐
//! │ SourceScanner│ ──────► │ SourceListing │ ──────────► │ SourceIndex │
//! └──────────────┘         └───────────────┘             └──────┬──────┘
//!                                                               │ save / load
//!                                                               ▼
//!                                                       ┌───────────────┐
//!                                                       │ SnapshotCache │
//!                                                       └──────┬────────┘
//!                                   merge_indices (priority)   │
//!                          ┌─────────────┐ ◄───────────────────┘
//!                          │ MergedIndex │
//!                          └─────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use spotindex::index::{merge_indices, SourceIndex};
//! use spotindex::filename::parse_image_filename;
//! use spotindex::source::SourceDescriptor;
//!
//! let primary = SourceDescriptor::primary("/a");
//! let share = SourceDescriptor::secondary("/b");
//!
//! let mut a = SourceIndex::new(primary.root());
//! let name = "01012024AB123456123456789.jpg";
//! a.insert(parse_image_filename(name).unwrap(), primary.root().join(name));
//!
//! let mut b = SourceIndex::new(share.root());
//! let name = "01012024CD123456123456789.jpg";
//! b.insert(parse_image_filename(name).unwrap(), share.root().join(name));
//!
//! let merged = merge_indices([(&primary, &a), (&share, &b)]);
//! let front = merged.representative_path("123456789", "01012024").unwrap();
//! assert!(front.starts_with("/a"));
//! ```

mod cache;
mod legacy;
mod merge;
mod scanner;
mod types;

pub use cache::{SnapshotCache, SnapshotInfo, SNAPSHOT_EXTENSION, SNAPSHOT_FORMAT_VERSION};
pub use legacy::{read_listing, write_listing};
pub use merge::merge_indices;
pub use scanner::{FsScanner, SourceListing, SourceScanner, PROGRESS_BATCH};
pub use types::{ConsumerImages, MergedIndex, SourceIndex};
