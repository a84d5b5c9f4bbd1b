//! Source folders and their configuration.
//!
//! A *source* is one folder of image files. Exactly one source is the
//! primary (the configured default folder); any number of secondary folders
//! can be added by the user and are persisted as an ordered list. Together
//! they define the priority order the merger folds indices in:
//!
//! ```text
//! [primary, secondary #1, secondary #2, ...]
//! ```

mod descriptor;
mod registry;

pub use descriptor::{normalize_root, SourceDescriptor, SourceRole};
pub use registry::SourceRegistry;
