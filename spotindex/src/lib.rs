//! spotindex - multi-source meter-reading image index
//!
//! Meter-reading photos are stored as flat folders of files whose names
//! encode the capture date, the meter-reader's device code and the
//! consumer id (`DDMMYYYY` + 8-character device code + 9-digit consumer id).
//! This library scans one primary folder and any number of secondary
//! folders (often network shares that come and go), caches a per-folder
//! index on disk, and merges the indices into one lookup structure with a
//! fixed priority: the primary folder's images always come first.
//!
//! # Modules
//!
//! - [`filename`]: filename decoding
//! - [`source`]: source folders and the persisted secondary list
//! - [`index`]: per-source scanning, snapshot caching and merging
//! - [`monitor`]: source availability probing
//! - [`reindex`]: the background reindex worker
//! - [`query`]: read access to the published index
//! - [`meter`], [`history`]: lookup helpers for front ends
//! - [`config`], [`logging`], [`engine`]: configuration and bootstrap

pub mod config;
pub mod engine;
pub mod error;
pub mod filename;
pub mod history;
pub mod index;
pub mod logging;
pub mod meter;
pub mod monitor;
pub mod query;
pub mod reindex;
pub mod source;

mod persist;

pub use error::{IndexError, IndexResult};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
