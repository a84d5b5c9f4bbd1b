//! CLI command implementations.

pub mod common;
pub mod history;
pub mod import_listing;
pub mod index;
pub mod init;
pub mod lookup;
pub mod meter;
pub mod sources;
pub mod status;
pub mod watch;
