//! Persisted search history.
//!
//! Consumer ids and meter numbers that were looked up are kept in a small
//! JSON file so front ends can offer them again:
//!
//! ```json
//! { "consumer_ids": ["123456789"], "meter_numbers": ["mtr-0042"] }
//! ```
//!
//! Values are appended only when new, so each list keeps first-seen order.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::meter::normalize_meter;
use crate::persist::write_bytes_atomic;

/// Entries shown by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 8;

/// Errors reading or writing the history file.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to access search history {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid search history {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct HistoryLists {
    #[serde(default)]
    consumer_ids: Vec<String>,
    #[serde(default)]
    meter_numbers: Vec<String>,
}

/// Search history backed by a JSON file.
#[derive(Debug, Clone)]
pub struct SearchHistory {
    path: PathBuf,
    lists: HistoryLists,
}

impl SearchHistory {
    /// Open the history at `path`. A missing file is an empty history.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, HistoryError> {
        let path = path.into();
        let lists = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| HistoryError::Parse {
                path: path.clone(),
                source: e,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HistoryLists::default(),
            Err(e) => return Err(HistoryError::Io { path, source: e }),
        };

        Ok(Self { path, lists })
    }

    /// History file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record a consumer id lookup. Returns whether the id was new.
    pub fn record_consumer(&mut self, consumer_id: &str) -> Result<bool, HistoryError> {
        let value = consumer_id.trim().to_string();
        self.record(|lists| &mut lists.consumer_ids, value)
    }

    /// Record a meter number lookup (stored lowercase). Returns whether the
    /// number was new.
    pub fn record_meter(&mut self, meter: &str) -> Result<bool, HistoryError> {
        let value = normalize_meter(meter);
        self.record(|lists| &mut lists.meter_numbers, value)
    }

    /// The most recent `limit` consumer ids, oldest first.
    pub fn recent_consumers(&self, limit: usize) -> &[String] {
        tail(&self.lists.consumer_ids, limit)
    }

    /// The most recent `limit` meter numbers, oldest first.
    pub fn recent_meters(&self, limit: usize) -> &[String] {
        tail(&self.lists.meter_numbers, limit)
    }

    fn record<F>(&mut self, list: F, value: String) -> Result<bool, HistoryError>
    where
        F: FnOnce(&mut HistoryLists) -> &mut Vec<String>,
    {
        if value.is_empty() {
            return Ok(false);
        }

        let entries = list(&mut self.lists);
        if entries.contains(&value) {
            return Ok(false);
        }
        entries.push(value);

        self.save()?;
        Ok(true)
    }

    fn save(&self) -> Result<(), HistoryError> {
        let json = serde_json::to_vec_pretty(&self.lists).map_err(|e| HistoryError::Parse {
            path: self.path.clone(),
            source: e,
        })?;
        write_bytes_atomic(&self.path, &json).map_err(|e| HistoryError::Io {
            path: self.path.clone(),
            source: e,
        })?;

        debug!(path = %self.path.display(), "Saved search history");
        Ok(())
    }
}

fn tail(entries: &[String], limit: usize) -> &[String] {
    &entries[entries.len().saturating_sub(limit)..]
}
