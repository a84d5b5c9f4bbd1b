//! Consumer to meter-number mapping.
//!
//! The mapping is produced by an external importer as JSON:
//!
//! ```json
//! {
//!     "123456789": { "meter_no": "MTR-0042" },
//!     "987654321": { "meter_no": 100234 }
//! }
//! ```
//!
//! It is read-only here. Meter numbers may be strings or numbers; reverse
//! lookups ignore case and surrounding whitespace.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors loading a meter mapping file.
#[derive(Debug, Error)]
pub enum MeterMapError {
    #[error("failed to read meter mapping {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid meter mapping {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct MeterEntry {
    #[serde(default)]
    meter_no: Option<serde_json::Value>,
}

/// Bidirectional consumer id / meter number lookup.
#[derive(Debug, Clone, Default)]
pub struct ConsumerMeterMap {
    by_consumer: BTreeMap<String, String>,
    // Keyed by normalized meter number; ties resolve to the lowest consumer id.
    by_meter: BTreeMap<String, String>,
}

impl ConsumerMeterMap {
    /// Load a mapping file.
    pub fn load(path: &Path) -> Result<Self, MeterMapError> {
        let text = std::fs::read_to_string(path).map_err(|e| MeterMapError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let map = Self::from_json_str(&text).map_err(|e| MeterMapError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;

        debug!(path = %path.display(), entries = map.len(), "Loaded meter mapping");
        Ok(map)
    }

    /// Load a mapping file if it exists, logging and ignoring failures.
    pub fn load_optional(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match Self::load(path) {
            Ok(map) => Some(map),
            Err(e) => {
                warn!(error = %e, "Meter mapping unavailable");
                None
            }
        }
    }

    /// Parse mapping JSON.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, MeterEntry> = serde_json::from_str(json)?;
        Ok(Self::from_pairs(raw.into_iter().filter_map(|(consumer, entry)| {
            let meter = match entry.meter_no? {
                serde_json::Value::String(s) => s,
                serde_json::Value::Number(n) => n.to_string(),
                _ => return None,
            };
            Some((consumer, meter))
        })))
    }

    /// Build a mapping from `(consumer_id, meter_number)` pairs.
    pub fn from_pairs<I, C, M>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, M)>,
        C: Into<String>,
        M: Into<String>,
    {
        let mut map = Self::default();
        for (consumer, meter) in pairs {
            let consumer = consumer.into();
            let meter = meter.into();
            let key = normalize_meter(&meter);
            if key.is_empty() {
                continue;
            }

            map.by_meter
                .entry(key)
                .and_modify(|existing| {
                    if consumer < *existing {
                        *existing = consumer.clone();
                    }
                })
                .or_insert_with(|| consumer.clone());
            map.by_consumer.insert(consumer, meter);
        }
        map
    }

    /// Meter number recorded for a consumer.
    pub fn meter_for(&self, consumer_id: &str) -> Option<&str> {
        self.by_consumer.get(consumer_id).map(String::as_str)
    }

    /// Consumer id owning a meter number, ignoring case and whitespace.
    pub fn consumer_for_meter(&self, meter: &str) -> Option<&str> {
        self.by_meter
            .get(&normalize_meter(meter))
            .map(String::as_str)
    }

    /// Number of consumers with a meter number.
    pub fn len(&self) -> usize {
        self.by_consumer.len()
    }

    /// Check if the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.by_consumer.is_empty()
    }
}

/// Canonical form used to compare meter numbers.
pub fn normalize_meter(meter: &str) -> String {
    meter.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"{
        "123456789": { "meter_no": "MTR-0042" },
        "987654321": { "meter_no": 100234 },
        "111111111": {},
        "222222222": { "meter_no": null }
    }"#;

    #[test]
    fn test_forward_lookup() {
        let map = ConsumerMeterMap::from_json_str(SAMPLE).unwrap();
        assert_eq!(map.meter_for("123456789"), Some("MTR-0042"));
        assert_eq!(map.meter_for("987654321"), Some("100234"));
        assert_eq!(map.meter_for("111111111"), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_reverse_lookup_ignores_case_and_whitespace() {
        let map = ConsumerMeterMap::from_json_str(SAMPLE).unwrap();
        assert_eq!(map.consumer_for_meter("mtr-0042"), Some("123456789"));
        assert_eq!(map.consumer_for_meter("  MTR-0042 "), Some("123456789"));
        assert_eq!(map.consumer_for_meter("100234"), Some("987654321"));
        assert_eq!(map.consumer_for_meter("unknown"), None);
    }

    #[test]
    fn test_shared_meter_resolves_to_lowest_consumer() {
        let map = ConsumerMeterMap::from_pairs([
            ("900000000", "M1"),
            ("100000000", "m1"),
            ("500000000", "M1"),
        ]);
        assert_eq!(map.consumer_for_meter("M1"), Some("100000000"));
    }

    #[test]
    fn test_load_errors() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("absent.json");
        assert!(matches!(
            ConsumerMeterMap::load(&missing),
            Err(MeterMapError::Io { .. })
        ));
        assert!(ConsumerMeterMap::load_optional(&missing).is_none());

        let broken = temp.path().join("broken.json");
        std::fs::write(&broken, "[1, 2").unwrap();
        assert!(matches!(
            ConsumerMeterMap::load(&broken),
            Err(MeterMapError::Parse { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("meter_mapping.json");
        std::fs::write(&path, SAMPLE).unwrap();

        let map = ConsumerMeterMap::load(&path).unwrap();
        assert_eq!(map.meter_for("123456789"), Some("MTR-0042"));
    }
}
