//! Configuration.
//!
//! Two layers:
//!
//! - [`ConfigFile`]: the user-editable INI file at `~/.spotindex/config.ini`.
//!   Missing files and keys fall back to defaults.
//! - [`EngineConfig`]: the plain settings the engine is started with,
//!   independent of where they came from.
//!
//! ```ini
//! [sources]
//! primary = ~/spotbillfiles/image
//! list_file = ~/.spotindex/sources.json
//!
//! [index]
//! cache_dir = ~/.spotindex/snapshots
//! legacy_listing =
//!
//! [monitor]
//! interval_secs = 3
//!
//! [lookup]
//! meter_mapping = ~/.spotindex/meter_mapping.json
//! search_history = ~/.spotindex/searched_lists.json
//! history_limit = 8
//!
//! [logging]
//! directory = ~/.spotindex/logs
//! filter = info
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;
use tracing::debug;

use crate::history::DEFAULT_HISTORY_LIMIT;
use crate::monitor::DEFAULT_PROBE_INTERVAL;
use crate::persist::write_atomic;

/// Directory under the home directory holding all state.
pub const CONFIG_DIR_NAME: &str = ".spotindex";

/// Configuration file name.
pub const CONFIG_FILE_NAME: &str = "config.ini";

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Errors loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine home directory")]
    NoHomeDir,

    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: ini::Error,
    },

    #[error("failed to write config {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid value for [{section}] {key}: '{value}'")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
    },
}

/// `[sources]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcesSettings {
    /// The primary folder; always first in merge priority.
    pub primary: PathBuf,
    /// JSON file holding the ordered secondary folders.
    pub list_file: PathBuf,
}

/// `[index]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSettings {
    pub cache_dir: PathBuf,
    /// Regenerated on every full reindex when set.
    pub legacy_listing: Option<PathBuf>,
}

/// `[monitor]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorSettings {
    pub interval_secs: u64,
}

/// `[lookup]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupSettings {
    pub meter_mapping: PathBuf,
    pub search_history: PathBuf,
    pub history_limit: usize,
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub filter: String,
}

/// Contents of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub sources: SourcesSettings,
    pub index: IndexSettings,
    pub monitor: MonitorSettings,
    pub lookup: LookupSettings,
    pub logging: LoggingSettings,
}

impl ConfigFile {
    /// Defaults with every state file under `base`.
    pub fn defaults_in(base: &Path) -> Self {
        Self {
            sources: SourcesSettings {
                primary: base.join("images"),
                list_file: base.join("sources.json"),
            },
            index: IndexSettings {
                cache_dir: base.join("snapshots"),
                legacy_listing: None,
            },
            monitor: MonitorSettings {
                interval_secs: DEFAULT_PROBE_INTERVAL.as_secs(),
            },
            lookup: LookupSettings {
                meter_mapping: base.join("meter_mapping.json"),
                search_history: base.join("searched_lists.json"),
                history_limit: DEFAULT_HISTORY_LIMIT,
            },
            logging: LoggingSettings {
                directory: base.join("logs"),
                filter: DEFAULT_LOG_FILTER.to_string(),
            },
        }
    }

    /// Load a configuration file.
    ///
    /// A missing file yields defaults rooted at the file's directory. Relative
    /// paths in the file are resolved against that directory too, so the
    /// same file names the same folders from any working directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let mut config = Self::defaults_in(base);

        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(config);
        }

        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.apply(&ini, base)?;

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Write the configuration, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let ini = self.to_ini();
        write_atomic(path, |writer| ini.write_to(writer)).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Probe interval as a duration; never zero.
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.monitor.interval_secs.max(1))
    }

    /// Engine settings derived from this file.
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::new(&self.sources.primary, &self.index.cache_dir)
            .with_source_list(&self.sources.list_file)
            .with_probe_interval(self.probe_interval());
        if let Some(listing) = &self.index.legacy_listing {
            config = config.with_legacy_listing(listing);
        }
        if self.lookup.meter_mapping.exists() {
            config = config.with_meter_mapping(&self.lookup.meter_mapping);
        }
        config
    }

    fn apply(&mut self, ini: &Ini, base: &Path) -> Result<(), ConfigError> {
        let path = |v: &str| base.join(expand_tilde(v));
        if let Some(v) = value(ini, "sources", "primary") {
            self.sources.primary = path(v);
        }
        if let Some(v) = value(ini, "sources", "list_file") {
            self.sources.list_file = path(v);
        }
        if let Some(v) = value(ini, "index", "cache_dir") {
            self.index.cache_dir = path(v);
        }
        if let Some(v) = value(ini, "index", "legacy_listing") {
            self.index.legacy_listing = Some(path(v));
        }
        if let Some(v) = value(ini, "monitor", "interval_secs") {
            self.monitor.interval_secs = parse(v, "monitor", "interval_secs")?;
        }
        if let Some(v) = value(ini, "lookup", "meter_mapping") {
            self.lookup.meter_mapping = path(v);
        }
        if let Some(v) = value(ini, "lookup", "search_history") {
            self.lookup.search_history = path(v);
        }
        if let Some(v) = value(ini, "lookup", "history_limit") {
            self.lookup.history_limit = parse(v, "lookup", "history_limit")?;
        }
        if let Some(v) = value(ini, "logging", "directory") {
            self.logging.directory = path(v);
        }
        if let Some(v) = value(ini, "logging", "filter") {
            self.logging.filter = v.to_string();
        }
        Ok(())
    }

    fn to_ini(&self) -> Ini {
        let path = |p: &Path| p.display().to_string();
        let mut ini = Ini::new();

        ini.with_section(Some("sources"))
            .set("primary", path(&self.sources.primary))
            .set("list_file", path(&self.sources.list_file));
        ini.with_section(Some("index"))
            .set("cache_dir", path(&self.index.cache_dir))
            .set(
                "legacy_listing",
                self.index
                    .legacy_listing
                    .as_deref()
                    .map(path)
                    .unwrap_or_default(),
            );
        ini.with_section(Some("monitor"))
            .set("interval_secs", self.monitor.interval_secs.to_string());
        ini.with_section(Some("lookup"))
            .set("meter_mapping", path(&self.lookup.meter_mapping))
            .set("search_history", path(&self.lookup.search_history))
            .set("history_limit", self.lookup.history_limit.to_string());
        ini.with_section(Some("logging"))
            .set("directory", path(&self.logging.directory))
            .set("filter", self.logging.filter.clone());

        ini
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        let base = config_dir().unwrap_or_else(|_| PathBuf::from(CONFIG_DIR_NAME));
        Self::defaults_in(&base)
    }
}

/// Non-empty, trimmed value of a key.
fn value<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.get_from(Some(section), key)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(
    value: &str,
    section: &'static str,
    key: &'static str,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
    })
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(value: &str) -> PathBuf {
    match value.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\') => {
            match dirs::home_dir() {
                Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
                None => PathBuf::from(value),
            }
        }
        _ => PathBuf::from(value),
    }
}

/// Directory holding configuration and state.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR_NAME))
        .ok_or(ConfigError::NoHomeDir)
}

/// Path of the configuration file.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Settings the engine is started with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Primary source folder.
    pub primary: PathBuf,

    /// Persisted list of secondary folders; `None` keeps them in memory only.
    pub source_list: Option<PathBuf>,

    /// Snapshot directory.
    pub cache_dir: PathBuf,

    /// Legacy listing regenerated on full runs.
    pub legacy_listing: Option<PathBuf>,

    /// Availability probe interval.
    pub probe_interval: Duration,

    /// Consumer to meter-number mapping.
    pub meter_mapping: Option<PathBuf>,
}

impl EngineConfig {
    /// Create a configuration with the required locations.
    pub fn new(primary: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            source_list: None,
            cache_dir: cache_dir.into(),
            legacy_listing: None,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            meter_mapping: None,
        }
    }

    /// Persist secondary folders in this file.
    pub fn with_source_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_list = Some(path.into());
        self
    }

    /// Regenerate a legacy listing on full runs.
    pub fn with_legacy_listing(mut self, path: impl Into<PathBuf>) -> Self {
        self.legacy_listing = Some(path.into());
        self
    }

    /// Set the availability probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Resolve meter numbers through this mapping file.
    pub fn with_meter_mapping(mut self, path: impl Into<PathBuf>) -> Self {
        self.meter_mapping = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load(&temp.path().join(CONFIG_FILE_NAME)).unwrap();

        assert_eq!(config, ConfigFile::defaults_in(temp.path()));
        assert_eq!(config.monitor.interval_secs, 3);
        assert_eq!(config.lookup.history_limit, 8);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn test_partial_file_overrides_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(
            &path,
            "[sources]\nprimary = /data/images\n\n[monitor]\ninterval_secs = 10\n\n[index]\nlegacy_listing =\n",
        )
        .unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.sources.primary, PathBuf::from("/data/images"));
        assert_eq!(config.monitor.interval_secs, 10);
        assert_eq!(config.index.legacy_listing, None);
        assert_eq!(config.index.cache_dir, temp.path().join("snapshots"));
    }

    #[test]
    fn test_relative_paths_resolve_against_config_dir() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[sources]\nprimary = photos\n\n[index]\ncache_dir = state/snaps\n")
            .unwrap();

        let config = ConfigFile::load(&path).unwrap();
        assert_eq!(config.sources.primary, temp.path().join("photos"));
        assert_eq!(config.index.cache_dir, temp.path().join("state/snaps"));
    }

    #[test]
    fn test_save_then_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        let mut config = ConfigFile::defaults_in(temp.path());
        config.index.legacy_listing = Some(temp.path().join("images.txt"));
        config.logging.filter = "spotindex=debug".to_string();

        config.save(&path).unwrap();

        assert_eq!(ConfigFile::load(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[lookup]\nhistory_limit = lots\n").unwrap();

        let err = ConfigFile::load(&path).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                key: "history_limit",
                ..
            }
        ));
    }

    #[test]
    fn test_expand_tilde() {
        assert_eq!(expand_tilde("/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(expand_tilde("~user/x"), PathBuf::from("~user/x"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/images"), home.join("images"));
        }
    }

    #[test]
    fn test_engine_config_from_file() {
        let temp = TempDir::new().unwrap();
        let mut file = ConfigFile::defaults_in(temp.path());
        file.monitor.interval_secs = 0;

        let engine = file.engine_config();
        assert_eq!(engine.primary, temp.path().join("images"));
        assert_eq!(engine.source_list, Some(temp.path().join("sources.json")));
        assert_eq!(engine.probe_interval, Duration::from_secs(1));
        assert_eq!(engine.meter_mapping, None);
    }

    #[test]
    fn test_engine_config_builder() {
        let config = EngineConfig::new("/data/images", "/cache")
            .with_legacy_listing("/data/images.txt")
            .with_probe_interval(Duration::from_secs(5));

        assert_eq!(config.legacy_listing, Some(PathBuf::from("/data/images.txt")));
        assert_eq!(config.probe_interval, Duration::from_secs(5));
        assert!(config.source_list.is_none());
    }
}
