//! Configuration loading for itemsync.
//!
//! Configuration is loaded from a TOML file or built in code. Every field
//! has a default, so an empty file is a valid configuration.

use itemsync_core::RetryPolicy;
use itemsync_types::{DEFAULT_OWNER, ITEM_RECORD_TYPE};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for the sync engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Items zone configuration.
    pub zone: ZoneConfig,
    /// Record naming configuration.
    pub records: RecordsConfig,
    /// Fetch fan-out configuration.
    pub fetch: FetchConfig,
    /// Bootstrap retry configuration.
    pub retry: RetryConfig,
    /// Backend call timeouts.
    pub timeouts: TimeoutConfig,
    /// Change notification configuration.
    pub notifier: NotifierConfig,
}

/// Items zone configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ZoneConfig {
    /// Name of the zone holding all items (default: ItemsZone).
    #[serde(default = "default_zone_name")]
    pub name: String,
    /// Owner used in the root record name (default: the current user).
    #[serde(default = "default_owner")]
    pub owner: String,
}

/// Record naming configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordsConfig {
    /// Record type of items (default: Item).
    #[serde(default = "default_item_type")]
    pub item_type: String,
    /// Record type of the root-sharing record (default: ItemsRoot).
    #[serde(default = "default_root_type")]
    pub root_record_type: String,
    /// Prefix of the root-sharing record name (default: com.itemsync.root).
    #[serde(default = "default_root_prefix")]
    pub root_record_prefix: String,
}

/// Fetch fan-out configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Concurrent shared-zone queries (default: 4).
    #[serde(default = "default_workers")]
    pub workers: usize,
}

/// Bootstrap retry configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    /// Attempts per bootstrap step, including the first (default: 3).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds (default: 200).
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

/// Backend call timeouts.
#[derive(Debug, Clone, Deserialize)]
pub struct TimeoutConfig {
    /// Upper bound for one backend call in milliseconds, 0 = unbounded
    /// (default: 30000).
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,
}

/// Change notification configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NotifierConfig {
    /// Buffered notifications per subscriber before coalescing (default: 64).
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

// Default value functions
fn default_zone_name() -> String {
    "ItemsZone".to_string()
}

fn default_owner() -> String {
    DEFAULT_OWNER.to_string()
}

fn default_item_type() -> String {
    ITEM_RECORD_TYPE.to_string()
}

fn default_root_type() -> String {
    "ItemsRoot".to_string()
}

fn default_root_prefix() -> String {
    "com.itemsync.root".to_string()
}

fn default_workers() -> usize {
    4
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_call_timeout_ms() -> u64 {
    30_000 // 30 seconds
}

fn default_capacity() -> usize {
    64
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self {
            name: default_zone_name(),
            owner: default_owner(),
        }
    }
}

impl Default for RecordsConfig {
    fn default() -> Self {
        Self {
            item_type: default_item_type(),
            root_record_type: default_root_type(),
            root_record_prefix: default_root_prefix(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Well-known name of the root-sharing record.
    pub fn root_record_name(&self) -> String {
        format!("{}.{}", self.records.root_record_prefix, self.zone.owner)
    }

    /// Retry policy for bootstrap steps.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_attempts,
            Duration::from_millis(self.retry.base_delay_ms),
        )
    }

    /// Deadline for one backend call, `None` when unbounded.
    pub fn call_timeout(&self) -> Option<Duration> {
        match self.timeouts.call_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    /// Number of fetch workers (at least one).
    pub fn workers(&self) -> usize {
        self.fetch.workers.max(1)
    }

    /// Set the items zone name.
    pub fn with_zone_name(mut self, name: &str) -> Self {
        self.zone.name = name.to_string();
        self
    }

    /// Set the item record type.
    pub fn with_item_type(mut self, record_type: &str) -> Self {
        self.records.item_type = record_type.to_string();
        self
    }

    /// Set the number of fetch workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.fetch.workers = workers;
        self
    }

    /// Set the bootstrap retry budget.
    pub fn with_retry(mut self, max_attempts: u32, base_delay_ms: u64) -> Self {
        self.retry = RetryConfig {
            max_attempts,
            base_delay_ms,
        };
        self
    }

    /// Set the backend call timeout (0 = unbounded).
    pub fn with_call_timeout_ms(mut self, ms: u64) -> Self {
        self.timeouts.call_timeout_ms = ms;
        self
    }

    /// Set the notifier capacity.
    pub fn with_notifier_capacity(mut self, capacity: usize) -> Self {
        self.notifier.capacity = capacity;
        self
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SyncConfig::default();
        assert_eq!(config.zone.name, "ItemsZone");
        assert_eq!(config.records.item_type, "Item");
        assert_eq!(config.fetch.workers, 4);
        assert_eq!(config.call_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn root_record_name_includes_owner() {
        let config = SyncConfig::default();
        assert_eq!(
            config.root_record_name(),
            "com.itemsync.root.__defaultOwner__"
        );
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[zone]
name = "Groceries"

[records]
item_type = "Entry"
root_record_prefix = "org.example.root"

[fetch]
workers = 8

[retry]
max_attempts = 5
base_delay_ms = 50

[timeouts]
call_timeout_ms = 0
"#;

        let config: SyncConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.zone.name, "Groceries");
        assert_eq!(config.zone.owner, DEFAULT_OWNER);
        assert_eq!(config.records.item_type, "Entry");
        assert_eq!(config.records.root_record_type, "ItemsRoot");
        assert_eq!(config.workers(), 8);
        assert_eq!(config.retry_policy().max_attempts, 5);
        assert_eq!(config.retry_policy().base_delay, Duration::from_millis(50));
        assert_eq!(config.call_timeout(), None);
        assert_eq!(config.notifier.capacity, 64);
    }

    #[test]
    fn empty_toml_uses_defaults() {
        let config: SyncConfig = toml::from_str("").unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 200);
        assert_eq!(config.timeouts.call_timeout_ms, 30_000);
    }

    #[test]
    fn zero_workers_clamped_to_one() {
        let config = SyncConfig::default().with_workers(0);
        assert_eq!(config.workers(), 1);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = SyncConfig::from_file(&dir.path().join("missing.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn from_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("itemsync.toml");
        std::fs::write(&path, "[fetch]\nworkers = \"many\"\n").unwrap();

        let result = SyncConfig::from_file(&path);
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn from_file_reads_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("itemsync.toml");
        std::fs::write(&path, "[notifier]\ncapacity = 8\n").unwrap();

        let config = SyncConfig::from_file(&path).unwrap();
        assert_eq!(config.notifier.capacity, 8);
        assert_eq!(config.zone.name, "ItemsZone");
    }
}
