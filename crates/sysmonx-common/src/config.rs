use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors raised while reading or validating collector configuration.
///
/// These are the only fatal errors of the pipeline: a collector refuses to
/// start with an invalid configuration, everything after startup is
/// recoverable.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A field holds a value the pipeline cannot run with.
    #[error("Config: invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Config: failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config: failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Largest accepted `event_capacity`. The broadcast channel allocates every
/// slot up front.
pub const MAX_EVENT_CAPACITY: usize = 65_536;

/// Configuration consumed by the collector, the persistence buffer and the
/// retention policy.
///
/// Every field carries a serde default, so deserializing a partial document
/// merges it with the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Samples buffered before a size-triggered flush.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Files kept per format after each flush.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
    /// Samples kept in memory for live charts.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
    /// Mount point (or volume root) whose usage is sampled.
    #[serde(default = "default_disk_mount")]
    pub disk_mount: PathBuf,
    /// Flush a partial buffer once its oldest sample is this many seconds
    /// old. 0 disables the time trigger.
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
    #[serde(default = "default_sample_timeout_ms")]
    pub sample_timeout_ms: u64,
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
    #[serde(default = "default_flush_on_stop")]
    pub flush_on_stop: bool,
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            max_files: default_max_files(),
            sample_interval_ms: default_sample_interval_ms(),
            history_capacity: default_history_capacity(),
            logs_dir: default_logs_dir(),
            file_prefix: default_file_prefix(),
            disk_mount: default_disk_mount(),
            flush_interval_secs: default_flush_interval_secs(),
            sample_timeout_ms: default_sample_timeout_ms(),
            stop_grace_ms: default_stop_grace_ms(),
            flush_on_stop: default_flush_on_stop(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_buffer_size() -> usize {
    60
}

fn default_max_files() -> usize {
    10
}

fn default_sample_interval_ms() -> u64 {
    1000
}

fn default_history_capacity() -> usize {
    300 // 5 minutes at 1 Hz
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_file_prefix() -> String {
    "system_monitor".to_string()
}

#[cfg(windows)]
fn default_disk_mount() -> PathBuf {
    PathBuf::from("C:\\")
}

#[cfg(not(windows))]
fn default_disk_mount() -> PathBuf {
    PathBuf::from("/")
}

fn default_flush_interval_secs() -> u64 {
    60
}

fn default_sample_timeout_ms() -> u64 {
    1000
}

fn default_stop_grace_ms() -> u64 {
    5000
}

fn default_flush_on_stop() -> bool {
    true
}

fn default_event_capacity() -> usize {
    256
}

impl CollectorConfig {
    /// Parse a TOML document; absent keys take their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use sysmonx_common::CollectorConfig;
    ///
    /// let config = CollectorConfig::from_toml_str("buffer_size = 3").unwrap();
    /// assert_eq!(config.buffer_size, 3);
    /// assert_eq!(config.max_files, 10);
    /// ```
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject values the pipeline cannot run with, naming the first
    /// offending field.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("buffer_size", self.buffer_size as u64),
            ("max_files", self.max_files as u64),
            ("sample_interval_ms", self.sample_interval_ms),
            ("history_capacity", self.history_capacity as u64),
            ("sample_timeout_ms", self.sample_timeout_ms),
            ("event_capacity", self.event_capacity as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than 0".to_string(),
                });
            }
        }

        if self.event_capacity > MAX_EVENT_CAPACITY {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: format!("must be at most {MAX_EVENT_CAPACITY}"),
            });
        }

        let prefix = self.file_prefix.trim();
        if prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "file_prefix",
                reason: "must not be empty".to_string(),
            });
        }
        if prefix.contains(['/', '\\']) {
            return Err(ConfigError::Invalid {
                field: "file_prefix",
                reason: format!("must be a plain file name, got '{prefix}'"),
            });
        }

        Ok(())
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }

    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    /// `None` when the time-based flush trigger is disabled.
    pub fn flush_interval(&self) -> Option<Duration> {
        (self.flush_interval_secs > 0).then(|| Duration::from_secs(self.flush_interval_secs))
    }
}
