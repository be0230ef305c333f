use serde::Deserialize;
use std::path::Path;
use sysmonx_common::CollectorConfig;

/// Configuration file of the `sysmonx-agent` binary.
///
/// ```toml
/// log_level = "debug"
///
/// [collector]
/// buffer_size = 60
/// logs_dir = "/var/log/sysmonx"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub collector: CollectorConfig,
    /// Default level for `sysmonx` targets; `RUST_LOG` can still override.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            collector: CollectorConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl AgentConfig {
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// `None` when no file exists at `path`; a file that exists but does
    /// not parse is still an error.
    pub fn load_optional(path: &str) -> anyhow::Result<Option<Self>> {
        if !Path::new(path).exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    /// The `EnvFilter` directive applied on top of `RUST_LOG`.
    pub fn log_directive(&self) -> String {
        format!("sysmonx={}", self.log_level.trim().to_lowercase())
    }
}
