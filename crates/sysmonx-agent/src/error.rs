use sysmonx_common::ConfigError;
use sysmonx_storage::StorageError;

/// Errors returned by the collector control surface.
///
/// A collector that fails to build never runs; once running, per-tick
/// failures are reported as events and logs instead.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Collector: start() must be called from within a tokio runtime")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, CollectorError>;
