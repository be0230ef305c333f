use crate::buffer::FlushReport;
use serde::Serialize;
use std::path::PathBuf;
use sysmonx_common::{ConfigError, FileFormat};

/// Errors that can occur within the storage layer.
///
/// Only [`StorageError::Config`] is fatal. Everything raised by a flush is
/// recoverable: the buffer has already been cleared and the next flush
/// proceeds normally.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage: I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage: CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Every sequence suffix for this second is already taken.
    #[error("Storage: no free file name for '{stem}' in {dir:?}")]
    NameExhausted { dir: PathBuf, stem: String },

    /// At least one format could not be written. `report` describes what
    /// did get written and pruned.
    #[error(
        "Storage: flush of {} samples failed for {}",
        .report.entries,
        describe_failures(.failures)
    )]
    FlushFailed {
        report: FlushReport,
        failures: Vec<FormatFailure>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// One format that failed during a flush.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormatFailure {
    pub format: FileFormat,
    pub reason: String,
}

fn describe_failures(failures: &[FormatFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.format, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}
