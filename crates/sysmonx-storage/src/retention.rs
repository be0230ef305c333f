use crate::error::{Result, StorageError};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use sysmonx_common::FileFormat;

/// A stored file found in the logs directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

/// Outcome of one prune pass for one format.
#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub removed: Vec<PathBuf>,
    /// Files that could not be deleted; they are retried on the next pass.
    pub failed: Vec<(PathBuf, String)>,
}

/// Caps the number of stored files kept per format.
#[derive(Debug, Clone)]
pub struct RetentionPolicy {
    max_files_per_format: usize,
    file_prefix: String,
}

impl RetentionPolicy {
    pub fn new(max_files_per_format: usize, file_prefix: impl Into<String>) -> Self {
        Self {
            max_files_per_format,
            file_prefix: file_prefix.into(),
        }
    }

    pub fn max_files_per_format(&self) -> usize {
        self.max_files_per_format
    }

    /// Whether `file_name` is a stored file of `format` written with this
    /// policy's prefix. Temporary files never match.
    pub fn matches(&self, file_name: &str, format: FileFormat) -> bool {
        file_name.starts_with(&format!("{}_", self.file_prefix))
            && file_name.ends_with(&format!(".{}", format.extension()))
    }

    /// Pick the files to delete: the oldest by modification time beyond
    /// the cap. Ties fall back to file name, which sorts chronologically.
    pub fn select_expired(&self, mut files: Vec<FileEntry>) -> Vec<FileEntry> {
        if files.len() <= self.max_files_per_format {
            return Vec::new();
        }
        files.sort_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
        });
        let excess = files.len() - self.max_files_per_format;
        files.truncate(excess);
        files
    }

    /// Stored files of `format` in `dir`, in directory order.
    pub fn list(&self, dir: &Path, format: FileFormat) -> Result<Vec<FileEntry>> {
        let mut files = Vec::new();
        let entries = std::fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.matches(&name, format) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    // Deleted between listing and stat.
                    tracing::debug!(path = %entry.path().display(), error = %e, "Skipping unreadable entry");
                    continue;
                }
            };
            let modified = metadata.modified().map_err(|e| StorageError::io(entry.path(), e))?;
            files.push(FileEntry {
                path: entry.path(),
                modified,
            });
        }
        Ok(files)
    }

    /// Delete the oldest stored files of `format` beyond the cap.
    ///
    /// Deletion failures are logged and reported, never fatal; they are
    /// retried naturally by the next prune.
    pub fn prune(&self, dir: &Path, format: FileFormat) -> Result<PruneReport> {
        let expired = self.select_expired(self.list(dir, format)?);
        let mut report = PruneReport::default();

        for file in expired {
            match std::fs::remove_file(&file.path) {
                Ok(()) => {
                    tracing::info!(path = %file.path.display(), format = %format, "Removed expired log file");
                    report.removed.push(file.path);
                }
                Err(e) => {
                    tracing::error!(path = %file.path.display(), error = %e, "Failed to remove expired log file");
                    report.failed.push((file.path, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}
