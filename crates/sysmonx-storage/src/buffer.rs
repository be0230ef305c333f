use crate::error::{FormatFailure, Result, StorageError};
use crate::retention::RetentionPolicy;
use crate::writer::{self, FlushBatch, FormatWriter};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use sysmonx_common::{CollectorConfig, Sample, StoredFile};

/// Why a flush ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlushTrigger {
    /// The buffer reached its capacity.
    Capacity,
    /// The oldest buffered sample outlived the flush interval.
    Interval,
    /// An explicit `force_flush`, including the one run on stop.
    Forced,
}

/// What one flush wrote and pruned.
#[derive(Debug, Clone, Serialize)]
pub struct FlushReport {
    pub trigger: FlushTrigger,
    /// When the flush started; recorded in the JSON metadata.
    pub created: DateTime<Local>,
    /// When every format finished writing; stored files are named after it.
    pub completed: DateTime<Local>,
    /// Samples taken out of the buffer by this flush.
    pub entries: usize,
    /// Files successfully written, one per format at most.
    pub files: Vec<StoredFile>,
    /// Expired files removed by retention after the write.
    pub pruned: Vec<PathBuf>,
    pub retention_failures: Vec<String>,
}

struct BufferState {
    samples: Vec<Sample>,
    /// When the oldest sample still buffered was appended.
    oldest_at: Option<Instant>,
}

/// Accumulates samples and flushes them to rotating CSV and JSON files.
///
/// The state mutex is never held across file I/O: a flush works on a
/// snapshot and only drains the samples it wrote. Flushes themselves are
/// serialized by a second lock, so a `force_flush` racing a size-triggered
/// flush writes each sample exactly once. While a flush is writing, appends
/// keep landing in the buffer, which can then briefly hold more than
/// `capacity` samples.
pub struct PersistenceBuffer {
    capacity: usize,
    dir: PathBuf,
    prefix: String,
    flush_interval: Option<Duration>,
    state: Mutex<BufferState>,
    flush_lock: Mutex<()>,
    writers: Vec<Box<dyn FormatWriter>>,
    retention: RetentionPolicy,
    flush_count: AtomicU64,
}

impl PersistenceBuffer {
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        Self::with_writers(config, writer::default_writers())
    }

    /// Build a buffer that writes with `writers` instead of CSV and JSON.
    pub fn with_writers(config: &CollectorConfig, writers: Vec<Box<dyn FormatWriter>>) -> Result<Self> {
        config.validate()?;

        let dir = config.logs_dir.clone();
        std::fs::create_dir_all(&dir).map_err(|e| StorageError::io(&dir, e))?;
        let stale = writer::remove_stale_tmp_files(&dir, &config.file_prefix)?;

        tracing::info!(
            dir = %dir.display(),
            capacity = config.buffer_size,
            max_files = config.max_files,
            stale_tmp_removed = stale,
            "Persistence buffer ready"
        );

        Ok(Self {
            capacity: config.buffer_size,
            dir,
            prefix: config.file_prefix.clone(),
            flush_interval: config.flush_interval(),
            state: Mutex::new(BufferState {
                samples: Vec::new(),
                oldest_at: None,
            }),
            flush_lock: Mutex::new(()),
            writers,
            retention: RetentionPolicy::new(config.max_files, config.file_prefix.clone()),
            flush_count: AtomicU64::new(0),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, BufferState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a sample, flushing synchronously when the buffer fills up or its
    /// oldest sample is older than the flush interval.
    ///
    /// Returns the report of the flush this append triggered, if any. A
    /// flush error is recoverable: the samples are gone from the buffer
    /// either way.
    pub fn append(&self, sample: Sample) -> Result<Option<FlushReport>> {
        self.append_at(sample, Instant::now())
    }

    pub(crate) fn append_at(&self, sample: Sample, now: Instant) -> Result<Option<FlushReport>> {
        let trigger = {
            let mut state = self.lock_state();
            state.samples.push(sample);
            let oldest_at = *state.oldest_at.get_or_insert(now);

            if state.samples.len() >= self.capacity {
                Some(FlushTrigger::Capacity)
            } else {
                self.flush_interval
                    .filter(|interval| now.saturating_duration_since(oldest_at) >= *interval)
                    .map(|_| FlushTrigger::Interval)
            }
        };

        match trigger {
            Some(trigger) => self.flush(trigger),
            None => Ok(None),
        }
    }

    /// Flush whatever is buffered. `Ok(None)` when the buffer is empty.
    pub fn force_flush(&self) -> Result<Option<FlushReport>> {
        self.flush(FlushTrigger::Forced)
    }

    fn flush(&self, trigger: FlushTrigger) -> Result<Option<FlushReport>> {
        let _flushing = self
            .flush_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let snapshot = self.lock_state().samples.clone();
        if snapshot.is_empty() {
            return Ok(None);
        }

        let created = Local::now();
        let batch = FlushBatch {
            samples: &snapshot,
            created,
            buffer_size: self.capacity,
        };

        let mut pending = Vec::with_capacity(self.writers.len());
        let mut failures = Vec::new();
        for format_writer in &self.writers {
            let format = format_writer.format();
            match writer::write_pending(&self.dir, &self.prefix, format_writer.as_ref(), &batch) {
                Ok(tmp) => pending.push((format, tmp)),
                Err(e) => {
                    tracing::error!(format = %format, error = %e, "Failed to write log file");
                    failures.push(FormatFailure {
                        format,
                        reason: e.to_string(),
                    });
                }
            }
        }

        let completed = Local::now();
        let stem = writer::file_stem(&self.prefix, completed);
        let mut files = Vec::with_capacity(pending.len());
        for (format, tmp) in pending {
            match writer::commit_pending(&tmp, &self.dir, &stem, format) {
                Ok(path) => {
                    let modified_time = std::fs::metadata(&path)
                        .and_then(|m| m.modified())
                        .map(DateTime::<Local>::from)
                        .unwrap_or(completed);
                    files.push(StoredFile {
                        path,
                        format,
                        modified_time,
                        entry_count: snapshot.len(),
                    });
                }
                Err(e) => {
                    tracing::error!(format = %format, error = %e, "Failed to rename log file into place");
                    failures.push(FormatFailure {
                        format,
                        reason: e.to_string(),
                    });
                }
            }
        }

        // Cleared whether or not every format succeeded; failed batches
        // are not replayed.
        {
            let mut state = self.lock_state();
            let written = snapshot.len().min(state.samples.len());
            state.samples.drain(..written);
            state.oldest_at = if state.samples.is_empty() {
                None
            } else {
                Some(Instant::now())
            };
        }

        let mut pruned = Vec::new();
        let mut retention_failures = Vec::new();
        for format_writer in &self.writers {
            let format = format_writer.format();
            match self.retention.prune(&self.dir, format) {
                Ok(report) => {
                    pruned.extend(report.removed);
                    retention_failures.extend(
                        report
                            .failed
                            .into_iter()
                            .map(|(path, reason)| format!("{}: {reason}", path.display())),
                    );
                }
                Err(e) => {
                    tracing::error!(format = %format, error = %e, "Retention pass failed");
                    retention_failures.push(format!("{format}: {e}"));
                }
            }
        }

        let flushes = self.flush_count.fetch_add(1, Ordering::Relaxed) + 1;
        let report = FlushReport {
            trigger,
            created,
            completed,
            entries: snapshot.len(),
            files,
            pruned,
            retention_failures,
        };

        tracing::info!(
            trigger = ?trigger,
            entries = report.entries,
            files = report.files.len(),
            pruned = report.pruned.len(),
            flushes,
            "Flushed samples"
        );

        if failures.is_empty() {
            Ok(Some(report))
        } else {
            Err(StorageError::FlushFailed { report, failures })
        }
    }

    /// The last `count` buffered samples, oldest first.
    pub fn recent(&self, count: usize) -> Vec<Sample> {
        let state = self.lock_state();
        let start = state.samples.len().saturating_sub(count);
        state.samples[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.lock_state().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Flushes completed so far, including partially failed ones.
    pub fn flush_count(&self) -> u64 {
        self.flush_count.load(Ordering::Relaxed)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_files(&self) -> usize {
        self.retention.max_files_per_format()
    }
}
