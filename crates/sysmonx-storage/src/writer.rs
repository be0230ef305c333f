//! Stored file formats and the atomic write path shared by both of them.
//!
//! Each flush serializes its batch to a pending `.tmp` file per format, then
//! renames every pending file to `<prefix>_<YYYYMMDD_HHMMSS>.<ext>`, stamped
//! with the time the writes completed. A reader never observes a
//! half-written file.

use crate::error::{Result, StorageError};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use sysmonx_common::types::bytes_to_gb;
use sysmonx_common::{FileFormat, Sample};

/// Version recorded in the JSON metadata block.
pub const FORMAT_VERSION: &str = "1.0.0";

/// CSV header, in column order.
pub const CSV_COLUMNS: [&str; 12] = [
    "timestamp",
    "cpu_percent",
    "cpu_count",
    "cpu_freq_ghz",
    "ram_percent",
    "ram_used_gb",
    "ram_total_gb",
    "disk_percent",
    "disk_used_gb",
    "disk_total_gb",
    "platform",
    "username",
];

/// Suffix appended to a file while it is being written.
pub const TMP_SUFFIX: &str = ".tmp";

/// Highest `_NNN` sequence suffix tried when names collide within a second.
const MAX_SEQUENCE: u32 = 999;

/// One sample as it appears in a stored file. Field order matches
/// [`CSV_COLUMNS`]; unavailable values are empty in CSV and `null` in JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub timestamp: DateTime<Local>,
    pub cpu_percent: Option<f64>,
    pub cpu_count: Option<u32>,
    pub cpu_freq_ghz: Option<f64>,
    pub ram_percent: Option<f64>,
    pub ram_used_gb: Option<f64>,
    pub ram_total_gb: Option<f64>,
    pub disk_percent: Option<f64>,
    pub disk_used_gb: Option<f64>,
    pub disk_total_gb: Option<f64>,
    pub platform: Option<String>,
    pub username: Option<String>,
}

impl From<&Sample> for SampleRecord {
    fn from(sample: &Sample) -> Self {
        Self {
            timestamp: sample.timestamp,
            cpu_percent: sample.cpu_percent,
            cpu_count: sample.cpu_count,
            cpu_freq_ghz: sample.cpu_freq_ghz,
            ram_percent: sample.ram_percent,
            ram_used_gb: sample.ram_used_bytes.map(bytes_to_gb),
            ram_total_gb: sample.ram_total_bytes.map(bytes_to_gb),
            disk_percent: sample.disk_percent,
            disk_used_gb: sample.disk_used_bytes.map(bytes_to_gb),
            disk_total_gb: sample.disk_total_bytes.map(bytes_to_gb),
            platform: sample.platform.clone(),
            username: sample.username.clone(),
        }
    }
}

/// Top-level object of a JSON stored file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDocument {
    pub metadata: JsonMetadata,
    pub data: Vec<SampleRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonMetadata {
    pub version: String,
    pub created: DateTime<Local>,
    pub entries: usize,
    pub buffer_size: usize,
}

/// The samples of one flush plus the context recorded alongside them.
pub struct FlushBatch<'a> {
    pub samples: &'a [Sample],
    pub created: DateTime<Local>,
    pub buffer_size: usize,
}

/// Serializes a flush batch in one file format.
pub trait FormatWriter: Send + Sync {
    fn format(&self) -> FileFormat;

    fn write(&self, out: &mut dyn Write, batch: &FlushBatch<'_>) -> Result<()>;
}

pub struct CsvWriter;

impl FormatWriter for CsvWriter {
    fn format(&self) -> FileFormat {
        FileFormat::Csv
    }

    fn write(&self, out: &mut dyn Write, batch: &FlushBatch<'_>) -> Result<()> {
        // The header is written explicitly so its order never depends on
        // serde field order.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(out);
        writer.write_record(CSV_COLUMNS)?;
        for sample in batch.samples {
            writer.serialize(SampleRecord::from(sample))?;
        }
        writer.flush().map_err(csv::Error::from)?;
        Ok(())
    }
}

pub struct JsonWriter;

impl FormatWriter for JsonWriter {
    fn format(&self) -> FileFormat {
        FileFormat::Json
    }

    fn write(&self, out: &mut dyn Write, batch: &FlushBatch<'_>) -> Result<()> {
        let document = JsonDocument {
            metadata: JsonMetadata {
                version: FORMAT_VERSION.to_string(),
                created: batch.created,
                entries: batch.samples.len(),
                buffer_size: batch.buffer_size,
            },
            data: batch.samples.iter().map(SampleRecord::from).collect(),
        };
        serde_json::to_writer_pretty(&mut *out, &document)?;
        out.write_all(b"\n")
            .map_err(|e| StorageError::Json(serde_json::Error::io(e)))?;
        Ok(())
    }
}

/// The writers used by default: CSV then JSON.
pub fn default_writers() -> Vec<Box<dyn FormatWriter>> {
    vec![Box::new(CsvWriter), Box::new(JsonWriter)]
}

/// `<prefix>_<YYYYMMDD_HHMMSS>` for the given instant.
///
/// # Examples
///
/// ```
/// use chrono::{Local, TimeZone};
/// use sysmonx_storage::writer::file_stem;
///
/// let ts = Local.with_ymd_and_hms(2026, 3, 7, 9, 5, 2).unwrap();
/// assert_eq!(file_stem("system_monitor", ts), "system_monitor_20260307_090502");
/// ```
pub fn file_stem(prefix: &str, ts: DateTime<Local>) -> String {
    format!("{prefix}_{}", ts.format("%Y%m%d_%H%M%S"))
}

/// Next path for `stem`: the plain name, then `_001` through `_999`.
///
/// The slot after the highest one already on disk is chosen, never a gap
/// left by retention, so names stay in write order. Zero padding keeps
/// lexical order chronological.
pub fn next_free_path(dir: &Path, stem: &str, format: FileFormat) -> Result<PathBuf> {
    let ext = format.extension();
    let mut next = 0;
    let entries = std::fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(dir, e))?;
        if let Some(slot) = sequence_slot(&entry.file_name().to_string_lossy(), stem, ext) {
            next = next.max(slot + 1);
        }
    }

    match next {
        0 => Ok(dir.join(format!("{stem}.{ext}"))),
        seq if seq <= MAX_SEQUENCE => Ok(dir.join(format!("{stem}_{seq:03}.{ext}"))),
        _ => Err(StorageError::NameExhausted {
            dir: dir.to_path_buf(),
            stem: stem.to_string(),
        }),
    }
}

/// 0 for `<stem>.<ext>`, N for `<stem>_NNN.<ext>`.
fn sequence_slot(name: &str, stem: &str, ext: &str) -> Option<u32> {
    let rest = name.strip_prefix(stem)?.strip_suffix(ext)?.strip_suffix('.')?;
    if rest.is_empty() {
        return Some(0);
    }
    let digits = rest.strip_prefix('_')?;
    if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Serialize `batch` to `<prefix>_pending.<ext>.tmp` and return that path.
///
/// Callers serialize flushes per prefix. On failure the temporary file is
/// removed.
pub fn write_pending(
    dir: &Path,
    prefix: &str,
    writer: &dyn FormatWriter,
    batch: &FlushBatch<'_>,
) -> Result<PathBuf> {
    let tmp = dir.join(format!("{prefix}_pending.{}{TMP_SUFFIX}", writer.format().extension()));
    if let Err(e) = write_tmp(&tmp, writer, batch) {
        discard_tmp(&tmp);
        return Err(e);
    }
    Ok(tmp)
}

/// Rename a pending file to the next free name for `stem` and return it.
///
/// Never overwrites an existing file. On failure the pending file is
/// removed and nothing appears under the final name.
pub fn commit_pending(tmp: &Path, dir: &Path, stem: &str, format: FileFormat) -> Result<PathBuf> {
    let result = next_free_path(dir, stem, format).and_then(|path| {
        if path.exists() {
            return Err(StorageError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::AlreadyExists, "stored file already exists"),
            ));
        }
        std::fs::rename(tmp, &path).map_err(|e| StorageError::io(&path, e))?;
        Ok(path)
    });

    if result.is_err() {
        discard_tmp(tmp);
    }
    result
}

fn discard_tmp(tmp: &Path) {
    if tmp.exists() {
        if let Err(e) = std::fs::remove_file(tmp) {
            tracing::warn!(path = %tmp.display(), error = %e, "Failed to remove temporary file");
        }
    }
}

fn write_tmp(tmp: &Path, writer: &dyn FormatWriter, batch: &FlushBatch<'_>) -> Result<()> {
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(tmp)
        .map_err(|e| StorageError::io(tmp, e))?;
    let mut out = BufWriter::new(file);
    writer.write(&mut out, batch)?;
    let file: File = out
        .into_inner()
        .map_err(|e| StorageError::io(tmp, e.into_error()))?;
    file.sync_all().map_err(|e| StorageError::io(tmp, e))?;
    Ok(())
}

/// Remove `.tmp` leftovers of an interrupted flush. Returns how many were
/// removed; failures are logged and skipped.
pub fn remove_stale_tmp_files(dir: &Path, prefix: &str) -> Result<usize> {
    let mut removed = 0;
    let entries = std::fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| StorageError::io(dir, e))?;
        let name = entry.file_name().to_string_lossy().to_string();
        if !(name.starts_with(prefix) && name.ends_with(TMP_SUFFIX)) {
            continue;
        }
        match std::fs::remove_file(entry.path()) {
            Ok(()) => {
                tracing::info!(path = %entry.path().display(), "Removed stale temporary file");
                removed += 1;
            }
            Err(e) => {
                tracing::warn!(path = %entry.path().display(), error = %e, "Failed to remove stale temporary file");
            }
        }
    }
    Ok(removed)
}
