use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Bytes per gigabyte as used in the stored file columns (binary GiB).
pub const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Convert a byte count to the gigabyte unit used by stored files.
///
/// # Examples
///
/// ```
/// use sysmonx_common::types::bytes_to_gb;
///
/// assert_eq!(bytes_to_gb(2 * 1024 * 1024 * 1024), 2.0);
/// ```
pub fn bytes_to_gb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_GB
}

/// One timestamped snapshot of host metrics.
///
/// Every metric is optional: `None` means the value could not be read,
/// which is distinct from a genuine zero reading (an idle CPU reports
/// `Some(0.0)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Local>,
    /// Global CPU utilization, 0-100.
    pub cpu_percent: Option<f64>,
    /// Logical core count, always positive when present.
    pub cpu_count: Option<u32>,
    pub cpu_freq_ghz: Option<f64>,
    pub ram_percent: Option<f64>,
    pub ram_used_bytes: Option<u64>,
    pub ram_total_bytes: Option<u64>,
    /// Usage of the configured mount point.
    pub disk_percent: Option<f64>,
    pub disk_used_bytes: Option<u64>,
    pub disk_total_bytes: Option<u64>,
    pub platform: Option<String>,
    pub username: Option<String>,
}

impl Sample {
    /// A sample with every metric marked unavailable.
    ///
    /// Used when the metrics source fails outright, so the tick still
    /// produces a row instead of a gap.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Local;
    /// use sysmonx_common::Sample;
    ///
    /// let sample = Sample::unavailable(Local::now());
    /// assert!(sample.cpu_percent.is_none());
    /// assert!(!sample.is_complete());
    /// ```
    pub fn unavailable(timestamp: DateTime<Local>) -> Self {
        Self {
            timestamp,
            cpu_percent: None,
            cpu_count: None,
            cpu_freq_ghz: None,
            ram_percent: None,
            ram_used_bytes: None,
            ram_total_bytes: None,
            disk_percent: None,
            disk_used_bytes: None,
            disk_total_bytes: None,
            platform: None,
            username: None,
        }
    }

    /// Returns true when no metric is marked unavailable.
    pub fn is_complete(&self) -> bool {
        self.cpu_percent.is_some()
            && self.cpu_count.is_some()
            && self.cpu_freq_ghz.is_some()
            && self.ram_percent.is_some()
            && self.ram_used_bytes.is_some()
            && self.ram_total_bytes.is_some()
            && self.disk_percent.is_some()
            && self.disk_used_bytes.is_some()
            && self.disk_total_bytes.is_some()
            && self.platform.is_some()
            && self.username.is_some()
    }

    /// Names of the metrics that could not be read, in column order.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let checks = [
            ("cpu_percent", self.cpu_percent.is_none()),
            ("cpu_count", self.cpu_count.is_none()),
            ("cpu_freq_ghz", self.cpu_freq_ghz.is_none()),
            ("ram_percent", self.ram_percent.is_none()),
            ("ram_used", self.ram_used_bytes.is_none()),
            ("ram_total", self.ram_total_bytes.is_none()),
            ("disk_percent", self.disk_percent.is_none()),
            ("disk_used", self.disk_used_bytes.is_none()),
            ("disk_total", self.disk_total_bytes.is_none()),
            ("platform", self.platform.is_none()),
            ("username", self.username.is_none()),
        ];
        checks
            .iter()
            .filter(|(_, missing)| *missing)
            .map(|(name, _)| *name)
            .collect()
    }
}

/// Durable file formats written on every flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    /// File extension without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileFormat::Csv => write!(f, "CSV"),
            FileFormat::Json => write!(f, "JSON"),
        }
    }
}

/// A flushed file on disk. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub path: PathBuf,
    pub format: FileFormat,
    pub modified_time: DateTime<Local>,
    pub entry_count: usize,
}

/// Snapshot of the collector for UI and tray consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectorStatus {
    pub active: bool,
    pub buffered_count: usize,
    pub buffer_capacity: usize,
    pub history_len: usize,
    pub flush_count: u64,
    pub logs_dir: PathBuf,
    pub max_files: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_sample() -> Sample {
        Sample {
            timestamp: Local::now(),
            cpu_percent: Some(0.0),
            cpu_count: Some(8),
            cpu_freq_ghz: Some(3.2),
            ram_percent: Some(41.5),
            ram_used_bytes: Some(4 * 1024 * 1024 * 1024),
            ram_total_bytes: Some(16 * 1024 * 1024 * 1024),
            disk_percent: Some(70.0),
            disk_used_bytes: Some(350 * 1024 * 1024 * 1024),
            disk_total_bytes: Some(500 * 1024 * 1024 * 1024),
            platform: Some("linux".into()),
            username: Some("monitor".into()),
        }
    }

    #[test]
    fn zero_cpu_counts_as_available() {
        let sample = full_sample();
        assert!(sample.is_complete());
        assert!(sample.missing_fields().is_empty());
    }

    #[test]
    fn missing_fields_lists_unavailable_metrics_in_column_order() {
        let mut sample = full_sample();
        sample.cpu_freq_ghz = None;
        sample.disk_total_bytes = None;
        assert_eq!(sample.missing_fields(), vec!["cpu_freq_ghz", "disk_total"]);
    }

    #[test]
    fn file_format_extensions() {
        assert_eq!(FileFormat::Csv.extension(), "csv");
        assert_eq!(FileFormat::Json.extension(), "json");
        assert_eq!(FileFormat::Json.to_string(), "JSON");
    }

    #[test]
    fn bytes_to_gb_uses_binary_units() {
        assert!((bytes_to_gb(1536 * 1024 * 1024) - 1.5).abs() < f64::EPSILON);
    }
}
