#![allow(dead_code)]

use chrono::Local;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sysmonx_agent::{CollectorEvent, EventSubscriber};
use sysmonx_collector::{MetricsSource, SourceError};
use sysmonx_common::{CollectorConfig, Sample};
use sysmonx_storage::writer::JsonDocument;
use tempfile::TempDir;

/// Replays fixed cpu readings, cycling once exhausted.
pub struct ScriptedSource {
    values: Vec<f64>,
    next: usize,
}

impl ScriptedSource {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, next: 0 }
    }
}

impl MetricsSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn sample(&mut self) -> Result<Sample, SourceError> {
        let mut sample = Sample::unavailable(Local::now());
        sample.cpu_percent = Some(self.values[self.next % self.values.len()]);
        sample.cpu_count = Some(4);
        sample.platform = Some("test".into());
        self.next += 1;
        Ok(sample)
    }
}

/// Fails every call as if permission was denied.
pub struct FailingSource;

impl MetricsSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    fn sample(&mut self) -> Result<Sample, SourceError> {
        Err(SourceError::Unavailable {
            source_name: "failing".into(),
            reason: "permission denied".into(),
        })
    }
}

/// Blocks for `delay` before answering.
pub struct SlowSource {
    pub delay: Duration,
}

impl MetricsSource for SlowSource {
    fn name(&self) -> &str {
        "slow"
    }

    fn sample(&mut self) -> Result<Sample, SourceError> {
        std::thread::sleep(self.delay);
        let mut sample = Sample::unavailable(Local::now());
        sample.cpu_percent = Some(1.0);
        Ok(sample)
    }
}

/// Defaults tuned for tests: fast ticks, no time-based flush.
pub fn test_config(dir: &Path) -> CollectorConfig {
    CollectorConfig {
        logs_dir: dir.to_path_buf(),
        sample_interval_ms: 10,
        flush_interval_secs: 0,
        stop_grace_ms: 2000,
        ..Default::default()
    }
}

pub fn temp_logs() -> TempDir {
    TempDir::new().unwrap()
}

pub fn json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().is_some_and(|e| e == "json"))
        .collect();
    files.sort();
    files
}

pub fn read_json(path: &Path) -> JsonDocument {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

pub fn cpu_values(samples: &[Sample]) -> Vec<f64> {
    samples.iter().filter_map(|s| s.cpu_percent).collect()
}

/// Drain already-queued events.
pub fn drain(subscriber: &mut EventSubscriber) -> Vec<CollectorEvent> {
    let mut events = Vec::new();
    while let Some(event) = subscriber.try_recv() {
        events.push(event);
    }
    events
}

/// Wait until `count` `Sampled` events arrived, or panic after `limit`.
pub async fn wait_for_samples(subscriber: &mut EventSubscriber, count: usize, limit: Duration) {
    let mut seen = 0;
    tokio::time::timeout(limit, async {
        while seen < count {
            if let Some(CollectorEvent::Sampled(_)) = subscriber.recv().await {
                seen += 1;
            }
        }
    })
    .await
    .expect("timed out waiting for samples");
}
