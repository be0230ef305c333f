mod common;

use anyhow::Result;
use common::{
    drain, json_files, read_json, temp_logs, test_config, wait_for_samples, ScriptedSource, SlowSource,
};
use std::time::Duration;
use sysmonx_agent::{Collector, CollectorError, StopOutcome};
use sysmonx_common::{CollectorConfig, ConfigError};

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn start_is_idempotent_and_stop_flushes_remaining_samples() -> Result<()> {
    let logs = temp_logs();
    let collector = Collector::new(
        test_config(logs.path()),
        Box::new(ScriptedSource::new(vec![10.0, 20.0, 30.0])),
    )?;
    let mut events = collector.subscribe();

    collector.start()?;
    collector.start()?;
    assert!(collector.is_active());
    assert!(collector.status().active);

    wait_for_samples(&mut events, 5, Duration::from_secs(5)).await;

    assert_eq!(collector.stop().await, StopOutcome::Graceful);
    assert!(!collector.is_active());
    assert_eq!(collector.stop().await, StopOutcome::AlreadyStopped);

    // The buffer never filled, so the only file is the final flush.
    let status = collector.status();
    assert_eq!(status.buffered_count, 0);
    assert_eq!(status.flush_count, 1);
    let files = json_files(logs.path());
    assert_eq!(files.len(), 1);
    let doc = read_json(&files[0]);
    assert!(doc.metadata.entries >= 5);
    assert_eq!(doc.metadata.entries, collector.history().len());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn repeated_start_runs_a_single_loop() -> Result<()> {
    let logs = temp_logs();
    let config = CollectorConfig {
        sample_interval_ms: 100,
        ..test_config(logs.path())
    };
    let collector = Collector::new(config, Box::new(ScriptedSource::new(vec![1.0])))?;

    for _ in 0..3 {
        collector.start()?;
    }
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(collector.stop().await, StopOutcome::Graceful);

    // One loop ticks at 0, 100, 200, 300 and 400ms; three would triple that.
    let sampled = collector.history().len();
    assert!((1..=6).contains(&sampled), "{sampled} samples in 450ms");

    // Nothing keeps sampling once the only loop has stopped.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(collector.history().len(), sampled);
    Ok(())
}

#[tokio::test]
async fn stop_without_start_is_a_no_op() -> Result<()> {
    let logs = temp_logs();
    let collector = Collector::new(
        test_config(logs.path()),
        Box::new(ScriptedSource::new(vec![1.0])),
    )?;
    assert_eq!(collector.stop().await, StopOutcome::AlreadyStopped);
    assert!(json_files(logs.path()).is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn collector_restarts_after_stop() -> Result<()> {
    let logs = temp_logs();
    let collector = Collector::new(
        test_config(logs.path()),
        Box::new(ScriptedSource::new(vec![1.0])),
    )?;
    let mut events = collector.subscribe();

    collector.start()?;
    wait_for_samples(&mut events, 2, Duration::from_secs(5)).await;
    assert_eq!(collector.stop().await, StopOutcome::Graceful);
    drain(&mut events);

    collector.start()?;
    assert!(collector.is_active());
    wait_for_samples(&mut events, 2, Duration::from_secs(5)).await;
    assert_eq!(collector.stop().await, StopOutcome::Graceful);
    assert_eq!(collector.status().flush_count, 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_abandons_a_loop_stuck_past_the_grace_period() -> Result<()> {
    let logs = temp_logs();
    let config = CollectorConfig {
        sample_timeout_ms: 5_000,
        stop_grace_ms: 50,
        ..test_config(logs.path())
    };
    let collector = Collector::new(
        config,
        Box::new(SlowSource {
            delay: Duration::from_millis(500),
        }),
    )?;

    collector.start()?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(collector.stop().await, StopOutcome::Abandoned);
    assert!(!collector.is_active());
    Ok(())
}

#[test]
fn start_outside_a_runtime_is_refused() {
    let logs = temp_logs();
    let collector = Collector::new(
        test_config(logs.path()),
        Box::new(ScriptedSource::new(vec![1.0])),
    )
    .unwrap();
    assert!(matches!(collector.start(), Err(CollectorError::NoRuntime)));
    assert!(!collector.is_active());
}

#[test]
fn invalid_config_refuses_to_build() {
    let logs = temp_logs();
    let config = CollectorConfig {
        buffer_size: 0,
        ..test_config(logs.path())
    };
    match Collector::new(config, Box::new(ScriptedSource::new(vec![1.0]))) {
        Err(CollectorError::Config(ConfigError::Invalid { field, .. })) => {
            assert_eq!(field, "buffer_size")
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("collector built with buffer_size = 0"),
    }
}
