use crate::clock::MonotonicClock;
use crate::error::{CollectorError, Result};
use crate::events::{CollectorEvent, ErrorKind, EventBus, EventSubscriber};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use sysmonx_collector::{HostMetricsSource, MetricsSource};
use sysmonx_common::{CollectorConfig, CollectorStatus, Sample};
use sysmonx_storage::{FlushReport, PersistenceBuffer, RingHistory, StorageError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, MissedTickBehavior};

/// How [`Collector::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The collector was not running.
    AlreadyStopped,
    /// The loop exited within the grace period, after its final flush.
    Graceful,
    /// The grace period expired; the loop was aborted and samples still
    /// buffered are lost.
    Abandoned,
    /// The loop had panicked before it could be stopped.
    Panicked,
}

/// State shared between the control surface and the sampling loop.
struct Shared {
    config: CollectorConfig,
    source: Arc<Mutex<Box<dyn MetricsSource>>>,
    buffer: Arc<PersistenceBuffer>,
    history: Arc<RingHistory>,
    events: EventBus,
    clock: Mutex<MonotonicClock>,
    /// Held for a whole tick, so ticks from the loop and `sample_once`
    /// never interleave.
    tick_lock: tokio::sync::Mutex<()>,
    /// Set while a source call is running on a blocking thread; stays set
    /// after a timeout until the stuck call returns.
    source_busy: Arc<AtomicBool>,
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Background sampler feeding the in-memory history and the persistence
/// buffer.
///
/// `start` spawns the sampling loop on the current tokio runtime and is
/// idempotent; `stop` asks the loop to exit and waits for it up to the
/// configured grace period. Every other method is safe to call from any
/// thread while the loop runs.
pub struct Collector {
    shared: Arc<Shared>,
    worker: Mutex<Option<Worker>>,
}

impl Collector {
    /// Build a collector around `source`.
    ///
    /// Fails on an invalid configuration or when the logs directory cannot
    /// be prepared; a collector that was built can always be started.
    pub fn new(config: CollectorConfig, source: Box<dyn MetricsSource>) -> Result<Self> {
        config.validate()?;
        let buffer = PersistenceBuffer::new(&config)?;
        let history = RingHistory::new(config.history_capacity);
        let events = EventBus::new(config.event_capacity);

        Ok(Self {
            shared: Arc::new(Shared {
                source: Arc::new(Mutex::new(source)),
                buffer: Arc::new(buffer),
                history: Arc::new(history),
                events,
                clock: Mutex::new(MonotonicClock::new()),
                tick_lock: tokio::sync::Mutex::new(()),
                source_busy: Arc::new(AtomicBool::new(false)),
                config,
            }),
            worker: Mutex::new(None),
        })
    }

    /// A collector sampling the local host, with disk usage read from
    /// `config.disk_mount`.
    pub fn with_host_source(config: CollectorConfig) -> Result<Self> {
        let source = HostMetricsSource::new(config.disk_mount.clone());
        Self::new(config, Box::new(source))
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<Worker>> {
        self.worker
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start the sampling loop. A no-op when it is already running.
    pub fn start(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| CollectorError::NoRuntime)?;

        let mut worker = self.lock_worker();
        if worker.as_ref().is_some_and(|w| !w.handle.is_finished()) {
            tracing::debug!("Collector already running");
            return Ok(());
        }

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(run(self.shared.clone(), shutdown_rx));
        *worker = Some(Worker { shutdown, handle });

        tracing::info!(
            interval_ms = self.shared.config.sample_interval_ms,
            buffer_size = self.shared.config.buffer_size,
            logs_dir = %self.shared.config.logs_dir.display(),
            "Collector started"
        );
        Ok(())
    }

    /// Stop the sampling loop, waiting up to `stop_grace_ms` for it to
    /// finish its current tick and final flush.
    pub async fn stop(&self) -> StopOutcome {
        let Some(worker) = self.lock_worker().take() else {
            return StopOutcome::AlreadyStopped;
        };
        let _ = worker.shutdown.send(true);

        let grace = self.shared.config.stop_grace();
        let mut handle = worker.handle;
        match timeout(grace, &mut handle).await {
            Ok(Ok(())) => {
                tracing::info!("Collector stopped");
                StopOutcome::Graceful
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Sampling loop ended abnormally");
                StopOutcome::Panicked
            }
            Err(_) => {
                handle.abort();
                tracing::warn!(
                    grace_ms = grace.as_millis() as u64,
                    buffered = self.shared.buffer.len(),
                    "Sampling loop did not stop in time, abandoning it"
                );
                StopOutcome::Abandoned
            }
        }
    }

    /// Run one tick outside the loop: sample, record in history, buffer.
    ///
    /// While the loop is running this waits for its current tick, so
    /// samples keep their sampling order.
    pub async fn sample_once(&self) -> Sample {
        self.shared.tick().await
    }

    /// Flush the buffered samples now, blocking on file I/O.
    ///
    /// From async code, call this through `spawn_blocking`.
    pub fn force_flush(&self) -> Result<Option<FlushReport>> {
        let result = self.shared.buffer.force_flush();
        self.shared.publish_flush(&result);
        Ok(result?)
    }

    pub fn is_active(&self) -> bool {
        self.lock_worker()
            .as_ref()
            .is_some_and(|w| !w.handle.is_finished())
    }

    pub fn status(&self) -> CollectorStatus {
        let buffer = &self.shared.buffer;
        CollectorStatus {
            active: self.is_active(),
            buffered_count: buffer.len(),
            buffer_capacity: buffer.capacity(),
            history_len: self.shared.history.len(),
            flush_count: buffer.flush_count(),
            logs_dir: buffer.dir().to_path_buf(),
            max_files: buffer.max_files(),
        }
    }

    pub fn subscribe(&self) -> EventSubscriber {
        self.shared.events.subscribe()
    }

    pub fn history(&self) -> Arc<RingHistory> {
        self.shared.history.clone()
    }

    /// The last `count` samples waiting for the next flush.
    pub fn buffered(&self, count: usize) -> Vec<Sample> {
        self.shared.buffer.recent(count)
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.shared.config
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        // The detached loop still runs its final flush.
        if let Some(worker) = self.lock_worker().take() {
            let _ = worker.shutdown.send(true);
        }
    }
}

async fn run(shared: Arc<Shared>, mut shutdown: watch::Receiver<bool>) {
    let mut tick = interval(shared.config.sample_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.changed() => break,
            _ = tick.tick() => {
                shared.tick().await;
            }
        }
    }

    tracing::debug!("Sampling loop exiting");
    if shared.config.flush_on_stop {
        let buffer = shared.buffer.clone();
        match tokio::task::spawn_blocking(move || buffer.force_flush()).await {
            Ok(result) => shared.publish_flush(&result),
            Err(e) => tracing::error!(error = %e, "Final flush panicked"),
        }
    }
}

/// Clears the source-busy flag when the blocking call returns or unwinds.
struct BusyFlag(Arc<AtomicBool>);

impl Drop for BusyFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Shared {
    async fn tick(&self) -> Sample {
        let _ticking = self.tick_lock.lock().await;

        let sample = match self.read_source().await {
            Ok(mut sample) => {
                sample.timestamp = self.lock_clock().stamp(sample.timestamp);
                sample
            }
            Err((kind, message)) => {
                tracing::warn!(kind = ?kind, error = %message, "Sampling failed, recording unavailable sample");
                self.events.publish(CollectorEvent::error(kind, message));
                Sample::unavailable(self.lock_clock().now())
            }
        };

        let missing = sample.missing_fields();
        if !missing.is_empty() {
            tracing::debug!(?missing, "Sample has unavailable fields");
        }

        self.history.push(sample.clone());
        self.events.publish(CollectorEvent::Sampled(sample.clone()));

        let buffer = self.buffer.clone();
        let buffered = sample.clone();
        match tokio::task::spawn_blocking(move || buffer.append(buffered)).await {
            Ok(result) => self.publish_flush(&result),
            Err(e) => {
                tracing::error!(error = %e, "Persistence task panicked");
                self.events
                    .publish(CollectorEvent::error(ErrorKind::FlushFailure, e.to_string()));
            }
        }

        sample
    }

    fn lock_clock(&self) -> MutexGuard<'_, MonotonicClock> {
        self.clock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Call the source on a blocking thread, bounded by the sample timeout.
    ///
    /// Ticks are serialized, so the source is only busy here when an earlier
    /// call timed out and is still running. Ticks fail fast as timeouts until
    /// it returns instead of queueing behind it.
    async fn read_source(&self) -> std::result::Result<Sample, (ErrorKind, String)> {
        if self.source_busy.swap(true, Ordering::AcqRel) {
            return Err((
                ErrorKind::SourceTimeout,
                "previous sample is still running".to_string(),
            ));
        }

        let source = self.source.clone();
        let busy = BusyFlag(self.source_busy.clone());
        let task = tokio::task::spawn_blocking(move || {
            let _busy = busy;
            source
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .sample()
        });

        let limit = self.config.sample_timeout();
        match timeout(limit, task).await {
            Ok(Ok(Ok(sample))) => Ok(sample),
            Ok(Ok(Err(e))) => Err((ErrorKind::SourceUnavailable, e.to_string())),
            Ok(Err(e)) => Err((ErrorKind::SourceUnavailable, format!("metrics source panicked: {e}"))),
            Err(_) => Err((
                ErrorKind::SourceTimeout,
                format!("metrics source did not respond within {}ms", limit.as_millis()),
            )),
        }
    }

    /// Log a flush outcome and publish the matching events.
    fn publish_flush(&self, result: &sysmonx_storage::Result<Option<FlushReport>>) {
        match result {
            Ok(None) => {}
            Ok(Some(report)) => self.publish_report(report),
            Err(StorageError::FlushFailed { report, failures }) => {
                for failure in failures {
                    tracing::warn!(format = %failure.format, reason = %failure.reason, "Flush failed for format");
                    self.events.publish(CollectorEvent::error(
                        ErrorKind::FlushFailure,
                        format!("{}: {}", failure.format, failure.reason),
                    ));
                }
                // The prune pass runs even when every format failed.
                if report.files.is_empty() {
                    self.publish_retention_failures(report);
                } else {
                    self.publish_report(report);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Flush failed");
                self.events
                    .publish(CollectorEvent::error(ErrorKind::FlushFailure, e.to_string()));
            }
        }
    }

    fn publish_report(&self, report: &FlushReport) {
        self.publish_retention_failures(report);
        self.events.publish(CollectorEvent::Flushed(report.clone()));
    }

    fn publish_retention_failures(&self, report: &FlushReport) {
        for failure in &report.retention_failures {
            tracing::warn!(reason = %failure, "Retention failed");
            self.events
                .publish(CollectorEvent::error(ErrorKind::RetentionFailure, failure.clone()));
        }
    }
}
