//! Host metric sources for the sysmonx sampler.
//!
//! A [`MetricsSource`] produces one [`Sample`] per call. The default
//! implementation, [`host::HostMetricsSource`], runs a set of [`Probe`]s
//! (CPU, memory, disk, identity) backed by `sysinfo`. A probe that cannot
//! read its metric leaves the corresponding fields unavailable instead of
//! failing the whole sample.

pub mod cpu;
pub mod disk;
pub mod host;
pub mod identity;
pub mod memory;

use sysmonx_common::Sample;

pub use host::HostMetricsSource;

/// Errors raised by metric sources and probes.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The source cannot produce any data at all (e.g. permission denied).
    #[error("Source: {source_name} unavailable: {reason}")]
    Unavailable { source_name: String, reason: String },

    /// One probe failed; its fields stay unavailable in the sample.
    #[error("Source: probe '{probe}' failed: {reason}")]
    Probe { probe: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, SourceError>;

/// Produces snapshots of current host metrics.
///
/// Implementations must return within a bounded time. Individual metric
/// failures are reported by leaving fields `None`; `Err` is reserved for
/// catastrophic unavailability, which the caller maps to an all-unavailable
/// sample.
pub trait MetricsSource: Send {
    /// Source name used in logs.
    fn name(&self) -> &str;

    fn sample(&mut self) -> Result<Sample>;
}

/// Reads one subsystem's metrics into a sample.
///
/// Probes are called in registration order on every tick. The trait requires
/// `Send` so the owning source can move across the sampler's worker threads.
pub trait Probe: Send {
    /// Probe name (e.g. `"cpu"`, `"disk"`), used for logging.
    fn name(&self) -> &'static str;

    /// Fill the fields this probe owns.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Probe`] when the subsystem cannot be read; the
    /// caller logs it and keeps the probe's fields unavailable.
    fn read(&mut self, sample: &mut Sample) -> Result<()>;
}

/// Keep a percentage only when it is a finite value in 0-100.
pub(crate) fn checked_percent(value: f64) -> Option<f64> {
    (value.is_finite() && (0.0..=100.0).contains(&value)).then_some(value)
}
