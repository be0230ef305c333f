//! Collector runtime for the sysmonx agent.
//!
//! [`runtime::Collector`] owns the sampling loop: on every tick it reads a
//! [`sysmonx_collector::MetricsSource`], stamps the sample with a
//! [`clock::MonotonicClock`], pushes it into the shared
//! [`sysmonx_storage::RingHistory`] and appends it to the
//! [`sysmonx_storage::PersistenceBuffer`]. Samples, flushes and recoverable
//! failures are published as [`events::CollectorEvent`]s.

pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod runtime;

pub use config::AgentConfig;
pub use error::{CollectorError, Result};
pub use events::{CollectorEvent, ErrorKind, EventSubscriber};
pub use runtime::{Collector, StopOutcome};
