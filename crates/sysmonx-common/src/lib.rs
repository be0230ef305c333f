//! Shared types for the sysmonx sampling pipeline.
//!
//! [`types::Sample`] is the value that flows from a metrics source through
//! the in-memory history and the persistence buffer. [`config::CollectorConfig`]
//! is the single typed configuration handed to every component at
//! construction time.

pub mod config;
pub mod types;

pub use config::{CollectorConfig, ConfigError, MAX_EVENT_CAPACITY};
pub use types::{CollectorStatus, FileFormat, Sample, StoredFile};
