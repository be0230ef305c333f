//! In-memory history and durable, rotating persistence for samples.
//!
//! [`history::RingHistory`] keeps the most recent samples for live charts.
//! [`buffer::PersistenceBuffer`] batches samples and flushes each batch to a
//! CSV file and a JSON file in the logs directory, after which
//! [`retention::RetentionPolicy`] deletes the oldest files beyond the
//! per-format cap.

pub mod buffer;
pub mod error;
pub mod history;
pub mod retention;
pub mod writer;


pub use buffer::{FlushReport, FlushTrigger, PersistenceBuffer};
pub use error::{FormatFailure, Result, StorageError};
pub use history::RingHistory;
pub use retention::RetentionPolicy;
