//! Collector events published over a broadcast channel.
//!
//! Every tick publishes [`CollectorEvent::Sampled`]; flushes and recoverable
//! failures follow as they happen. Publishing never blocks the sampling loop:
//! with no subscribers the event is dropped, and a subscriber that falls
//! behind skips the events it missed.

use serde::Serialize;
use sysmonx_common::Sample;
use sysmonx_storage::FlushReport;
use tokio::sync::broadcast;

/// Category of a recoverable failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// The metrics source failed outright; the tick recorded an
    /// all-unavailable sample.
    SourceUnavailable,
    /// The metrics source did not return within the sample timeout.
    SourceTimeout,
    /// At least one format could not be written during a flush.
    FlushFailure,
    /// Expired files could not be deleted; retried on the next flush.
    RetentionFailure,
}

#[derive(Debug, Clone, Serialize)]
pub enum CollectorEvent {
    Sampled(Sample),
    Flushed(FlushReport),
    Error { kind: ErrorKind, message: String },
}

impl CollectorEvent {
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CollectorEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: CollectorEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> EventSubscriber {
        EventSubscriber {
            receiver: self.sender.subscribe(),
        }
    }
}

pub struct EventSubscriber {
    receiver: broadcast::Receiver<CollectorEvent>,
}

impl EventSubscriber {
    /// Next event, or `None` once the collector is dropped.
    pub async fn recv(&mut self) -> Option<CollectorEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "Event subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<CollectorEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::debug!(skipped = n, "Event subscriber lagged");
                }
                Err(_) => return None,
            }
        }
    }
}
