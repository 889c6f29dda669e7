//! Progress events and observers for long-running remote work.
//!
//! Retry, fetch and scheduler code report through a `ProgressObserver`.
//! Observers are optional: `NoopObserver` drops everything, closures can be
//! passed directly, and `BroadcastObserver` fans events out over a
//! `tokio::sync::broadcast` channel to any number of subscribers. When no
//! subscriber exists, broadcast events are silently dropped.

use serde::{Deserialize, Serialize};

/// A progress event emitted by the resilience layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ProgressEvent {
    /// A failed operation will be retried after `delay_ms`.
    RetryScheduled {
        label: String,
        attempt: u32,
        max_attempts: u32,
        status: Option<u16>,
        delay_ms: u64,
    },
    /// A fetch attempt is starting on the given path.
    FetchStarted { path: String, url: String },
    /// A fetch attempt failed; the next path (if any) will be tried.
    FetchFailed {
        path: String,
        url: String,
        reason: String,
    },
    /// A fetch attempt produced the response handed back to the caller.
    FetchSucceeded {
        path: String,
        url: String,
        status: u16,
    },
    /// The scheduler finished one work item.
    ItemCompleted { completed: usize, total: usize },
    /// The stop predicate fired and the queue was drained.
    SchedulerStopped { completed: usize, drained: usize },
}

/// Receives progress events.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Observer that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {
    fn on_event(&self, _event: &ProgressEvent) {}
}

impl<F> ProgressObserver for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Sender handle for broadcasting progress events.
pub type ProgressSender = tokio::sync::broadcast::Sender<ProgressEvent>;

/// Receiver handle for consuming progress events.
pub type ProgressReceiver = tokio::sync::broadcast::Receiver<ProgressEvent>;

/// Create a new progress broadcast channel with a bounded buffer.
pub fn channel() -> (ProgressSender, ProgressReceiver) {
    tokio::sync::broadcast::channel(256)
}

/// Observer that forwards every event to a broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastObserver {
    tx: ProgressSender,
}

impl BroadcastObserver {
    pub fn new(tx: ProgressSender) -> Self {
        Self { tx }
    }

    pub fn subscribe(&self) -> ProgressReceiver {
        self.tx.subscribe()
    }
}

impl ProgressObserver for BroadcastObserver {
    fn on_event(&self, event: &ProgressEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event.clone());
    }
}
