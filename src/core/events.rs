//! Typed worker event contract.
//!
//! Every event carries the handle id of the worker that produced it, so
//! routing never depends on building channel names at runtime.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::mpsc;

use crate::util::ids::HandleId;

/// Payload of a worker event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum WorkerEventKind {
    /// Progress fields, merged verbatim into the job. May repeat.
    Progress(Map<String, Value>),
    /// The worker exited with this code.
    Complete(i32),
    /// The worker signalled an error.
    Error(String),
}

impl WorkerEventKind {
    /// Whether this event settles the job.
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }
}

/// An event emitted by one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerEvent {
    /// Handle of the emitting worker.
    pub handle: HandleId,
    /// Event payload.
    pub kind: WorkerEventKind,
}

impl WorkerEvent {
    /// Progress event.
    pub fn progress(handle: HandleId, fields: Map<String, Value>) -> Self {
        Self {
            handle,
            kind: WorkerEventKind::Progress(fields),
        }
    }

    /// Completion event with an exit code.
    pub const fn complete(handle: HandleId, code: i32) -> Self {
        Self {
            handle,
            kind: WorkerEventKind::Complete(code),
        }
    }

    /// Error event.
    pub fn error(handle: HandleId, message: impl Into<String>) -> Self {
        Self {
            handle,
            kind: WorkerEventKind::Error(message.into()),
        }
    }
}

/// Source of per-handle event streams.
pub trait EventSource: Send + Sync + 'static {
    /// Subscribe to every event emitted for `handle`.
    fn subscribe(&self, handle: &HandleId) -> Subscription;
}

type Release = Box<dyn FnOnce() + Send + Sync>;

/// Scoped subscription to one worker's events.
///
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    handle: HandleId,
    events: mpsc::UnboundedReceiver<WorkerEventKind>,
    release: Option<Release>,
}

impl Subscription {
    /// Build a subscription from a receiver and a release hook run on drop.
    pub fn new(
        handle: HandleId,
        events: mpsc::UnboundedReceiver<WorkerEventKind>,
        release: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            handle,
            events,
            release: Some(Box::new(release)),
        }
    }

    /// Handle this subscription listens to.
    pub const fn handle(&self) -> &HandleId {
        &self.handle
    }

    /// Next event, or `None` once the source closed the stream.
    pub async fn recv(&mut self) -> Option<WorkerEventKind> {
        self.events.recv().await
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
