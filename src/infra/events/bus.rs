//! In-process worker event bus.
//!
//! Each handle has at most one slot. A slot opened by the launcher buffers
//! events until the orchestrator subscribes; once the subscription is
//! dropped the slot is gone and later events for that handle are discarded.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::core::events::{EventSource, Subscription, WorkerEvent, WorkerEventKind};
use crate::util::ids::HandleId;

enum Slot {
    Buffered(Vec<WorkerEventKind>),
    Live(mpsc::UnboundedSender<WorkerEventKind>),
}

/// Routes [`WorkerEvent`]s to the subscription for their handle.
#[derive(Clone, Default)]
pub struct EventBus {
    slots: Arc<Mutex<HashMap<HandleId, Slot>>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("slots", &self.slots.lock().len())
            .finish()
    }
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a buffering slot for `handle` ahead of its subscription.
    pub fn open(&self, handle: &HandleId) {
        self.slots
            .lock()
            .entry(handle.clone())
            .or_insert_with(|| Slot::Buffered(Vec::new()));
    }

    /// Deliver an event. Returns `false` if no slot exists for its handle.
    pub fn publish(&self, event: WorkerEvent) -> bool {
        let mut slots = self.slots.lock();
        match slots.get_mut(&event.handle) {
            Some(Slot::Buffered(pending)) => {
                pending.push(event.kind);
                true
            }
            Some(Slot::Live(tx)) => {
                if tx.send(event.kind).is_err() {
                    slots.remove(&event.handle);
                    return false;
                }
                true
            }
            None => {
                tracing::debug!(handle = %event.handle, "event dropped: no subscriber");
                false
            }
        }
    }

    /// Whether `handle` has an open slot.
    pub fn is_open(&self, handle: &HandleId) -> bool {
        self.slots.lock().contains_key(handle)
    }

    /// Number of open slots.
    pub fn open_count(&self) -> usize {
        self.slots.lock().len()
    }
}

impl EventSource for EventBus {
    fn subscribe(&self, handle: &HandleId) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut slots = self.slots.lock();
            if let Some(Slot::Buffered(pending)) = slots.remove(handle) {
                for kind in pending {
                    let _ = tx.send(kind);
                }
            }
            slots.insert(handle.clone(), Slot::Live(tx));
        }

        let slots = Arc::clone(&self.slots);
        let key = handle.clone();
        Subscription::new(handle.clone(), rx, move || {
            slots.lock().remove(&key);
        })
    }
}
