//! Concurrency bound applied before every launch.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of simultaneously running jobs.
pub const DEFAULT_MAX_CONCURRENT: usize = 1;

/// Holds the mutable `max_concurrent` bound.
///
/// The bound only constrains future launches: lowering it below the current
/// running count never preempts a worker.
#[derive(Debug)]
pub struct ConcurrencyGate {
    max_concurrent: AtomicUsize,
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONCURRENT)
    }
}

impl ConcurrencyGate {
    /// Create a gate with the given bound.
    pub const fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent: AtomicUsize::new(max_concurrent),
        }
    }

    /// Current bound.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent.load(Ordering::Acquire)
    }

    /// Replace the bound. Takes effect on the next tick.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        let previous = self.max_concurrent.swap(max_concurrent, Ordering::AcqRel);
        tracing::info!(previous, max_concurrent, "concurrency bound changed");
    }

    /// Whether a new job may start while `running` jobs occupy slots.
    pub fn allows_launch(&self, running: usize) -> bool {
        running < self.max_concurrent()
    }

    /// Free slots while `running` jobs occupy slots.
    pub fn available(&self, running: usize) -> usize {
        self.max_concurrent().saturating_sub(running)
    }
}
