//! Status transition sinks.
//!
//! The orchestrator reports every status change it makes. Sinks are
//! downstream consumers (history views, notifications); nothing recorded here
//! feeds back into scheduling.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::core::job::JobStatus;
use crate::util::clock::now_ms;
use crate::util::ids::JobId;

/// One status change of one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTransition {
    /// Job that changed.
    pub job_id: JobId,
    /// Status it moved to.
    pub status: JobStatus,
    /// Additional context (handle id, failure cause).
    pub detail: Option<String>,
    /// Timestamp milliseconds.
    pub created_at_ms: u128,
}

/// Receiver of job transitions.
pub trait TransitionSink: Send + Sync {
    /// Record a transition.
    fn record(&self, transition: JobTransition);
}

/// Bounded in-memory transition log for testing and dev.
pub struct InMemoryTransitionLog {
    transitions: Mutex<VecDeque<JobTransition>>,
    max_transitions: usize,
}

impl InMemoryTransitionLog {
    /// Create a log keeping at most `max_transitions` entries.
    pub fn new(max_transitions: usize) -> Self {
        Self {
            transitions: Mutex::new(VecDeque::with_capacity(max_transitions.min(1024))),
            max_transitions,
        }
    }

    /// Snapshot of stored transitions, oldest first.
    pub fn transitions(&self) -> Vec<JobTransition> {
        self.transitions.lock().iter().cloned().collect()
    }

    /// Statuses recorded for one job, oldest first.
    pub fn statuses_for(&self, job_id: &JobId) -> Vec<JobStatus> {
        self.transitions
            .lock()
            .iter()
            .filter(|t| &t.job_id == job_id)
            .map(|t| t.status)
            .collect()
    }
}

impl TransitionSink for InMemoryTransitionLog {
    fn record(&self, transition: JobTransition) {
        if self.max_transitions == 0 {
            return;
        }
        let mut transitions = self.transitions.lock();
        if transitions.len() >= self.max_transitions {
            transitions.pop_front();
        }
        transitions.push_back(transition);
    }
}

/// Sink that emits each transition as a `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTransitionSink;

impl TransitionSink for TracingTransitionSink {
    fn record(&self, transition: JobTransition) {
        tracing::info!(
            job_id = %transition.job_id,
            status = %transition.status,
            detail = transition.detail.as_deref().unwrap_or(""),
            "job transition"
        );
    }
}

/// Helper to build a transition stamped with the current time.
pub fn build_transition(
    job_id: &JobId,
    status: JobStatus,
    detail: Option<String>,
) -> JobTransition {
    JobTransition {
        job_id: job_id.clone(),
        status,
        detail,
        created_at_ms: now_ms(),
    }
}
