//! Scheduling loop: the periodic driver tying table, gate and orchestrator
//! together.
//!
//! Each tick launches at most one job, even when the gate has room for more.
//! Remaining capacity is consumed on later ticks; callers wanting a faster
//! fill shorten the tick interval.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;

use crate::core::error::SchedulerError;
use crate::core::events::EventSource;
use crate::core::gate::ConcurrencyGate;
use crate::core::launcher::{ProcessLauncher, ProcessTerminator, Spawn};
use crate::core::orchestrator::ProcessOrchestrator;
use crate::core::selector::{explain_blocked, select_next, BlockedJob};
use crate::core::table::JobTable;
use crate::util::clock::now_ms;
use crate::util::ids::{HandleId, JobId};

/// Default interval between ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle state of the scheduling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    /// Not polling.
    Idle,
    /// Polling on the tick interval.
    Active,
}

/// Result of one scheduling decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Every concurrency slot is occupied.
    AtCapacity {
        /// Occupied slots.
        running: usize,
        /// Configured bound.
        max_concurrent: usize,
    },
    /// No job is eligible.
    NoCandidate,
    /// A job was launched.
    Launched {
        /// Launched job.
        job_id: JobId,
        /// Handle assigned by the launcher.
        handle: HandleId,
    },
    /// The launcher rejected the selected job; it is now `Failed`.
    LaunchFailed {
        /// Selected job.
        job_id: JobId,
        /// Launcher error.
        error: String,
    },
}

struct LoopControl {
    state: LoopState,
    generation: u64,
}

struct Inner<T, L, K, E, S> {
    gate: Arc<ConcurrencyGate>,
    orchestrator: ProcessOrchestrator<T, L, K, E, S>,
    spawner: S,
    tick_interval: Duration,
    control: Mutex<LoopControl>,
    wake: Notify,
    tick_lock: tokio::sync::Mutex<()>,
}

/// Cooperative single-flight scheduler.
///
/// Cloning yields another handle to the same scheduler.
pub struct Scheduler<T, L, K, E, S> {
    inner: Arc<Inner<T, L, K, E, S>>,
}

impl<T, L, K, E, S> Clone for Scheduler<T, L, K, E, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, L, K, E, S> Scheduler<T, L, K, E, S> {
    /// Create an idle scheduler.
    ///
    /// A zero `tick_interval` is raised to one millisecond.
    pub fn new(
        orchestrator: ProcessOrchestrator<T, L, K, E, S>,
        gate: Arc<ConcurrencyGate>,
        tick_interval: Duration,
        spawner: S,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                gate,
                orchestrator,
                spawner,
                tick_interval: tick_interval.max(Duration::from_millis(1)),
                control: Mutex::new(LoopControl {
                    state: LoopState::Idle,
                    generation: 0,
                }),
                wake: Notify::new(),
                tick_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Current loop state.
    pub fn state(&self) -> LoopState {
        self.inner.control.lock().state
    }

    /// Whether the loop is polling.
    pub fn is_active(&self) -> bool {
        self.state() == LoopState::Active
    }

    /// Interval between ticks.
    pub fn tick_interval(&self) -> Duration {
        self.inner.tick_interval
    }

    /// Concurrency gate consulted each tick.
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.inner.gate
    }

    /// Change the concurrency bound used by subsequent ticks.
    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.inner.gate.set_max_concurrent(max_concurrent);
    }

    /// Orchestrator owning the running-handle map.
    pub fn orchestrator(&self) -> &ProcessOrchestrator<T, L, K, E, S> {
        &self.inner.orchestrator
    }

    /// Job table the scheduler reads.
    pub fn table(&self) -> &Arc<T> {
        self.inner.orchestrator.table()
    }
}

impl<T, L, K, E, S> Scheduler<T, L, K, E, S>
where
    T: JobTable,
    L: ProcessLauncher,
    K: ProcessTerminator,
    E: EventSource,
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Start polling. Returns `false` if the loop was already active.
    ///
    /// The first tick fires immediately.
    pub fn start(&self) -> bool {
        let generation = {
            let mut control = self.inner.control.lock();
            if control.state == LoopState::Active {
                tracing::debug!("scheduler already active");
                return false;
            }
            control.state = LoopState::Active;
            control.generation += 1;
            control.generation
        };
        tracing::info!(
            interval_ms = self.inner.tick_interval.as_millis(),
            max_concurrent = self.inner.gate.max_concurrent(),
            "scheduler started"
        );
        let inner = Arc::clone(&self.inner);
        self.inner.spawner.spawn(Inner::run(inner, generation));
        true
    }

    /// Stop polling, terminate every running worker and requeue its job.
    ///
    /// Terminator failures do not abort the sequence; they are returned once
    /// every entry has been handled. Entries whose worker could not be
    /// terminated are still released and reset to `Pending`.
    pub async fn stop(&self) -> Vec<(JobId, SchedulerError)> {
        {
            let mut control = self.inner.control.lock();
            control.state = LoopState::Idle;
        }
        self.inner.wake.notify_waiters();

        let _tick = self.inner.tick_lock.lock().await;
        let orchestrator = &self.inner.orchestrator;
        let mut running: Vec<JobId> = orchestrator.running_ids().into_iter().collect();
        running.sort();

        let mut failures = Vec::new();
        for job_id in running {
            if let Err(err) = orchestrator.stop(&job_id).await {
                tracing::warn!(
                    job_id = %job_id,
                    error = %err,
                    "failed to stop job during shutdown"
                );
                failures.push((job_id, err));
            }
        }
        let released = orchestrator.release_all();
        tracing::info!(
            failures = failures.len(),
            released = released.len(),
            "scheduler stopped"
        );
        failures
    }

    /// Stop a single job and requeue it. No-op for untracked ids.
    pub async fn stop_job(&self, job_id: &JobId) -> Result<(), SchedulerError> {
        self.inner.orchestrator.stop(job_id).await
    }

    /// Run one scheduling decision now, whether or not the loop is active.
    pub async fn tick(&self) -> TickOutcome {
        self.tick_at(now_ms()).await
    }

    /// Run one scheduling decision as of `now_ms`.
    pub async fn tick_at(&self, now_ms: u128) -> TickOutcome {
        let _tick = self.inner.tick_lock.lock().await;
        self.inner.decide(now_ms).await
    }

    /// Pending jobs that cannot currently be selected, with the reason.
    pub fn blocked_jobs(&self, now_ms: u128) -> Vec<BlockedJob> {
        let snapshot = self.table().snapshot();
        explain_blocked(&snapshot, &self.inner.orchestrator.running_ids(), now_ms)
    }
}

impl<T, L, K, E, S> Inner<T, L, K, E, S>
where
    T: JobTable,
    L: ProcessLauncher,
    K: ProcessTerminator,
    E: EventSource,
    S: Spawn + Clone + Send + Sync + 'static,
{
    fn is_generation(&self, generation: u64) -> bool {
        let control = self.control.lock();
        control.state == LoopState::Active && control.generation == generation
    }

    async fn run(self: Arc<Self>, generation: u64) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {}
                () = self.wake.notified() => {}
            }
            let _tick = self.tick_lock.lock().await;
            if !self.is_generation(generation) {
                break;
            }
            let outcome = self.decide(now_ms()).await;
            tracing::trace!(?outcome, "tick");
        }
        tracing::debug!(generation, "scheduler loop exited");
    }

    async fn decide(&self, now_ms: u128) -> TickOutcome {
        let running = self.orchestrator.running_ids();
        if !self.gate.allows_launch(running.len()) {
            return TickOutcome::AtCapacity {
                running: running.len(),
                max_concurrent: self.gate.max_concurrent(),
            };
        }

        let snapshot = self.orchestrator.table().snapshot();
        let Some(job) = select_next(&snapshot, &running, now_ms) else {
            return TickOutcome::NoCandidate;
        };
        tracing::debug!(job_id = %job.id, priority = job.priority, "selected job");

        match self.orchestrator.start(job).await {
            Ok(handle) => TickOutcome::Launched {
                job_id: job.id.clone(),
                handle,
            },
            Err(SchedulerError::AlreadyRunning(job_id)) => {
                tracing::debug!(job_id = %job_id, "selected job already running");
                TickOutcome::NoCandidate
            }
            Err(err) => TickOutcome::LaunchFailed {
                job_id: job.id.clone(),
                error: err.to_string(),
            },
        }
    }
}
