//! Process orchestrator: launches workers, owns the running-handle map and
//! applies worker events to the job table.
//!
//! The running-handle map is the only record of which jobs occupy a
//! concurrency slot. An entry is created after a successful launch and
//! removed by whichever comes first: a terminal worker event, a successful
//! [`stop`](ProcessOrchestrator::stop), or [`release_all`](ProcessOrchestrator::release_all).
//! Removing an entry drops its detach sender, which ends the watcher task and
//! with it the event subscription.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::core::error::SchedulerError;
use crate::core::events::{EventSource, Subscription, WorkerEventKind};
use crate::core::job::{JobFailure, JobPatch, JobRecord, JobStatus};
use crate::core::launcher::{ProcessLauncher, ProcessTerminator, Spawn};
use crate::core::table::JobTable;
use crate::core::transitions::{build_transition, TransitionSink};
use crate::util::clock::now_ms;
use crate::util::ids::{HandleId, JobId};

struct RunningHandle {
    handle: HandleId,
    started_at_ms: u128,
    /// Set while a terminator call is in flight.
    stopping: bool,
    /// Terminal outcome that arrived during a stop; applied if the stop fails.
    deferred: Option<Outcome>,
    _detach: oneshot::Sender<()>,
}

/// Terminal result of a worker, ready to be written to the table.
struct Outcome {
    patch: JobPatch,
    status: JobStatus,
    detail: Option<String>,
}

type RunningMap = Arc<Mutex<HashMap<JobId, RunningHandle>>>;
type Transitions = Option<Arc<dyn TransitionSink>>;

/// Public view of one running-handle entry.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RunningJob {
    /// Job occupying the slot.
    pub job_id: JobId,
    /// Launcher-assigned handle.
    pub handle: HandleId,
    /// Launch acknowledgement time (ms since epoch).
    pub started_at_ms: u128,
}

/// Launches jobs and tracks their workers until they settle.
pub struct ProcessOrchestrator<T, L, K, E, S> {
    table: Arc<T>,
    launcher: Arc<L>,
    terminator: Arc<K>,
    events: Arc<E>,
    spawner: S,
    running: RunningMap,
    transitions: Transitions,
}

impl<T, L, K, E, S: Clone> Clone for ProcessOrchestrator<T, L, K, E, S> {
    fn clone(&self) -> Self {
        Self {
            table: Arc::clone(&self.table),
            launcher: Arc::clone(&self.launcher),
            terminator: Arc::clone(&self.terminator),
            events: Arc::clone(&self.events),
            spawner: self.spawner.clone(),
            running: Arc::clone(&self.running),
            transitions: self.transitions.clone(),
        }
    }
}

impl<T, L, K, E, S> ProcessOrchestrator<T, L, K, E, S> {
    /// Create an orchestrator from its collaborators.
    pub fn new(
        table: Arc<T>,
        launcher: Arc<L>,
        terminator: Arc<K>,
        events: Arc<E>,
        spawner: S,
    ) -> Self {
        Self {
            table,
            launcher,
            terminator,
            events,
            spawner,
            running: Arc::new(Mutex::new(HashMap::new())),
            transitions: None,
        }
    }

    /// Attach a transition sink.
    #[must_use]
    pub fn with_transitions(mut self, sink: Arc<dyn TransitionSink>) -> Self {
        self.transitions = Some(sink);
        self
    }

    /// Job table this orchestrator writes to.
    pub const fn table(&self) -> &Arc<T> {
        &self.table
    }

    /// Number of occupied concurrency slots.
    pub fn running_count(&self) -> usize {
        self.running.lock().len()
    }

    /// Ids of every job holding a running handle.
    pub fn running_ids(&self) -> HashSet<JobId> {
        self.running.lock().keys().cloned().collect()
    }

    /// Whether `job_id` currently holds a running handle.
    pub fn is_running(&self, job_id: &JobId) -> bool {
        self.running.lock().contains_key(job_id)
    }

    /// Handle assigned to `job_id`, if it is running.
    pub fn handle_for(&self, job_id: &JobId) -> Option<HandleId> {
        self.running.lock().get(job_id).map(|entry| entry.handle.clone())
    }

    /// Every running-handle entry, ordered by job id.
    pub fn running_jobs(&self) -> Vec<RunningJob> {
        let mut jobs: Vec<RunningJob> = self
            .running
            .lock()
            .iter()
            .map(|(job_id, entry)| RunningJob {
                job_id: job_id.clone(),
                handle: entry.handle.clone(),
                started_at_ms: entry.started_at_ms,
            })
            .collect();
        jobs.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        jobs
    }

    fn record(&self, job_id: &JobId, status: JobStatus, detail: Option<String>) {
        if let Some(sink) = &self.transitions {
            sink.record(build_transition(job_id, status, detail));
        }
    }
}

impl<T, L, K, E, S> ProcessOrchestrator<T, L, K, E, S>
where
    T: JobTable,
    L: ProcessLauncher,
    K: ProcessTerminator,
    E: EventSource,
    S: Spawn + Clone + Send + Sync + 'static,
{
    /// Launch `job`.
    ///
    /// The job is marked `Running` before the launcher is called. A rejected
    /// launch marks it `Failed` and creates no running handle.
    pub async fn start(&self, job: &JobRecord) -> Result<HandleId, SchedulerError> {
        let job_id = job.id.clone();
        if self.is_running(&job_id) {
            return Err(SchedulerError::AlreadyRunning(job_id));
        }

        self.table
            .update(&job_id, JobPatch::status(JobStatus::Running).started_at(now_ms()));
        self.record(&job_id, JobStatus::Running, None);

        let handle = match self.launcher.launch(&job.command).await {
            Ok(handle) => handle,
            Err(err) => {
                tracing::warn!(job_id = %job_id, error = %err, "job launch rejected");
                let failure = JobFailure::Launch {
                    message: err.to_string(),
                };
                let detail = failure.to_string();
                self.table
                    .update(&job_id, JobPatch::failed(failure).finished_at(now_ms()));
                self.record(&job_id, JobStatus::Failed, Some(detail));
                return Err(err);
            }
        };

        let subscription = self.events.subscribe(&handle);
        let (detach_tx, detach_rx) = oneshot::channel();
        {
            let mut running = self.running.lock();
            running.insert(
                job_id.clone(),
                RunningHandle {
                    handle: handle.clone(),
                    started_at_ms: now_ms(),
                    stopping: false,
                    deferred: None,
                    _detach: detach_tx,
                },
            );
        }
        tracing::info!(job_id = %job_id, handle = %handle, "job launched");

        let watcher = Watcher {
            table: Arc::clone(&self.table),
            running: Arc::clone(&self.running),
            transitions: self.transitions.clone(),
            job_id,
            handle: handle.clone(),
        };
        self.spawner.spawn(watcher.run(subscription, detach_rx));
        Ok(handle)
    }

    /// Terminate the worker running `job_id` and requeue the job as `Pending`.
    ///
    /// Untracked ids are a no-op and never reach the terminator. A terminal
    /// event arriving while the terminator runs is held back: a successful
    /// stop discards it and requeues the job, a failed stop applies it. If
    /// the terminator fails and no terminal event arrived, the entry stays in
    /// place and the error is returned.
    pub async fn stop(&self, job_id: &JobId) -> Result<(), SchedulerError> {
        let handle = {
            let mut running = self.running.lock();
            match running.get_mut(job_id) {
                Some(entry) if !entry.stopping => {
                    entry.stopping = true;
                    entry.handle.clone()
                }
                Some(_) => {
                    tracing::debug!(job_id = %job_id, "stop already in progress");
                    return Ok(());
                }
                None => {
                    tracing::debug!(job_id = %job_id, "stop ignored: job not running");
                    return Ok(());
                }
            }
        };

        if let Err(err) = self.terminator.terminate(&handle).await {
            tracing::warn!(job_id = %job_id, handle = %handle, error = %err, "terminate failed");
            let deferred = {
                let mut running = self.running.lock();
                match running.get_mut(job_id) {
                    Some(entry) if entry.handle == handle => {
                        entry.stopping = false;
                        if entry.deferred.is_some() {
                            running.remove(job_id).and_then(|entry| entry.deferred)
                        } else {
                            None
                        }
                    }
                    _ => None,
                }
            };
            if let Some(outcome) = deferred {
                apply_outcome(
                    self.table.as_ref(),
                    self.transitions.as_ref(),
                    job_id,
                    &handle,
                    outcome,
                );
            }
            return Err(err);
        }

        let removed = {
            let mut running = self.running.lock();
            match running.get(job_id) {
                Some(entry) if entry.handle == handle => running.remove(job_id),
                _ => None,
            }
        };
        drop(removed);

        self.table.update(job_id, JobPatch::status(JobStatus::Pending));
        self.record(job_id, JobStatus::Pending, Some(format!("stopped handle {handle}")));
        tracing::info!(job_id = %job_id, handle = %handle, "job stopped and requeued");
        Ok(())
    }

    /// Drop every remaining running-handle entry without calling the
    /// terminator, resetting those jobs to `Pending`. Returns their ids.
    pub fn release_all(&self) -> Vec<JobId> {
        let drained: Vec<(JobId, RunningHandle)> = self.running.lock().drain().collect();
        let mut released = Vec::with_capacity(drained.len());
        for (job_id, entry) in drained {
            tracing::warn!(job_id = %job_id, handle = %entry.handle, "releasing running handle");
            self.table.update(&job_id, JobPatch::status(JobStatus::Pending));
            self.record(
                &job_id,
                JobStatus::Pending,
                Some(format!("released handle {}", entry.handle)),
            );
            released.push(job_id);
        }
        released
    }
}

/// Applies one worker's events until the job settles or the entry is removed.
struct Watcher<T> {
    table: Arc<T>,
    running: RunningMap,
    transitions: Transitions,
    job_id: JobId,
    handle: HandleId,
}

impl<T: JobTable> Watcher<T> {
    async fn run(self, mut subscription: Subscription, mut detach: oneshot::Receiver<()>) {
        loop {
            let event = tokio::select! {
                biased;
                _ = &mut detach => {
                    tracing::debug!(
                        job_id = %self.job_id,
                        handle = %self.handle,
                        "watcher detached"
                    );
                    return;
                }
                event = subscription.recv() => event,
            };

            let Some(kind) = event else {
                tracing::warn!(
                    job_id = %self.job_id,
                    handle = %self.handle,
                    "event stream closed before the job settled"
                );
                return;
            };

            match kind {
                WorkerEventKind::Progress(fields) => {
                    if self.is_current() {
                        self.table.update(&self.job_id, JobPatch::progress(fields));
                    }
                }
                WorkerEventKind::Complete(0) => {
                    let patch = JobPatch::status(JobStatus::Completed)
                        .with_exit_code(0)
                        .finished_at(now_ms());
                    if self.settle(Outcome::new(patch, JobStatus::Completed, None)) {
                        return;
                    }
                }
                WorkerEventKind::Complete(code) => {
                    if self.settle(Outcome::failed(JobFailure::Exit { code })) {
                        return;
                    }
                }
                WorkerEventKind::Error(message) => {
                    if self.settle(Outcome::failed(JobFailure::Runtime { message })) {
                        return;
                    }
                }
            }
        }
    }

    fn is_current(&self) -> bool {
        self.running
            .lock()
            .get(&self.job_id)
            .is_some_and(|entry| entry.handle == self.handle && !entry.stopping)
    }

    /// Remove the entry and write the outcome. Returns `false` when the entry
    /// no longer belongs to this watcher, or when a stop is in flight and the
    /// outcome was parked on the entry instead.
    fn settle(&self, outcome: Outcome) -> bool {
        let removed = {
            let mut running = self.running.lock();
            match running.get_mut(&self.job_id) {
                Some(entry) if entry.handle == self.handle => {
                    if entry.stopping {
                        tracing::debug!(
                            job_id = %self.job_id,
                            handle = %self.handle,
                            "terminal event deferred: stop in flight"
                        );
                        entry.deferred.get_or_insert(outcome);
                        return false;
                    }
                    running.remove(&self.job_id)
                }
                _ => {
                    tracing::debug!(
                        job_id = %self.job_id,
                        handle = %self.handle,
                        "terminal event ignored: handle no longer current"
                    );
                    return false;
                }
            }
        };
        drop(removed);

        apply_outcome(
            self.table.as_ref(),
            self.transitions.as_ref(),
            &self.job_id,
            &self.handle,
            outcome,
        );
        true
    }
}

impl Outcome {
    const fn new(patch: JobPatch, status: JobStatus, detail: Option<String>) -> Self {
        Self {
            patch,
            status,
            detail,
        }
    }

    fn failed(failure: JobFailure) -> Self {
        let detail = failure.to_string();
        let patch = JobPatch::failed(failure).finished_at(now_ms());
        Self::new(patch, JobStatus::Failed, Some(detail))
    }
}

fn apply_outcome<T: JobTable>(
    table: &T,
    transitions: Option<&Arc<dyn TransitionSink>>,
    job_id: &JobId,
    handle: &HandleId,
    outcome: Outcome,
) {
    table.update(job_id, outcome.patch);
    if let Some(sink) = transitions {
        sink.record(build_transition(job_id, outcome.status, outcome.detail));
    }
    tracing::info!(job_id = %job_id, handle = %handle, status = %outcome.status, "job settled");
}
