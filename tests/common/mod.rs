//! Shared fakes for scheduler integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use prometheus_job_scheduler::core::{
    ConcurrencyGate, EventSource, InMemoryTransitionLog, JobCommand, JobRecord, JobStatus,
    JobTable, ProcessLauncher, ProcessOrchestrator, ProcessTerminator, Scheduler, SchedulerError,
    Subscription,
};
use prometheus_job_scheduler::infra::{EventBus, InMemoryJobTable};
use prometheus_job_scheduler::runtime::TokioSpawner;
use prometheus_job_scheduler::util::{HandleId, JobId};
use tokio::sync::Notify;

// ============================================================================
// LAUNCHER / TERMINATOR FAKES
// ============================================================================

#[derive(Default)]
struct LauncherState {
    launched: Vec<JobCommand>,
    failing_programs: HashSet<String>,
    statuses_at_launch: Vec<Vec<(JobId, JobStatus)>>,
    next_handle: u64,
}

/// Launcher handing out `h1`, `h2`, ... and recording every command.
pub struct FakeLauncher {
    table: Arc<InMemoryJobTable>,
    state: Mutex<LauncherState>,
}

impl FakeLauncher {
    pub fn new(table: Arc<InMemoryJobTable>) -> Self {
        Self {
            table,
            state: Mutex::new(LauncherState::default()),
        }
    }

    /// Reject every launch of `program`.
    pub fn fail_program(&self, program: &str) {
        self.state.lock().failing_programs.insert(program.to_string());
    }

    pub fn launched(&self) -> Vec<JobCommand> {
        self.state.lock().launched.clone()
    }

    pub fn launch_count(&self) -> usize {
        self.state.lock().launched.len()
    }

    /// Table statuses observed while each launch was in progress.
    pub fn statuses_at_launch(&self) -> Vec<Vec<(JobId, JobStatus)>> {
        self.state.lock().statuses_at_launch.clone()
    }
}

#[async_trait]
impl ProcessLauncher for FakeLauncher {
    async fn launch(&self, command: &JobCommand) -> Result<HandleId, SchedulerError> {
        let observed = self
            .table
            .snapshot()
            .into_iter()
            .map(|j| (j.id, j.status))
            .collect();
        let mut state = self.state.lock();
        state.statuses_at_launch.push(observed);
        state.launched.push(command.clone());
        if state.failing_programs.contains(&command.program) {
            return Err(SchedulerError::Launch(format!("{}: not found", command.program)));
        }
        state.next_handle += 1;
        Ok(HandleId::new(format!("h{}", state.next_handle)))
    }
}

/// Terminator recording handles; can be switched to reject calls or to
/// block until released.
#[derive(Default)]
pub struct FakeTerminator {
    terminated: Mutex<Vec<HandleId>>,
    failing: Mutex<HashSet<HandleId>>,
    held: AtomicBool,
    release: Notify,
}

impl FakeTerminator {
    pub fn fail_for(&self, handle: &HandleId) {
        self.failing.lock().insert(handle.clone());
    }

    /// Make the next `terminate` call wait for [`FakeTerminator::release`].
    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.release.notify_one();
    }

    pub fn terminated(&self) -> Vec<HandleId> {
        self.terminated.lock().clone()
    }
}

#[async_trait]
impl ProcessTerminator for FakeTerminator {
    async fn terminate(&self, handle: &HandleId) -> Result<(), SchedulerError> {
        self.terminated.lock().push(handle.clone());
        if self.held.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        let failing = self.failing.lock().contains(handle);
        if failing {
            return Err(SchedulerError::Terminate(format!("{handle}: permission denied")));
        }
        Ok(())
    }
}

/// Event source delegating to an [`EventBus`] and recording subscriptions.
#[derive(Default)]
pub struct RecordingEvents {
    pub bus: EventBus,
    subscribed: Mutex<Vec<HandleId>>,
}

impl RecordingEvents {
    pub fn subscribed(&self) -> Vec<HandleId> {
        self.subscribed.lock().clone()
    }
}

impl EventSource for RecordingEvents {
    fn subscribe(&self, handle: &HandleId) -> Subscription {
        self.subscribed.lock().push(handle.clone());
        self.bus.subscribe(handle)
    }
}

// ============================================================================
// HARNESS
// ============================================================================

pub type TestOrchestrator = ProcessOrchestrator<
    InMemoryJobTable,
    FakeLauncher,
    FakeTerminator,
    RecordingEvents,
    TokioSpawner,
>;
pub type TestScheduler =
    Scheduler<InMemoryJobTable, FakeLauncher, FakeTerminator, RecordingEvents, TokioSpawner>;

pub struct Harness {
    pub table: Arc<InMemoryJobTable>,
    pub launcher: Arc<FakeLauncher>,
    pub terminator: Arc<FakeTerminator>,
    pub events: Arc<RecordingEvents>,
    pub transitions: Arc<InMemoryTransitionLog>,
}

impl Harness {
    pub fn new() -> Self {
        let table = Arc::new(InMemoryJobTable::new());
        Self {
            launcher: Arc::new(FakeLauncher::new(Arc::clone(&table))),
            table,
            terminator: Arc::new(FakeTerminator::default()),
            events: Arc::new(RecordingEvents::default()),
            transitions: Arc::new(InMemoryTransitionLog::new(256)),
        }
    }

    /// Must be called inside a tokio runtime.
    pub fn orchestrator(&self) -> TestOrchestrator {
        ProcessOrchestrator::new(
            Arc::clone(&self.table),
            Arc::clone(&self.launcher),
            Arc::clone(&self.terminator),
            Arc::clone(&self.events),
            TokioSpawner::current(),
        )
        .with_transitions(self.transitions.clone())
    }

    /// Must be called inside a tokio runtime.
    pub fn scheduler(&self, max_concurrent: usize, tick_interval: Duration) -> TestScheduler {
        Scheduler::new(
            self.orchestrator(),
            Arc::new(ConcurrencyGate::new(max_concurrent)),
            tick_interval,
            TokioSpawner::current(),
        )
    }

    pub fn insert(&self, job: JobRecord) {
        self.table.insert(job).expect("insert job");
    }

    pub fn status(&self, id: &str) -> JobStatus {
        self.table
            .get(&JobId::from(id))
            .map(|j| j.status)
            .expect("job exists")
    }

    pub fn record(&self, id: &str) -> JobRecord {
        self.table.get(&JobId::from(id)).expect("job exists")
    }

    pub fn publish(&self, event: prometheus_job_scheduler::core::WorkerEvent) -> bool {
        self.events.bus.publish(event)
    }
}

/// Job whose command program is its own id, created at `created_at_ms`.
pub fn job(id: &str, priority: i32, created_at_ms: u128) -> JobRecord {
    JobRecord::with_id(id, JobCommand::new(id, Vec::<String>::new()))
        .with_priority(priority)
        .created_at(created_at_ms)
}

/// Poll `check` until it holds or about two seconds pass.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
