//! API-facing request/response models.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::core::{
    BlockedJob, EventSource, JobCommand, JobRecord, JobStatus, JobTable, LoopState,
    ProcessLauncher, ProcessTerminator, RunningJob, Scheduler, SchedulerError, Spawn,
};
use crate::infra::InMemoryJobTable;
use crate::util::ids::{JobId, Priority};

/// Job submission payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSubmission {
    /// Explicit id; generated when absent.
    #[serde(default)]
    pub id: Option<JobId>,
    /// Launch descriptor.
    pub command: JobCommand,
    /// Priority, higher first.
    #[serde(default)]
    pub priority: Priority,
    /// Earliest start (ms since epoch).
    #[serde(default)]
    pub scheduled_time_ms: Option<u128>,
    /// Jobs that must complete first.
    #[serde(default)]
    pub dependencies: BTreeSet<JobId>,
}

/// Scheduler status snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerStatus {
    /// Loop state.
    pub state: LoopState,
    /// Current concurrency bound.
    pub max_concurrent: usize,
    /// Jobs holding a running handle.
    pub running: Vec<RunningJob>,
    /// Pending jobs in the table.
    pub pending: usize,
    /// Completed jobs in the table.
    pub completed: usize,
    /// Failed jobs in the table.
    pub failed: usize,
    /// Pending jobs that cannot be selected, with the reason.
    pub blocked: Vec<BlockedJob>,
}

/// Insert a submitted job into `table` as `Pending`, created at `now_ms`.
pub fn submit_job(
    table: &InMemoryJobTable,
    req: JobSubmission,
    now_ms: u128,
) -> Result<JobId, SchedulerError> {
    let id = req.id.unwrap_or_else(JobId::generate);
    let mut job = JobRecord::with_id(id.clone(), req.command)
        .with_priority(req.priority)
        .created_at(now_ms);
    job.scheduled_time_ms = req.scheduled_time_ms;
    job.dependencies = req.dependencies;
    table.insert(job)?;
    tracing::info!(job_id = %id, "job submitted");
    Ok(id)
}

/// Build a status snapshot of `scheduler` as of `now_ms`.
pub fn status_report<T, L, K, E, S>(
    scheduler: &Scheduler<T, L, K, E, S>,
    now_ms: u128,
) -> SchedulerStatus
where
    T: JobTable,
    L: ProcessLauncher,
    K: ProcessTerminator,
    E: EventSource,
    S: Spawn + Clone + Send + Sync + 'static,
{
    let snapshot = scheduler.table().snapshot();
    let count = |status: JobStatus| snapshot.iter().filter(|j| j.status == status).count();
    SchedulerStatus {
        state: scheduler.state(),
        max_concurrent: scheduler.gate().max_concurrent(),
        running: scheduler.orchestrator().running_jobs(),
        pending: count(JobStatus::Pending),
        completed: count(JobStatus::Completed),
        failed: count(JobStatus::Failed),
        blocked: scheduler.blocked_jobs(now_ms),
    }
}
