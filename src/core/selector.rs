//! Eligibility selector: picks the next job to launch from a snapshot.
//!
//! Everything here is a pure function of `(snapshot, running ids, now)`.
//! Nothing touches the job table or the orchestrator.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::job::{JobRecord, JobStatus};
use crate::util::ids::JobId;

/// Why a job cannot be selected right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum BlockedReason {
    /// The job is not `Pending`.
    NotPending {
        /// Current status.
        status: JobStatus,
    },
    /// The job already occupies a running slot.
    AlreadyRunning,
    /// The job's scheduled time has not arrived.
    ScheduledLater {
        /// Scheduled time (ms since epoch).
        at_ms: u128,
    },
    /// A dependency id does not resolve to any record.
    DependencyMissing {
        /// The unresolved id.
        dependency: JobId,
    },
    /// A dependency exists but has not completed.
    DependencyIncomplete {
        /// The dependency id.
        dependency: JobId,
        /// Its current status.
        status: JobStatus,
    },
}

impl fmt::Display for BlockedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotPending { status } => write!(f, "status is {status}"),
            Self::AlreadyRunning => write!(f, "already running"),
            Self::ScheduledLater { at_ms } => write!(f, "scheduled for {at_ms}"),
            Self::DependencyMissing { dependency } => {
                write!(f, "dependency {dependency} does not exist")
            }
            Self::DependencyIncomplete { dependency, status } => {
                write!(f, "dependency {dependency} is {status}")
            }
        }
    }
}

/// A pending job that is currently ineligible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedJob {
    /// Job identifier.
    pub job_id: JobId,
    /// First reason found.
    pub reason: BlockedReason,
}

fn index(snapshot: &[JobRecord]) -> HashMap<&JobId, &JobRecord> {
    let mut by_id = HashMap::with_capacity(snapshot.len());
    for job in snapshot {
        by_id.entry(&job.id).or_insert(job);
    }
    by_id
}

fn check(
    job: &JobRecord,
    by_id: &HashMap<&JobId, &JobRecord>,
    running: &HashSet<JobId>,
    now_ms: u128,
) -> Option<BlockedReason> {
    if job.status != JobStatus::Pending {
        return Some(BlockedReason::NotPending { status: job.status });
    }
    if running.contains(&job.id) {
        return Some(BlockedReason::AlreadyRunning);
    }
    if let Some(at_ms) = job.scheduled_time_ms {
        if now_ms < at_ms {
            return Some(BlockedReason::ScheduledLater { at_ms });
        }
    }
    for dependency in &job.dependencies {
        match by_id.get(dependency) {
            None => {
                return Some(BlockedReason::DependencyMissing {
                    dependency: dependency.clone(),
                })
            }
            Some(dep) if dep.status != JobStatus::Completed => {
                return Some(BlockedReason::DependencyIncomplete {
                    dependency: dependency.clone(),
                    status: dep.status,
                })
            }
            Some(_) => {}
        }
    }
    None
}

/// Whether `job` is eligible to launch: pending, not running, due, and with
/// every dependency completed.
pub fn is_eligible(
    job: &JobRecord,
    snapshot: &[JobRecord],
    running: &HashSet<JobId>,
    now_ms: u128,
) -> bool {
    check(job, &index(snapshot), running, now_ms).is_none()
}

/// Reason `job` is ineligible, or `None` when it could be selected.
pub fn blocked_reason(
    job: &JobRecord,
    snapshot: &[JobRecord],
    running: &HashSet<JobId>,
    now_ms: u128,
) -> Option<BlockedReason> {
    check(job, &index(snapshot), running, now_ms)
}

/// Every pending job that is currently ineligible, in snapshot order.
pub fn explain_blocked(
    snapshot: &[JobRecord],
    running: &HashSet<JobId>,
    now_ms: u128,
) -> Vec<BlockedJob> {
    let by_id = index(snapshot);
    snapshot
        .iter()
        .filter(|job| job.status == JobStatus::Pending)
        .filter_map(|job| {
            check(job, &by_id, running, now_ms).map(|reason| BlockedJob {
                job_id: job.id.clone(),
                reason,
            })
        })
        .collect()
}

/// Select the next job to launch.
///
/// Highest `priority` wins; ties go to the smallest `created_at_ms`, and full
/// ties to the earliest position in `snapshot`.
pub fn select_next<'a>(
    snapshot: &'a [JobRecord],
    running: &HashSet<JobId>,
    now_ms: u128,
) -> Option<&'a JobRecord> {
    let by_id = index(snapshot);
    let mut best: Option<&JobRecord> = None;
    for job in snapshot {
        if check(job, &by_id, running, now_ms).is_some() {
            continue;
        }
        best = match best {
            Some(current)
                if job.priority < current.priority
                    || (job.priority == current.priority
                        && job.created_at_ms >= current.created_at_ms) =>
            {
                Some(current)
            }
            _ => Some(job),
        };
    }
    best
}
