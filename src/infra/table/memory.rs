//! In-memory job table preserving insertion order.

use parking_lot::RwLock;

use crate::core::job::{JobPatch, JobRecord};
use crate::core::table::JobTable;
use crate::core::SchedulerError;
use crate::util::ids::JobId;

const DEFAULT_MAX_JOBS: usize = 10_000;

/// Job table held in memory behind a read-write lock.
///
/// Each [`update`](JobTable::update) takes the write lock once, so a
/// snapshot sees a patch either fully applied or not at all.
#[derive(Debug)]
pub struct InMemoryJobTable {
    jobs: RwLock<Vec<JobRecord>>,
    max_jobs: usize,
}

impl Default for InMemoryJobTable {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryJobTable {
    /// Create an empty table with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_JOBS)
    }

    /// Create an empty table holding at most `max_jobs` records.
    pub fn with_capacity(max_jobs: usize) -> Self {
        Self {
            jobs: RwLock::new(Vec::new()),
            max_jobs,
        }
    }

    /// Append a record. Rejects duplicate ids and a full table.
    pub fn insert(&self, job: JobRecord) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.write();
        if jobs.len() >= self.max_jobs {
            return Err(SchedulerError::TableFull(self.max_jobs));
        }
        if jobs.iter().any(|j| j.id == job.id) {
            return Err(SchedulerError::DuplicateJob(job.id));
        }
        tracing::debug!(job_id = %job.id, priority = job.priority, "job inserted");
        jobs.push(job);
        Ok(())
    }

    /// Remove a record, returning it if present.
    ///
    /// Removing a running job does not stop its worker; later updates for
    /// the id are ignored.
    pub fn remove(&self, id: &JobId) -> Option<JobRecord> {
        let mut jobs = self.jobs.write();
        let pos = jobs.iter().position(|j| &j.id == id)?;
        Some(jobs.remove(pos))
    }

    /// Copy of one record.
    pub fn get(&self, id: &JobId) -> Option<JobRecord> {
        self.jobs.read().iter().find(|j| &j.id == id).cloned()
    }

    /// Remove completed and failed jobs. Returns the number removed.
    pub fn clear_finished(&self) -> usize {
        let mut jobs = self.jobs.write();
        let before = jobs.len();
        jobs.retain(|j| !j.status.is_finished());
        before - jobs.len()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.read().is_empty()
    }
}

impl JobTable for InMemoryJobTable {
    fn snapshot(&self) -> Vec<JobRecord> {
        self.jobs.read().clone()
    }

    fn update(&self, id: &JobId, patch: JobPatch) {
        let mut jobs = self.jobs.write();
        match jobs.iter_mut().find(|j| &j.id == id) {
            Some(job) => job.apply(patch),
            None => tracing::debug!(job_id = %id, "update ignored: unknown job"),
        }
    }
}
