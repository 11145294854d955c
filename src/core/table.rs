//! Job table contract consumed by the scheduler.

use crate::core::job::{JobPatch, JobRecord};
use crate::util::ids::JobId;

/// Backing store for job records.
///
/// The scheduler never keeps copies of records between decisions: it reads a
/// fresh [`snapshot`](JobTable::snapshot) every tick and writes only through
/// [`update`](JobTable::update).
pub trait JobTable: Send + Sync + 'static {
    /// Ordered copy of every record, consistent at the instant of the call.
    fn snapshot(&self) -> Vec<JobRecord>;

    /// Merge `patch` into the record identified by `id`.
    ///
    /// Unknown ids are ignored. A merge is never partially visible to a
    /// concurrent snapshot.
    fn update(&self, id: &JobId, patch: JobPatch);
}
