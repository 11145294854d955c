//! Runtime adapters and API surface.

pub mod api;
pub mod tokio_spawner;

pub use api::{status_report, submit_job, JobSubmission, SchedulerStatus};
pub use tokio_spawner::TokioSpawner;
