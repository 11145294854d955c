//! Error types for scheduler operations.

use thiserror::Error;

use crate::util::ids::JobId;

/// Errors produced by scheduler components.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The process launcher rejected a launch request.
    #[error("launch failed: {0}")]
    Launch(String),
    /// The process terminator could not stop a worker.
    #[error("terminate failed: {0}")]
    Terminate(String),
    /// The job already holds a running handle.
    #[error("job already running: {0}")]
    AlreadyRunning(JobId),
    /// A job with the same id is already present in the table.
    #[error("duplicate job: {0}")]
    DuplicateJob(JobId),
    /// The job table reached its configured capacity.
    #[error("job table full (capacity {0})")]
    TableFull(usize),
    /// Configuration failed validation.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
