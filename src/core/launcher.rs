//! Capabilities the orchestrator delegates to: launching, terminating and
//! spawning background work.

use std::future::Future;

use async_trait::async_trait;

use crate::core::error::SchedulerError;
use crate::core::job::JobCommand;
use crate::util::ids::HandleId;

/// Starts external worker processes.
///
/// # Example
///
/// ```rust,ignore
/// use async_trait::async_trait;
/// use prometheus_job_scheduler::core::{JobCommand, ProcessLauncher, SchedulerError};
/// use prometheus_job_scheduler::util::HandleId;
///
/// struct Remote;
///
/// #[async_trait]
/// impl ProcessLauncher for Remote {
///     async fn launch(&self, command: &JobCommand) -> Result<HandleId, SchedulerError> {
///         let pid = start_on_agent(command).await?;
///         Ok(HandleId::new(pid))
///     }
/// }
/// ```
#[async_trait]
pub trait ProcessLauncher: Send + Sync + 'static {
    /// Launch `command` and return the handle the worker's events will carry.
    ///
    /// Returns once the launch is acknowledged, not when the worker exits.
    async fn launch(&self, command: &JobCommand) -> Result<HandleId, SchedulerError>;
}

/// Stops external worker processes.
#[async_trait]
pub trait ProcessTerminator: Send + Sync + 'static {
    /// Terminate the worker behind `handle`, returning once acknowledged.
    async fn terminate(&self, handle: &HandleId) -> Result<(), SchedulerError>;
}

/// Abstraction for spawning background futures on a runtime.
pub trait Spawn {
    /// Spawn a future that runs to completion in the background.
    fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static;
}
