//! Builders to construct a scheduler from configuration.

use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::core::{
    ConcurrencyGate, EventSource, JobTable, ProcessLauncher, ProcessOrchestrator,
    ProcessTerminator, Scheduler, SchedulerError, Spawn, TransitionSink,
};

#[cfg(feature = "process-launcher")]
use anyhow::Context;

#[cfg(feature = "process-launcher")]
use crate::core::{AppResult, InMemoryTransitionLog};
#[cfg(feature = "process-launcher")]
use crate::infra::{CommandLauncher, EventBus, InMemoryJobTable};
#[cfg(feature = "process-launcher")]
use crate::runtime::TokioSpawner;

/// Build an idle scheduler from configuration and caller-supplied components.
pub fn build_scheduler<T, L, K, E, S>(
    cfg: &SchedulerConfig,
    table: Arc<T>,
    launcher: Arc<L>,
    terminator: Arc<K>,
    events: Arc<E>,
    spawner: S,
    transitions: Option<Arc<dyn TransitionSink>>,
) -> Result<Scheduler<T, L, K, E, S>, SchedulerError>
where
    T: JobTable,
    L: ProcessLauncher,
    K: ProcessTerminator,
    E: EventSource,
    S: Spawn + Clone + Send + Sync + 'static,
{
    cfg.validate().map_err(SchedulerError::InvalidConfig)?;

    let mut orchestrator =
        ProcessOrchestrator::new(table, launcher, terminator, events, spawner.clone());
    if let Some(sink) = transitions {
        orchestrator = orchestrator.with_transitions(sink);
    }
    let gate = Arc::new(ConcurrencyGate::new(cfg.max_concurrent));
    Ok(Scheduler::new(orchestrator, gate, cfg.tick_interval(), spawner))
}

/// Scheduler running local processes against an in-memory table.
#[cfg(feature = "process-launcher")]
pub type CommandScheduler =
    Scheduler<InMemoryJobTable, CommandLauncher, CommandLauncher, EventBus, TokioSpawner>;

/// A [`CommandScheduler`] together with the components callers interact with.
#[cfg(feature = "process-launcher")]
pub struct CommandSchedulerParts {
    /// The scheduler, idle until started.
    pub scheduler: CommandScheduler,
    /// Job table to insert work into.
    pub table: Arc<InMemoryJobTable>,
    /// Event bus shared by launcher and orchestrator.
    pub bus: EventBus,
    /// Transition log fed by the orchestrator.
    pub transitions: Arc<InMemoryTransitionLog>,
}

/// Wire a scheduler that launches local processes.
#[cfg(feature = "process-launcher")]
pub fn build_command_scheduler(
    cfg: &SchedulerConfig,
    spawner: TokioSpawner,
) -> AppResult<CommandSchedulerParts> {
    let table = Arc::new(InMemoryJobTable::new());
    let bus = EventBus::new();
    let launcher = Arc::new(CommandLauncher::new(bus.clone(), cfg.launcher.clone()));
    let transitions = Arc::new(InMemoryTransitionLog::new(cfg.transition_log_capacity));

    let scheduler = build_scheduler(
        cfg,
        Arc::clone(&table),
        Arc::clone(&launcher),
        launcher,
        Arc::new(bus.clone()),
        spawner,
        Some(Arc::clone(&transitions) as Arc<dyn TransitionSink>),
    )
    .context("building command scheduler")?;

    Ok(CommandSchedulerParts {
        scheduler,
        table,
        bus,
        transitions,
    })
}
