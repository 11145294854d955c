//! Core scheduling abstractions: job model, selector, gate, orchestrator and
//! the scheduling loop.

pub mod error;
pub mod events;
pub mod gate;
pub mod job;
pub mod launcher;
pub mod orchestrator;
pub mod scheduler;
pub mod selector;
pub mod table;
pub mod transitions;

pub use error::{AppResult, SchedulerError};
pub use events::{EventSource, Subscription, WorkerEvent, WorkerEventKind};
pub use gate::{ConcurrencyGate, DEFAULT_MAX_CONCURRENT};
pub use job::{JobCommand, JobFailure, JobPatch, JobRecord, JobStatus, PERCENT_KEY};
pub use launcher::{ProcessLauncher, ProcessTerminator, Spawn};
pub use orchestrator::{ProcessOrchestrator, RunningJob};
pub use scheduler::{LoopState, Scheduler, TickOutcome, DEFAULT_TICK_INTERVAL};
pub use selector::{
    blocked_reason, explain_blocked, is_eligible, select_next, BlockedJob, BlockedReason,
};
pub use table::JobTable;
pub use transitions::{
    build_transition, InMemoryTransitionLog, JobTransition, TracingTransitionSink, TransitionSink,
};
