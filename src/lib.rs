//! # Prometheus Job Scheduler
//!
//! A single-flight job scheduler that picks the next eligible job from a
//! mutable job table, launches it as an external worker process, and tracks
//! the worker through asynchronous progress, completion and error events.
//!
//! ## Scheduling Model
//!
//! - **Eligibility**: a job runs only when it is pending, not already
//!   running, past its scheduled time, and every dependency has completed
//! - **Ordering**: highest priority first, oldest `created_at` on ties
//! - **Concurrency bound**: at most `max_concurrent` workers at once; the bound
//!   can change at any time and never preempts running workers
//! - **Pacing**: the loop launches at most one job per tick
//! - **Stop semantics**: stopping a job terminates its worker and requeues it
//!   as pending
//!
//! ## Components
//!
//! - [`core::JobTable`]: snapshot + merge-update contract
//!   ([`infra::InMemoryJobTable`] implements it)
//! - [`core::select_next`]: pure eligibility selector
//! - [`core::ConcurrencyGate`]: mutable concurrency bound
//! - [`core::ProcessOrchestrator`]: launches workers and owns the running-handle map
//! - [`core::Scheduler`]: the periodic driver
//!
//! ```rust,ignore
//! use prometheus_job_scheduler::builders::build_command_scheduler;
//! use prometheus_job_scheduler::config::SchedulerConfig;
//! use prometheus_job_scheduler::core::{JobCommand, JobRecord};
//! use prometheus_job_scheduler::runtime::TokioSpawner;
//!
//! let parts = build_command_scheduler(&SchedulerConfig::default(), TokioSpawner::current())?;
//! let encode = JobRecord::new(JobCommand::shell("ffmpeg -i in.mov out.mp4")).with_priority(2);
//! parts.table.insert(encode)?;
//! parts.scheduler.start();
//! // ...
//! parts.scheduler.stop().await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core scheduling abstractions: job model, selector, gate, orchestrator, loop.
pub mod core;
/// Configuration models for the scheduler and launcher.
pub mod config;
/// Builders to construct a scheduler from configuration.
pub mod builders;
/// Infrastructure adapters for tables, events and processes.
pub mod infra;
/// Runtime adapters and API surface.
pub mod runtime;
/// Shared utilities.
pub mod util;
