//! Builders wiring scheduler components from configuration.

pub mod scheduler_builder;

#[cfg(feature = "process-launcher")]
pub use scheduler_builder::{build_command_scheduler, CommandScheduler, CommandSchedulerParts};
pub use scheduler_builder::build_scheduler;
