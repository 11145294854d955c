//! Configuration models for the scheduler and its launcher.

pub mod scheduler;

pub use scheduler::{LauncherConfig, SchedulerConfig};
