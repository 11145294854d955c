//! Process launcher backends.

pub mod command;

pub use command::CommandLauncher;
