//! Infrastructure adapters: job table, event bus and process launcher.

pub mod events;
#[cfg(feature = "process-launcher")]
pub mod process;
pub mod table;

pub use events::EventBus;
#[cfg(feature = "process-launcher")]
pub use process::CommandLauncher;
pub use table::InMemoryJobTable;
