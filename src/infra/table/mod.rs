//! Job table backends.

pub mod memory;

pub use memory::InMemoryJobTable;
