//! Event source backends.

pub mod bus;

pub use bus::EventBus;
