//! Unit tests for individual components

mod config_test;
mod error_test;
mod runtime_test;
mod transitions_test;
mod util_test;
