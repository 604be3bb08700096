//! CLI command implementations for herakles-proc-cpu-sampler.
//!
//! This module provides implementations for the CLI subcommands:
//! - `check`: System validation
//! - `test`: Fixed-length sampling run with loop statistics

pub mod check;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use test::command_test;
