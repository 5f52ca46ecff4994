//! Command-line interface for mp3-tidy.
//!
//! Each phase of a cleaning run can be started on its own, or all of them
//! in sequence with `run`.

mod commands;

pub use commands::{Cli, Commands, run_command};
