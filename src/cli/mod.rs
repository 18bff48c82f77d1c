//! Command-line interface for vyvchai.
//!
//! Provides commands for processing a tutoring request and for inspecting
//! response-cache keys.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, CacheKeyArgs, Cli, Commands, RunArgs};
