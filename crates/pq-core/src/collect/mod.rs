//! External command execution.
//!
//! This module provides the execution layer for discovery:
//! - Command lines built from strategy templates
//! - The `CommandRunner` seam between strategies and process spawning
//! - The tool runner that spawns them with a timeout and output cap

mod command;
pub mod tool_runner;

pub use command::{CommandLine, CommandRunner};
pub use tool_runner::{
    split_lines, ToolConfig, ToolError, ToolOutput, ToolRunner, DEFAULT_MAX_OUTPUT_BYTES,
    DEFAULT_TIMEOUT_MS,
};
