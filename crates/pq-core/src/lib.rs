//! Process Query Core Library
//!
//! Discovers facts about running processes by invoking the system tools
//! found on the host and parsing their output:
//! - PID by process name, listening port, or open file
//! - Working directory and BSD jail of a PID
//! - Whether a command name is running
//! - Path expansion for user-typed paths
//!
//! Every lookup walks a preference-ordered table of tools, skipping those
//! that aren't installed or don't apply to the platform. A missing tool is
//! never an error; the worst outcome is `Lookup::NotFound`.
//!
//! The binary entry point is in `main.rs`.

pub mod availability;
pub mod collect;
pub mod config;
pub mod exit_codes;
pub mod logging;
pub mod parsers;
pub mod paths;
pub mod platform;
pub mod strategy;
pub mod system;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use availability::ToolLocator;
pub use config::{load_config, ConfigOptions, ProbeConfig};
pub use paths::{expand_path, expand_path_in};
pub use pq_common::{Error, JailId, Lookup, PlatformKind, Port, ProcessId, Result};
pub use system::SystemProbe;
