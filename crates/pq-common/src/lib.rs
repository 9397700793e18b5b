//! Process query common types, IDs, and errors.
//!
//! This crate provides foundational types shared across pq-core modules:
//! - Process, port, and jail identity types with validation
//! - Lookup outcomes that distinguish "not found" from "ambiguous"
//! - Platform classification
//! - Common error types
//! - Output formats for command results

pub mod error;
pub mod id;
pub mod lookup;
pub mod output;
pub mod platform;

pub use error::{Error, ErrorCategory, Result};
pub use id::{JailId, Port, ProcessId};
pub use lookup::Lookup;
pub use output::OutputFormat;
pub use platform::PlatformKind;
