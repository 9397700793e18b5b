//! Error types for pq.
//!
//! Discovery itself never fails: a fact is either found, ambiguous, or not
//! found. The errors here cover the surrounding surface (configuration,
//! arguments, I/O) and carry stable codes and categories so callers and the
//! CLI can react without string matching.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pq operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file or environment errors.
    Config,
    /// Invalid caller input.
    Args,
    /// External command execution errors.
    Execution,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Args => write!(f, "args"),
            ErrorCategory::Execution => write!(f, "execution"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for pq.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid config file {path}: {message}")]
    InvalidConfigFile { path: PathBuf, message: String },

    #[error("invalid config value for {field}: {message}")]
    InvalidConfigValue { field: String, message: String },

    // Argument errors (20-29)
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    // Execution errors (30-39)
    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("command failed: {0}")]
    ExecutionFailure(String),

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Argument errors
    /// - 30-39: Execution errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfigFile { .. } => 11,
            Error::InvalidConfigValue { .. } => 12,
            Error::InvalidArgument(_) => 20,
            Error::ToolUnavailable(_) => 30,
            Error::ExecutionFailure(_) => 31,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfigFile { .. } | Error::InvalidConfigValue { .. } => {
                ErrorCategory::Config
            }
            Error::InvalidArgument(_) => ErrorCategory::Args,
            Error::ToolUnavailable(_) | Error::ExecutionFailure(_) => ErrorCategory::Execution,
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns a human-readable remediation hint.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::InvalidConfigFile { .. } => {
                "Check the TOML syntax of the config file, or unset PQ_CONFIG to use defaults."
            }
            Error::InvalidConfigValue { .. } => {
                "Timeouts and output limits must be greater than zero."
            }
            Error::InvalidArgument(_) => "Run 'pq --help' for usage.",
            Error::ToolUnavailable(_) => {
                "Install the tool or add its directory to PATH (or search_path in the config)."
            }
            Error::ExecutionFailure(_) => {
                "The command exited with an error. Re-run with PQ_LOG=debug to see its stderr."
            }
            Error::Io(_) | Error::Json(_) => "Check file permissions and retry the operation.",
        }
    }
}

/// Structured error representation for JSON output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    pub code: u32,
    pub category: ErrorCategory,
    pub message: String,
    pub remediation: String,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            remediation: err.remediation().to_string(),
        }
    }
}
