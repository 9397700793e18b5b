//! Exit codes for the pq CLI.
//!
//! Exit code ranges:
//! - 0-2: Lookup outcomes (read the answer from the code, not the output)
//! - 10-19: User/environment errors
//! - 20-29: Internal errors

use pq_common::Lookup;

/// Exit codes for pq invocations. Stable for scripting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Exactly one answer (or a yes/no query answered yes)
    Found = 0,

    /// Nothing matched, or no tool could answer
    NotFound = 1,

    /// Several candidates; none picked
    Ambiguous = 2,

    /// Invalid arguments
    ArgsError = 10,

    /// Configuration file or override rejected
    ConfigError = 11,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error writing results
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Check if this exit code is a lookup outcome rather than a failure.
    pub fn is_outcome(self) -> bool {
        (self as i32) < 10
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&(self as i32))
    }

    pub fn is_internal_error(self) -> bool {
        (self as i32) >= 20
    }

    /// Error code name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Found => "OK_FOUND",
            ExitCode::NotFound => "OK_NOT_FOUND",
            ExitCode::Ambiguous => "OK_AMBIGUOUS",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Exit code describing a lookup outcome.
    pub fn for_lookup<T>(lookup: &Lookup<T>) -> Self {
        match lookup {
            Lookup::Found(_) => ExitCode::Found,
            Lookup::Ambiguous(_) => ExitCode::Ambiguous,
            Lookup::NotFound => ExitCode::NotFound,
        }
    }

    /// Exit code for a failure reported by pq-common.
    pub fn for_error(error: &pq_common::Error) -> Self {
        use pq_common::ErrorCategory;
        match error.category() {
            ErrorCategory::Config => ExitCode::ConfigError,
            ErrorCategory::Args => ExitCode::ArgsError,
            ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Execution => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}
