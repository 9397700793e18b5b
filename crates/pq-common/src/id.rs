//! Process, port, and jail identity types.
//!
//! Every value produced by an output parser passes through these types, so a
//! malformed token can never surface as a process identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID wrapper. Always greater than zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(u32);

impl ProcessId {
    /// Create a ProcessId, rejecting zero.
    pub fn new(pid: u32) -> Option<Self> {
        if pid == 0 {
            None
        } else {
            Some(ProcessId(pid))
        }
    }

    /// Parse a PID token as printed by system tools.
    ///
    /// Surrounding whitespace is ignored. Signs, embedded spaces, and values
    /// outside `1..=i32::MAX` are rejected since no kernel hands those out.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let pid: u32 = s.parse().ok()?;
        if pid > i32::MAX as u32 {
            return None;
        }
        ProcessId::new(pid)
    }

    /// The current process.
    pub fn current() -> Self {
        ProcessId(std::process::id())
    }

    /// Raw numeric value.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<ProcessId> for u32 {
    fn from(pid: ProcessId) -> Self {
        pid.0
    }
}

/// TCP port number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(pub u16);

impl Port {
    /// Whether `addr` (e.g. `127.0.0.1:9051`, `*:9051`, `[::1]:9051`) ends with this port.
    pub fn matches_address(self, addr: &str) -> bool {
        addr.rsplit_once(':')
            .and_then(|(_, port)| port.parse::<u16>().ok())
            .is_some_and(|port| port == self.0)
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for Port {
    fn from(port: u16) -> Self {
        Port(port)
    }
}

/// BSD jail identifier. Zero means the process is not jailed (or unknown).
pub type JailId = u32;
