//! Strategy tables and the dispatcher that walks them.
//!
//! A [`Strategy`] pairs one system tool with the command line to run and the
//! parser for its output. Each query has a table ordered by preference; the
//! [`Dispatcher`] tries entries that apply to the host platform and whose
//! tool is installed, stopping at the first definitive answer.

use crate::availability::ToolLocator;
use crate::collect::{CommandLine, CommandRunner};
use crate::parsers;
use pq_common::{JailId, Lookup, PlatformKind, Port, ProcessId};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, trace};

/// External tools the strategies shell out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    Pgrep,
    Pidof,
    Ps,
    Lsof,
    Netstat,
    Sockstat,
    Pwdx,
}

impl Tool {
    /// Executable name looked up on the search path.
    pub fn binary(self) -> &'static str {
        match self {
            Tool::Pgrep => "pgrep",
            Tool::Pidof => "pidof",
            Tool::Ps => "ps",
            Tool::Lsof => "lsof",
            Tool::Netstat => "netstat",
            Tool::Sockstat => "sockstat",
            Tool::Pwdx => "pwdx",
        }
    }

    pub const ALL: [Tool; 7] = [
        Tool::Pgrep,
        Tool::Pidof,
        Tool::Ps,
        Tool::Lsof,
        Tool::Netstat,
        Tool::Sockstat,
        Tool::Pwdx,
    ];
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Platforms a strategy's command line and output format are valid on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applies {
    Any,
    LinuxOnly,
    BsdOnly,
}

impl Applies {
    pub fn matches(self, platform: PlatformKind) -> bool {
        match self {
            Applies::Any => true,
            Applies::LinuxOnly => platform == PlatformKind::LinuxLike,
            Applies::BsdOnly => platform == PlatformKind::BsdLike,
        }
    }
}

/// One way of answering a query of type `Q` with a value of type `T`.
pub struct Strategy<Q: ?Sized, T> {
    pub tool: Tool,
    pub applies: Applies,
    /// Builds the command line, substituting the query value.
    pub command: fn(&Q) -> CommandLine,
    /// Interprets the command's stdout lines.
    pub parse: fn(&[String], &Q) -> Lookup<T>,
}

impl<Q: ?Sized, T> Clone for Strategy<Q, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<Q: ?Sized, T> Copy for Strategy<Q, T> {}

impl<Q: ?Sized, T> fmt::Debug for Strategy<Q, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Strategy")
            .field("tool", &self.tool)
            .field("applies", &self.applies)
            .finish()
    }
}

// Command templates

fn pgrep_by_name(name: &str) -> CommandLine {
    CommandLine::new("pgrep").arg("-x").arg(name)
}

fn pidof_by_name(name: &str) -> CommandLine {
    CommandLine::new("pidof").arg(name)
}

fn ps_linux_by_name(name: &str) -> CommandLine {
    CommandLine::new("ps").args(["-o", "pid", "-C"]).arg(name)
}

fn ps_bsd_listing(_name: &str) -> CommandLine {
    CommandLine::new("ps").arg("axc")
}

// `-c` is a prefix match, so the parser compares the `c` field exactly.
// `+c 0` keeps command names from being cut to 9 characters.
fn lsof_by_name(name: &str) -> CommandLine {
    CommandLine::new("lsof")
        .args(["-w", "+c", "0", "-a", "-c"])
        .arg(name)
        .args(["-d", "cwd", "-Fpc"])
}

fn netstat_listeners(_port: &Port) -> CommandLine {
    CommandLine::new("netstat").arg("-npltu")
}

fn sockstat_by_port(port: &Port) -> CommandLine {
    CommandLine::new("sockstat")
        .args(["-4l", "-P", "tcp", "-p"])
        .arg(port.to_string())
}

fn lsof_listeners(_port: &Port) -> CommandLine {
    CommandLine::new("lsof").args(["-wnP", "-iTCP", "-sTCP:LISTEN"])
}

fn lsof_by_open_file(path: &str) -> CommandLine {
    CommandLine::new("lsof").arg("-tw").arg(path)
}

fn pwdx_by_pid(pid: &ProcessId) -> CommandLine {
    CommandLine::new("pwdx").arg(pid.to_string())
}

fn lsof_cwd_by_pid(pid: &ProcessId) -> CommandLine {
    CommandLine::new("lsof")
        .args(["-a", "-p"])
        .arg(pid.to_string())
        .args(["-d", "cwd", "-Fn"])
}

fn ps_jail_by_pid(pid: &ProcessId) -> CommandLine {
    CommandLine::new("ps")
        .arg("-p")
        .arg(pid.to_string())
        .args(["-o", "jid"])
}

fn ps_linux_commands(_name: &str) -> CommandLine {
    CommandLine::new("ps").args(["-A", "co", "command"])
}

fn ps_bsd_commands(_name: &str) -> CommandLine {
    CommandLine::new("ps").args(["-ao", "ucomm="])
}

// Parser adapters for tables whose parser ignores the query

fn pid_list(lines: &[String], _name: &str) -> Lookup<ProcessId> {
    parsers::parse_pid_list(lines)
}

fn pidof(lines: &[String], _name: &str) -> Lookup<ProcessId> {
    parsers::parse_pidof(lines)
}

fn ps_linux(lines: &[String], _name: &str) -> Lookup<ProcessId> {
    parsers::parse_ps_linux(lines)
}

fn lsof_commands(lines: &[String], name: &str) -> Lookup<ProcessId> {
    parsers::parse_lsof_commands(lines, name)
}

fn ps_bsd(lines: &[String], name: &str) -> Lookup<ProcessId> {
    parsers::parse_ps_bsd(lines, name)
}

fn netstat(lines: &[String], port: &Port) -> Lookup<ProcessId> {
    parsers::parse_netstat(lines, *port)
}

fn sockstat(lines: &[String], port: &Port) -> Lookup<ProcessId> {
    parsers::parse_sockstat(lines, *port)
}

fn lsof_listen(lines: &[String], port: &Port) -> Lookup<ProcessId> {
    parsers::parse_lsof_listen(lines, *port)
}

fn pwdx(lines: &[String], pid: &ProcessId) -> Lookup<PathBuf> {
    parsers::parse_pwdx(lines, *pid)
}

fn lsof_cwd(lines: &[String], pid: &ProcessId) -> Lookup<PathBuf> {
    parsers::parse_lsof_cwd(lines, *pid)
}

fn jail_id(lines: &[String], _pid: &ProcessId) -> Lookup<JailId> {
    parsers::parse_jail_id(lines)
}

fn listing(lines: &[String], name: &str) -> Lookup<bool> {
    parsers::parse_process_listing(lines, name)
}

/// PID of a process by exact name.
pub const PID_BY_NAME: &[Strategy<str, ProcessId>] = &[
    Strategy { tool: Tool::Pgrep, applies: Applies::Any, command: pgrep_by_name, parse: pid_list },
    Strategy { tool: Tool::Pidof, applies: Applies::Any, command: pidof_by_name, parse: pidof },
    Strategy { tool: Tool::Ps, applies: Applies::LinuxOnly, command: ps_linux_by_name, parse: ps_linux },
    Strategy { tool: Tool::Ps, applies: Applies::BsdOnly, command: ps_bsd_listing, parse: ps_bsd },
    Strategy { tool: Tool::Lsof, applies: Applies::Any, command: lsof_by_name, parse: lsof_commands },
];

/// PID of the process listening on a TCP port.
pub const PID_BY_PORT: &[Strategy<Port, ProcessId>] = &[
    Strategy { tool: Tool::Netstat, applies: Applies::LinuxOnly, command: netstat_listeners, parse: netstat },
    Strategy { tool: Tool::Sockstat, applies: Applies::BsdOnly, command: sockstat_by_port, parse: sockstat },
    Strategy { tool: Tool::Lsof, applies: Applies::Any, command: lsof_listeners, parse: lsof_listen },
];

/// PID of the process holding a file open.
pub const PID_BY_OPEN_FILE: &[Strategy<str, ProcessId>] = &[Strategy {
    tool: Tool::Lsof,
    applies: Applies::Any,
    command: lsof_by_open_file,
    parse: pid_list,
}];

/// Working directory of a process.
pub const CWD: &[Strategy<ProcessId, PathBuf>] = &[
    Strategy { tool: Tool::Pwdx, applies: Applies::Any, command: pwdx_by_pid, parse: pwdx },
    Strategy { tool: Tool::Lsof, applies: Applies::Any, command: lsof_cwd_by_pid, parse: lsof_cwd },
];

/// FreeBSD jail of a process.
pub const JAIL_ID: &[Strategy<ProcessId, JailId>] = &[Strategy {
    tool: Tool::Ps,
    applies: Applies::BsdOnly,
    command: ps_jail_by_pid,
    parse: jail_id,
}];

/// Whether any process with a given command name is running.
pub const IS_RUNNING: &[Strategy<str, bool>] = &[
    Strategy { tool: Tool::Ps, applies: Applies::LinuxOnly, command: ps_linux_commands, parse: listing },
    Strategy { tool: Tool::Ps, applies: Applies::BsdOnly, command: ps_bsd_commands, parse: listing },
];

/// What happened when a strategy was considered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The tool isn't installed (or is disabled); nothing was run.
    Unavailable,
    /// The command failed to run or exited unsuccessfully.
    Failed(String),
    NotFound,
    Found,
    /// Number of distinct candidates reported.
    Ambiguous(usize),
}

/// One strategy considered during a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    pub tool: Tool,
    pub command: String,
    pub outcome: AttemptOutcome,
}

/// Walks strategy tables against a platform, a locator, and a runner.
#[derive(Debug)]
pub struct Dispatcher<'a, R> {
    platform: PlatformKind,
    locator: &'a ToolLocator,
    runner: &'a R,
}

impl<'a, R: CommandRunner> Dispatcher<'a, R> {
    pub fn new(platform: PlatformKind, locator: &'a ToolLocator, runner: &'a R) -> Self {
        Self {
            platform,
            locator,
            runner,
        }
    }

    /// First definitive answer from `strategies`, or `NotFound`.
    pub fn dispatch<Q: ?Sized, T>(&self, strategies: &[Strategy<Q, T>], query: &Q) -> Lookup<T> {
        self.walk(strategies, query, None)
    }

    /// Like [`dispatch`](Self::dispatch), also reporting every strategy considered.
    pub fn dispatch_with_trace<Q: ?Sized, T>(
        &self,
        strategies: &[Strategy<Q, T>],
        query: &Q,
    ) -> (Lookup<T>, Vec<Attempt>) {
        let mut trace = Vec::new();
        let result = self.walk(strategies, query, Some(&mut trace));
        (result, trace)
    }

    fn walk<Q: ?Sized, T>(
        &self,
        strategies: &[Strategy<Q, T>],
        query: &Q,
        mut trace: Option<&mut Vec<Attempt>>,
    ) -> Lookup<T> {
        for strategy in strategies.iter().filter(|s| s.applies.matches(self.platform)) {
            let command = (strategy.command)(query);
            let mut record = |outcome: AttemptOutcome| {
                if let Some(trace) = trace.as_deref_mut() {
                    trace.push(Attempt {
                        tool: strategy.tool,
                        command: command.to_string(),
                        outcome,
                    });
                }
            };

            if !self.locator.is_available(strategy.tool.binary()) {
                trace!(tool = %strategy.tool, "skipping unavailable tool");
                record(AttemptOutcome::Unavailable);
                continue;
            }

            let lines = match self.runner.call(&command) {
                Ok(lines) => lines,
                Err(e) => {
                    debug!(command = %command, error = %e, "strategy command failed");
                    record(AttemptOutcome::Failed(e.to_string()));
                    continue;
                }
            };
            trace!(command = %command, lines = lines.len(), "strategy command output");

            let result = (strategy.parse)(&lines, query);
            let outcome = match &result {
                Lookup::Found(_) => AttemptOutcome::Found,
                Lookup::Ambiguous(candidates) => AttemptOutcome::Ambiguous(candidates.len()),
                Lookup::NotFound => AttemptOutcome::NotFound,
            };
            debug!(command = %command, outcome = ?outcome, "strategy answered");
            record(outcome);

            if result.is_definitive() {
                return result;
            }
        }
        Lookup::NotFound
    }
}
