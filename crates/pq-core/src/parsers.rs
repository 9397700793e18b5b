//! Parsers for system tool output.
//!
//! Each parser takes the stdout lines of one tool invocation plus the value
//! the query was about (process name, port, or PID) and returns a typed
//! [`Lookup`]. Parsers never panic and never return partial values: output
//! that doesn't have the expected shape yields `Lookup::NotFound`.
//!
//! # Formats
//!
//! ```text
//! pgrep -x tor                  lsof -tw PATH
//!   3283                          3283
//!
//! lsof -w +c 0 -a -c tor -d cwd -Fpc
//!   p3283
//!   ctor
//!   fcwd
//!
//! pidof tor                     ps -o pid -C tor
//!   3283 3281                     PID
//!                                 3283
//!
//! ps axc
//!   PID   TT  STAT      TIME COMMAND
//!     1   ??  Ss     9:00.22 launchd
//!  3283   ??  Ss     0:12.57 tor
//!
//! netstat -npltu
//!   Proto Recv-Q Send-Q Local Address    Foreign Address  State   PID/Program name
//!   tcp        0      0 127.0.0.1:9051   0.0.0.0:*        LISTEN  1641/tor
//!
//! sockstat -4l -P tcp -p 9051
//!   USER  COMMAND  PID   FD PROTO  LOCAL ADDRESS      FOREIGN ADDRESS
//!   _tor  tor      4397  7  tcp4   51.64.7.84:9051    *:*
//!
//! lsof -wnP -iTCP -sTCP:LISTEN
//!   COMMAND  PID   USER   FD   TYPE DEVICE SIZE/OFF NODE NAME
//!   tor     1745 atagar    6u  IPv4  14229      0t0  TCP 127.0.0.1:9051 (LISTEN)
//!
//! pwdx 3799                     lsof -a -p 3799 -d cwd -Fn
//!   3799: /home/atagar            p3799
//!                                 fcwd
//!                                 n/home/atagar
//!
//! ps -p 3799 -o jid
//!   JID
//!     0
//! ```

use pq_common::{JailId, Lookup, Port, ProcessId};
use std::path::PathBuf;

/// One PID per line (`pgrep -x`, `lsof -t`).
///
/// Several distinct PIDs are reported as ambiguous rather than picking one.
pub fn parse_pid_list(lines: &[String]) -> Lookup<ProcessId> {
    let mut pids = Vec::new();
    for line in non_blank(lines) {
        match ProcessId::parse(line) {
            Some(pid) => pids.push(pid),
            None => return Lookup::NotFound,
        }
    }
    Lookup::from_candidates(pids)
}

/// `pidof NAME`: whitespace separated PIDs on one line, first token wins.
pub fn parse_pidof(lines: &[String]) -> Lookup<ProcessId> {
    non_blank(lines)
        .next()
        .and_then(|line| line.split_whitespace().next())
        .and_then(ProcessId::parse)
        .into()
}

/// `lsof -Fpc` field output: a `p<pid>` line, then that process's `c<command>`.
///
/// Only commands equal to `name` count; lsof's own `-c` filter is a prefix match.
pub fn parse_lsof_commands(lines: &[String], name: &str) -> Lookup<ProcessId> {
    let mut current = None;
    let mut pids = Vec::new();
    for line in non_blank(lines) {
        if let Some(value) = line.strip_prefix('p') {
            current = ProcessId::parse(value);
        } else if let Some(command) = line.strip_prefix('c') {
            if command == name {
                pids.extend(current.take());
            }
        }
    }
    Lookup::from_candidates(pids)
}

/// `ps -o pid -C NAME`: a `PID` header followed by one row per match.
pub fn parse_ps_linux(lines: &[String]) -> Lookup<ProcessId> {
    let mut rows = non_blank(lines);
    let Some(pid_column) = rows.next().and_then(|header| header_column(header, "PID")) else {
        return Lookup::NotFound;
    };

    let mut pids = Vec::new();
    for row in rows {
        match row.split_whitespace().nth(pid_column).and_then(ProcessId::parse) {
            Some(pid) => pids.push(pid),
            None => return Lookup::NotFound,
        }
    }
    Lookup::from_candidates(pids)
}

/// `ps axc`: every process, filtered to rows whose command equals `name`.
pub fn parse_ps_bsd(lines: &[String], name: &str) -> Lookup<ProcessId> {
    let mut rows = non_blank(lines);
    let Some(header) = rows.next() else {
        return Lookup::NotFound;
    };
    let (Some(pid_column), Some(command_column)) =
        (header_column(header, "PID"), header_column(header, "COMMAND"))
    else {
        return Lookup::NotFound;
    };

    let pids = rows.filter_map(|row| {
        let fields: Vec<&str> = row.split_whitespace().collect();
        let command = fields.get(command_column..)?.join(" ");
        if command == name {
            fields.get(pid_column).copied().and_then(ProcessId::parse)
        } else {
            None
        }
    });
    Lookup::from_candidates(pids)
}

/// `ps -A co command` (Linux) or `ps -ao ucomm=` (BSD): is `name` listed?
///
/// A `COMMAND` header line is skipped. Empty output is inconclusive.
pub fn parse_process_listing(lines: &[String], name: &str) -> Lookup<bool> {
    let mut rows = non_blank(lines).peekable();
    if rows.peek().is_none() {
        return Lookup::NotFound;
    }
    let listed = rows
        .filter(|row| *row != "COMMAND")
        .any(|row| row == name);
    Lookup::Found(listed)
}

/// `netstat -npltu`: TCP listeners on `port`, PID taken from `PID/Program name`.
pub fn parse_netstat(lines: &[String], port: Port) -> Lookup<ProcessId> {
    let pids = non_blank(lines).filter_map(|row| {
        let fields: Vec<&str> = row.split_whitespace().collect();
        // Program names may contain spaces (`812/sshd: /usr/sbin`)
        if fields.len() < 7 || !fields[0].starts_with("tcp") || fields[5] != "LISTEN" {
            return None;
        }
        if !port.matches_address(fields[3]) {
            return None;
        }
        let (pid, _program) = fields[6].split_once('/')?;
        ProcessId::parse(pid)
    });
    Lookup::from_candidates(pids)
}

/// `sockstat -4l -P tcp -p PORT`: `USER COMMAND PID FD PROTO LOCAL FOREIGN`.
///
/// Columns are counted from the right since COMMAND may contain spaces.
pub fn parse_sockstat(lines: &[String], port: Port) -> Lookup<ProcessId> {
    let pids = non_blank(lines).filter_map(|row| {
        let fields: Vec<&str> = row.split_whitespace().collect();
        let [_user, .., pid, _fd, _proto, local, _foreign] = fields.as_slice() else {
            return None;
        };
        if fields.len() < 7 || !port.matches_address(local) {
            return None;
        }
        ProcessId::parse(pid)
    });
    Lookup::from_candidates(pids)
}

/// `lsof -wnP -iTCP -sTCP:LISTEN`: rows ending in `ADDR:PORT (LISTEN)`.
pub fn parse_lsof_listen(lines: &[String], port: Port) -> Lookup<ProcessId> {
    let pids = non_blank(lines).filter_map(|row| {
        let fields: Vec<&str> = row.split_whitespace().collect();
        let [.., address, state] = fields.as_slice() else {
            return None;
        };
        if *state != "(LISTEN)" || !port.matches_address(address) {
            return None;
        }
        fields.get(1).copied().and_then(ProcessId::parse)
    });
    Lookup::from_candidates(pids)
}

/// `pwdx PID`: a single `PID: /path` line.
pub fn parse_pwdx(lines: &[String], pid: ProcessId) -> Lookup<PathBuf> {
    let mut rows = non_blank(lines);
    let (Some(line), None) = (rows.next(), rows.next()) else {
        return Lookup::NotFound;
    };
    if line.ends_with("No such process") {
        return Lookup::NotFound;
    }
    match line.split_once(": ") {
        Some((prefix, path)) if prefix.trim() == pid.to_string() && path.starts_with('/') => {
            Lookup::Found(PathBuf::from(path))
        }
        _ => Lookup::NotFound,
    }
}

/// `lsof -a -p PID -d cwd -Fn`: field output with `p<pid>` and `n<path>` lines.
pub fn parse_lsof_cwd(lines: &[String], pid: ProcessId) -> Lookup<PathBuf> {
    let mut seen_pid = false;
    for line in non_blank(lines) {
        if let Some(value) = line.strip_prefix('p') {
            if ProcessId::parse(value) != Some(pid) {
                return Lookup::NotFound;
            }
            seen_pid = true;
        } else if let Some(path) = line.strip_prefix('n') {
            if seen_pid && path.starts_with('/') {
                return Lookup::Found(PathBuf::from(path));
            }
            return Lookup::NotFound;
        }
    }
    Lookup::NotFound
}

/// `ps -p PID -o jid`: a `JID` header followed by one numeric row.
pub fn parse_jail_id(lines: &[String]) -> Lookup<JailId> {
    let rows: Vec<&str> = non_blank(lines).collect();
    match rows.as_slice() {
        [header, value] if header.trim() == "JID" => value.trim().parse::<JailId>().ok().into(),
        _ => Lookup::NotFound,
    }
}

fn non_blank(lines: &[String]) -> impl Iterator<Item = &str> {
    lines.iter().map(|line| line.trim()).filter(|line| !line.is_empty())
}

/// Index of `name` among the whitespace separated header fields.
///
/// Multi-word headers like `LOCAL ADDRESS` make this unreliable for columns
/// to their right, so callers only look up columns left of those.
fn header_column(header: &str, name: &str) -> Option<usize> {
    header.split_whitespace().position(|field| field == name)
}
