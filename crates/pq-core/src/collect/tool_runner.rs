//! Spawning the lookup tools.
//!
//! [`ToolRunner`] is the [`CommandRunner`] used outside tests. Each call
//! spawns one tool with a scrubbed environment (`LC_ALL=C`, so headers and
//! error strings are the ones the parsers expect), drains stdout and stderr
//! into bounded buffers until the tool exits or its deadline passes, and
//! hands back the stdout lines.
//!
//! A tool still running at the deadline gets SIGTERM, then SIGKILL once a
//! short grace period runs out.

use super::command::{CommandLine, CommandRunner};
use crate::logging::truncate_for_log;
use std::io::{self, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument, trace, warn};

/// Default timeout per command in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default cap on captured bytes per stream (1MB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

const TERM_GRACE: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Why a tool produced no usable output.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command failed to spawn: {0}")]
    SpawnFailed(String),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("command exited with non-zero status: {code}")]
    NonZeroExit { code: i32 },

    #[error("command killed by signal")]
    KilledBySignal,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

/// Everything a finished (or abandoned) tool left behind.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit status; `None` when a signal ended the tool.
    pub status: Option<i32>,
    pub elapsed: Duration,
    pub timed_out: bool,
    /// Either stream hit the byte cap.
    pub truncated: bool,
}

impl ToolOutput {
    /// Stdout lines of a clean exit, or the reason there are none.
    pub fn into_lines(self) -> Result<Vec<String>, ToolError> {
        if self.timed_out {
            return Err(ToolError::Timeout(self.elapsed));
        }
        match self.status {
            Some(0) => Ok(split_lines(&String::from_utf8_lossy(&self.stdout))),
            Some(code) => Err(ToolError::NonZeroExit { code }),
            None => Err(ToolError::KilledBySignal),
        }
    }
}

/// Split captured text into lines, dropping trailing blank lines.
pub fn split_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = text.lines().map(String::from).collect();
    let keep = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .map_or(0, |last| last + 1);
    lines.truncate(keep);
    lines
}

/// Limits and environment for spawned tools.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub default_timeout: Duration,
    pub max_output_bytes: usize,
    /// Run tools under `nice -n nice_value`.
    pub use_nice: bool,
    pub nice_value: i32,
    /// PATH handed to tools; `None` inherits ours.
    pub search_path: Option<String>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            use_nice: false,
            nice_value: 10,
            search_path: None,
        }
    }
}

/// Runs tools for real, one at a time.
#[derive(Debug, Clone, Default)]
pub struct ToolRunner {
    config: ToolConfig,
}

impl ToolRunner {
    pub fn new(config: ToolConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = timeout;
        self
    }

    pub fn with_max_output(mut self, bytes: usize) -> Self {
        self.config.max_output_bytes = bytes;
        self
    }

    pub fn config(&self) -> &ToolConfig {
        &self.config
    }

    /// Spawn `command` and collect its output.
    ///
    /// A non-zero exit is not an error here; see [`ToolOutput::into_lines`].
    #[instrument(level = "debug", skip(self), fields(command = %command))]
    pub fn run(&self, command: &CommandLine) -> Result<ToolOutput, ToolError> {
        check_program(command.program())?;

        let started = Instant::now();
        let mut child = self
            .command(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ToolError::CommandNotFound(command.program().to_string()),
                _ => ToolError::SpawnFailed(e.to_string()),
            })?;

        let mut capture = match Capture::new(&mut child, self.config.max_output_bytes) {
            Ok(capture) => capture,
            Err(e) => {
                terminate(&mut child);
                return Err(e.into());
            }
        };

        let deadline = started + self.config.default_timeout;
        let status = loop {
            let progressed = capture.pump();
            if let Some(status) = child.try_wait()? {
                // Whatever is still buffered in the pipes
                capture.pump();
                break Some(status);
            }
            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = self.config.default_timeout.as_millis() as u64,
                    "tool timed out, terminating"
                );
                terminate(&mut child);
                break None;
            }
            if !progressed {
                thread::sleep(POLL_INTERVAL);
            }
        };

        let output = ToolOutput {
            stdout: capture.out,
            stderr: capture.err,
            status: status.and_then(|s| s.code()),
            elapsed: started.elapsed(),
            timed_out: status.is_none(),
            truncated: capture.truncated,
        };
        debug!(
            status = ?output.status,
            elapsed_ms = output.elapsed.as_millis() as u64,
            stdout_bytes = output.stdout.len(),
            "tool finished"
        );
        Ok(output)
    }

    /// Run a whitespace separated command line, e.g. `"pgrep -x tor"`.
    ///
    /// No shell is involved; quoting is not interpreted.
    pub fn call_lines(&self, command_line: &str) -> Result<Vec<String>, ToolError> {
        let command = CommandLine::parse(command_line)
            .ok_or_else(|| ToolError::InvalidCommand("empty command line".to_string()))?;
        self.call(&command)
    }

    fn command(&self, command: &CommandLine) -> Command {
        let mut cmd = if self.config.use_nice && cfg!(unix) {
            let mut nice = Command::new("nice");
            nice.arg("-n")
                .arg(self.config.nice_value.to_string())
                .arg(command.program());
            nice
        } else {
            Command::new(command.program())
        };
        cmd.args(command.argv())
            .env_clear()
            .env("LC_ALL", "C")
            .env("LANG", "C");

        // Also the PATH the program itself is resolved against
        let path = self
            .config
            .search_path
            .clone()
            .or_else(|| std::env::var("PATH").ok());
        if let Some(path) = path {
            cmd.env("PATH", path);
        }
        cmd
    }
}

impl CommandRunner for ToolRunner {
    fn call(&self, command: &CommandLine) -> Result<Vec<String>, ToolError> {
        let output = self.run(command)?;
        if output.truncated {
            debug!(command = %command, limit = self.config.max_output_bytes, "tool output truncated");
        }
        if output.status != Some(0) && !output.stderr.is_empty() {
            trace!(
                command = %command,
                stderr = %truncate_for_log(String::from_utf8_lossy(&output.stderr).trim(), 256),
                "tool stderr"
            );
        }
        output.into_lines()
    }
}

/// Program names go straight to exec, but a shell-looking name is a bug.
fn check_program(program: &str) -> Result<(), ToolError> {
    if program.is_empty() {
        return Err(ToolError::InvalidCommand("empty program name".to_string()));
    }
    if program.contains(['|', '&', ';', '$', '`', '<', '>', '\n', '\r', ' ', '\t']) {
        return Err(ToolError::InvalidCommand(format!(
            "program name contains shell metacharacters: {program:?}"
        )));
    }
    Ok(())
}

/// Bounded buffers fed from a child's stdout and stderr.
///
/// The pipes are switched to non-blocking once up front, so a grandchild
/// that inherited them can never stall the read after the tool exits.
struct Capture {
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    out: Vec<u8>,
    err: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl Capture {
    fn new(child: &mut Child, limit: usize) -> io::Result<Self> {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        #[cfg(unix)]
        {
            if let Some(pipe) = &stdout {
                set_nonblocking(pipe)?;
            }
            if let Some(pipe) = &stderr {
                set_nonblocking(pipe)?;
            }
        }
        Ok(Self {
            stdout,
            stderr,
            out: Vec::new(),
            err: Vec::new(),
            limit,
            truncated: false,
        })
    }

    /// Read whatever is ready on both pipes. True when any bytes arrived.
    fn pump(&mut self) -> bool {
        let mut chunk = [0u8; 8192];
        let from_out = pump_pipe(
            &mut self.stdout,
            &mut self.out,
            self.limit,
            &mut self.truncated,
            &mut chunk,
        );
        let from_err = pump_pipe(
            &mut self.stderr,
            &mut self.err,
            self.limit,
            &mut self.truncated,
            &mut chunk,
        );
        from_out || from_err
    }
}

fn pump_pipe<R: Read>(
    pipe: &mut Option<R>,
    buf: &mut Vec<u8>,
    limit: usize,
    truncated: &mut bool,
    chunk: &mut [u8],
) -> bool {
    let Some(reader) = pipe.as_mut() else {
        return false;
    };
    let mut progressed = false;
    let mut closed = false;
    loop {
        match reader.read(chunk) {
            Ok(0) => {
                closed = true;
                break;
            }
            Ok(n) => {
                progressed = true;
                keep_capped(buf, &chunk[..n], limit, truncated);
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                trace!(error = %e, "pipe read failed");
                closed = true;
                break;
            }
        }
    }
    if closed {
        *pipe = None;
    }
    progressed
}

/// Append up to the cap; bytes past it are read and dropped so the tool
/// never blocks on a full pipe.
fn keep_capped(buf: &mut Vec<u8>, data: &[u8], limit: usize, truncated: &mut bool) {
    let room = limit.saturating_sub(buf.len());
    if data.len() > room {
        *truncated = true;
    }
    buf.extend_from_slice(&data[..data.len().min(room)]);
}

#[cfg(unix)]
fn set_nonblocking(pipe: &impl std::os::fd::AsRawFd) -> io::Result<()> {
    let fd = pipe.as_raw_fd();
    // SAFETY: fcntl on a descriptor owned by this process; no memory is passed
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: as above
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// SIGTERM, a grace period, then SIGKILL. Always reaps the child.
#[cfg(unix)]
fn terminate(child: &mut Child) {
    let pid = child.id() as libc::pid_t;
    // SAFETY: pid is our own child and has not been reaped yet
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }

    let grace_ends = Instant::now() + TERM_GRACE;
    while Instant::now() < grace_ends {
        if matches!(child.try_wait(), Ok(Some(_)) | Err(_)) {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }

    debug!(pid, "tool ignored SIGTERM, sending SIGKILL");
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(not(unix))]
fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandLine {
        CommandLine::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn test_echo_lines() {
        let runner = ToolRunner::with_defaults();
        let lines = runner.call(&CommandLine::new("echo").args(["3283", "3281"])).unwrap();
        assert_eq!(lines, vec!["3283 3281"]);
    }

    #[test]
    fn test_trailing_blank_lines_dropped() {
        let runner = ToolRunner::with_defaults();
        let lines = runner.call(&sh("printf '  PID\\n 3283\\n\\n  \\n'")).unwrap();
        assert_eq!(lines, vec!["  PID", " 3283"]);
    }

    #[test]
    fn test_stderr_is_not_output() {
        let runner = ToolRunner::with_defaults();
        let output = runner.run(&sh("echo 'No such process' >&2")).unwrap();
        assert_eq!(output.stderr, b"No such process\n");
        assert_eq!(output.into_lines().unwrap(), Vec::<String>::new());
    }

    #[test]
    fn test_nonzero_exit() {
        let runner = ToolRunner::with_defaults();
        match runner.call(&sh("echo 1641; exit 3")) {
            Err(ToolError::NonZeroExit { code: 3 }) => {}
            other => panic!("expected NonZeroExit, got {other:?}"),
        }
    }

    #[test]
    fn test_killed_by_signal() {
        let runner = ToolRunner::with_defaults();
        assert!(matches!(
            runner.call(&sh("kill -9 $$")),
            Err(ToolError::KilledBySignal)
        ));
    }

    #[test]
    fn test_missing_program() {
        let runner = ToolRunner::with_defaults();
        assert!(matches!(
            runner.call(&CommandLine::new("blarg_and_stuff")),
            Err(ToolError::CommandNotFound(_))
        ));
        assert!(matches!(
            runner.call(&CommandLine::new("/nonexistent/pgrep")),
            Err(ToolError::CommandNotFound(_))
        ));
    }

    #[test]
    fn test_call_lines() {
        let runner = ToolRunner::with_defaults();
        assert_eq!(runner.call_lines("echo  3283   3281").unwrap(), vec!["3283 3281"]);
        assert!(matches!(runner.call_lines("   "), Err(ToolError::InvalidCommand(_))));
        assert!(matches!(
            runner.call_lines("blarg_and_stuff --help"),
            Err(ToolError::CommandNotFound(_))
        ));
    }

    #[test]
    fn test_shell_metacharacters_rejected() {
        let runner = ToolRunner::with_defaults();
        for program in ["ps; rm -rf /", "ps|cat", "$(ps)", ""] {
            assert!(
                matches!(
                    runner.call(&CommandLine::new(program)),
                    Err(ToolError::InvalidCommand(_))
                ),
                "{program:?}"
            );
        }
    }

    #[test]
    fn test_timeout_terminates_tool() {
        let runner = ToolRunner::with_defaults().with_timeout(Duration::from_millis(100));
        let started = Instant::now();
        let output = runner.run(&CommandLine::new("sleep").arg("10")).unwrap();

        assert!(output.timed_out);
        assert!(started.elapsed() < Duration::from_secs(3));
        assert!(matches!(output.into_lines(), Err(ToolError::Timeout(_))));
    }

    #[test]
    fn test_output_capped() {
        let runner = ToolRunner::with_defaults().with_max_output(100);
        let output = runner.run(&sh("yes | head -n 1000")).unwrap();

        assert!(output.truncated);
        assert_eq!(output.stdout.len(), 100);
        assert_eq!(output.status, Some(0));
    }

    #[test]
    fn test_environment_scrubbed() {
        let runner = ToolRunner::with_defaults();
        let lines = runner.call(&sh("echo \"$LC_ALL:$HOME\"")).unwrap();
        assert_eq!(lines, vec!["C:"]);
    }

    #[test]
    fn test_search_path_used_for_lookup() {
        let runner = ToolRunner::new(ToolConfig {
            search_path: Some("/nonexistent".to_string()),
            ..ToolConfig::default()
        });
        assert!(matches!(
            runner.call(&CommandLine::new("sh").arg("-c").arg("true")),
            Err(ToolError::CommandNotFound(_))
        ));
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(split_lines(""), Vec::<String>::new());
        assert_eq!(split_lines("a\r\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\nb\n  \n\n"), vec!["a", "", "b"]);
    }

    #[test]
    fn test_config_defaults() {
        let config = ToolConfig::default();
        assert_eq!(config.default_timeout, Duration::from_millis(DEFAULT_TIMEOUT_MS));
        assert_eq!(config.max_output_bytes, DEFAULT_MAX_OUTPUT_BYTES);
        assert!(!config.use_nice);
        assert!(config.search_path.is_none());
    }
}
