//! Process facts gathered from system tools.
//!
//! [`SystemProbe`] owns everything a lookup needs: the command runner, the
//! memoized tool locator, and the platform classification. Probes are
//! `Send + Sync`; share one by reference rather than building one per call.
//!
//! ```ignore
//! let probe = SystemProbe::new();
//! match probe.get_pid_by_name("tor") {
//!     Lookup::Found(pid) => println!("tor is {pid}"),
//!     Lookup::Ambiguous(pids) => println!("{} tor processes", pids.len()),
//!     Lookup::NotFound => println!("tor isn't running"),
//! }
//! ```

use crate::availability::ToolLocator;
use crate::collect::{CommandLine, CommandRunner, ToolError, ToolRunner};
use crate::config::ProbeConfig;
use crate::platform;
use crate::strategy::{self, Attempt, Dispatcher, Strategy};
use pq_common::{Error, JailId, Lookup, PlatformKind, Port, ProcessId, Result};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, instrument};

/// Entry point for process lookups.
#[derive(Debug)]
pub struct SystemProbe<R = ToolRunner> {
    runner: R,
    locator: ToolLocator,
    kernel: OnceLock<String>,
    platform: OnceLock<PlatformKind>,
}

impl SystemProbe<ToolRunner> {
    /// Probe with default runner settings over the process's PATH.
    pub fn new() -> Self {
        Self::with_runner(ToolRunner::with_defaults())
    }

    /// Probe configured from a loaded [`ProbeConfig`].
    pub fn from_config(config: &ProbeConfig) -> Self {
        let probe = Self::with_runner(ToolRunner::new(config.tool_config()))
            .with_locator(config.locator());
        match config.platform {
            Some(platform) => probe.with_platform(platform),
            None => probe,
        }
    }
}

impl Default for SystemProbe<ToolRunner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: CommandRunner> SystemProbe<R> {
    /// Probe running commands through `runner`.
    pub fn with_runner(runner: R) -> Self {
        Self {
            runner,
            locator: ToolLocator::new(),
            kernel: OnceLock::new(),
            platform: OnceLock::new(),
        }
    }

    /// Replace the availability checker.
    pub fn with_locator(mut self, locator: ToolLocator) -> Self {
        self.locator = locator;
        self
    }

    /// Skip kernel detection and parse output as `platform` would print it.
    pub fn with_platform(self, platform: PlatformKind) -> Self {
        let fixed = OnceLock::new();
        let _ = fixed.set(platform);
        Self {
            platform: fixed,
            ..self
        }
    }

    /// Use `kernel` in place of the host's `uname` sysname.
    pub fn with_kernel_name(self, kernel: &str) -> Self {
        let fixed = OnceLock::new();
        let _ = fixed.set(kernel.to_string());
        Self {
            kernel: fixed,
            ..self
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn locator(&self) -> &ToolLocator {
        &self.locator
    }

    /// Kernel sysname, read from `uname` on first use.
    pub fn kernel_name(&self) -> &str {
        self.kernel.get_or_init(platform::kernel_name)
    }

    /// Platform classification, detected on first use.
    pub fn platform(&self) -> PlatformKind {
        *self
            .platform
            .get_or_init(|| platform::classify(self.kernel_name()))
    }

    pub fn is_bsd(&self) -> bool {
        self.platform().is_bsd()
    }

    pub fn is_mac(&self) -> bool {
        platform::is_mac_kernel(self.kernel_name())
    }

    /// Whether `command` (or the first word of a command line) is installed.
    pub fn is_available(&self, command: &str) -> bool {
        self.locator.is_available(command)
    }

    fn dispatcher(&self) -> Dispatcher<'_, R> {
        Dispatcher::new(self.platform(), &self.locator, &self.runner)
    }

    fn dispatch<Q: ?Sized, T>(&self, strategies: &[Strategy<Q, T>], query: &Q) -> Lookup<T> {
        self.dispatcher().dispatch(strategies, query)
    }

    /// PID of the process whose command name is exactly `name`.
    #[instrument(level = "debug", skip(self))]
    pub fn get_pid_by_name(&self, name: &str) -> Lookup<ProcessId> {
        if name.trim().is_empty() {
            return Lookup::NotFound;
        }
        self.dispatch(strategy::PID_BY_NAME, name)
    }

    /// [`get_pid_by_name`](Self::get_pid_by_name) plus the strategies tried.
    pub fn get_pid_by_name_traced(&self, name: &str) -> (Lookup<ProcessId>, Vec<Attempt>) {
        if name.trim().is_empty() {
            return (Lookup::NotFound, Vec::new());
        }
        self.dispatcher().dispatch_with_trace(strategy::PID_BY_NAME, name)
    }

    /// PID of the process listening on TCP `port`.
    #[instrument(level = "debug", skip(self))]
    pub fn get_pid_by_port(&self, port: Port) -> Lookup<ProcessId> {
        if port.0 == 0 {
            return Lookup::NotFound;
        }
        self.dispatch(strategy::PID_BY_PORT, &port)
    }

    pub fn get_pid_by_port_traced(&self, port: Port) -> (Lookup<ProcessId>, Vec<Attempt>) {
        if port.0 == 0 {
            return (Lookup::NotFound, Vec::new());
        }
        self.dispatcher().dispatch_with_trace(strategy::PID_BY_PORT, &port)
    }

    /// PID of the process holding `path` open.
    #[instrument(level = "debug", skip(self))]
    pub fn get_pid_by_open_file(&self, path: &Path) -> Lookup<ProcessId> {
        let Some(path) = path.to_str().filter(|p| !p.is_empty()) else {
            return Lookup::NotFound;
        };
        self.dispatch(strategy::PID_BY_OPEN_FILE, path)
    }

    /// Current working directory of `pid`.
    ///
    /// Our own directory is read directly rather than through a tool.
    #[instrument(level = "debug", skip(self))]
    pub fn get_cwd(&self, pid: ProcessId) -> Option<PathBuf> {
        if pid == ProcessId::current() {
            return std::env::current_dir().ok();
        }
        self.dispatch(strategy::CWD, &pid).found()
    }

    /// FreeBSD jail `pid` runs in; 0 when unjailed, unknown, or not on a BSD.
    #[instrument(level = "debug", skip(self))]
    pub fn get_bsd_jail_id(&self, pid: ProcessId) -> JailId {
        if !self.is_bsd() {
            debug!("jail ids only exist on bsd platforms");
            return 0;
        }
        self.dispatch(strategy::JAIL_ID, &pid).found().unwrap_or(0)
    }

    /// Whether a process with command name `name` is running.
    ///
    /// `None` when no process listing could be obtained.
    #[instrument(level = "debug", skip(self))]
    pub fn is_running(&self, name: &str) -> Option<bool> {
        self.dispatch(strategy::IS_RUNNING, name).found()
    }

    /// Run an arbitrary command line, returning its stdout lines.
    pub fn try_call(&self, command_line: &str) -> Result<Vec<String>> {
        let command = CommandLine::parse(command_line)
            .ok_or_else(|| Error::InvalidArgument("empty command line".into()))?;
        if !self.locator.is_available(command.program()) {
            return Err(Error::ToolUnavailable(command.program().to_string()));
        }
        self.runner.call(&command).map_err(|e| match e {
            ToolError::CommandNotFound(program) => Error::ToolUnavailable(program),
            ToolError::InvalidCommand(reason) => Error::InvalidArgument(reason),
            other => Error::ExecutionFailure(format!("{}: {}", command, other)),
        })
    }

    /// Like [`try_call`](Self::try_call), with any failure as `None`.
    pub fn call(&self, command_line: &str) -> Option<Vec<String>> {
        match self.try_call(command_line) {
            Ok(lines) => Some(lines),
            Err(e) => {
                debug!(command = command_line, error = %e, "call failed");
                None
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::{fake_toolbox, ScriptedRunner};

    fn pid(n: u32) -> ProcessId {
        ProcessId::new(n).unwrap()
    }

    fn make_probe(
        tools: &[&str],
        platform: PlatformKind,
        runner: ScriptedRunner,
    ) -> (tempfile::TempDir, SystemProbe<ScriptedRunner>) {
        let (dir, locator) = fake_toolbox(tools).unwrap();
        let probe = SystemProbe::with_runner(runner)
            .with_locator(locator)
            .with_platform(platform);
        (dir, probe)
    }

    #[test]
    fn test_probe_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SystemProbe>();
        assert_send_sync::<SystemProbe<ScriptedRunner>>();
    }

    #[test]
    fn test_platform_is_detected_once() {
        let probe = SystemProbe::with_runner(ScriptedRunner::new());
        let first = probe.platform();
        assert_eq!(probe.platform(), first);
        assert_eq!(probe.is_bsd(), first.is_bsd());
    }

    #[test]
    fn test_kernel_name_drives_platform() {
        let probe = SystemProbe::with_runner(ScriptedRunner::new()).with_kernel_name("Darwin");
        assert!(probe.is_mac());
        assert!(probe.is_bsd());

        let probe = SystemProbe::with_runner(ScriptedRunner::new()).with_kernel_name("FreeBSD");
        assert!(!probe.is_mac());
        assert!(probe.is_bsd());

        let probe = SystemProbe::with_runner(ScriptedRunner::new()).with_kernel_name("Linux");
        assert!(!probe.is_mac());
        assert_eq!(probe.platform(), PlatformKind::LinuxLike);
    }

    #[test]
    fn test_kernel_name_read_once() {
        let probe = SystemProbe::with_runner(ScriptedRunner::new());
        let first = probe.kernel_name();
        assert!(std::ptr::eq(first, probe.kernel_name()));
        assert_eq!(probe.is_mac(), cfg!(target_os = "macos"));
        assert!(probe.runner().calls().is_empty());
    }

    #[test]
    fn test_forced_platform() {
        let probe = SystemProbe::with_runner(ScriptedRunner::new()).with_platform(PlatformKind::BsdLike);
        assert!(probe.is_bsd());
    }

    #[test]
    fn test_pid_by_name() {
        let runner = ScriptedRunner::new().respond("pgrep -x tor", ["3283"]);
        let (_dir, probe) = make_probe(&["pgrep"], PlatformKind::LinuxLike, runner);
        assert_eq!(probe.get_pid_by_name("tor"), Lookup::Found(pid(3283)));
        assert_eq!(probe.get_pid_by_name("  "), Lookup::NotFound);
    }

    #[test]
    fn test_pid_by_port_zero_runs_nothing() {
        let (_dir, probe) = make_probe(&["netstat", "lsof"], PlatformKind::LinuxLike, ScriptedRunner::new());
        assert_eq!(probe.get_pid_by_port(Port(0)), Lookup::NotFound);
        assert!(probe.runner().calls().is_empty());
    }

    #[test]
    fn test_pid_by_open_file() {
        let runner = ScriptedRunner::new().respond("lsof -tw /var/run/tor.pid", ["1745"]);
        let (_dir, probe) = make_probe(&["lsof"], PlatformKind::LinuxLike, runner);
        assert_eq!(
            probe.get_pid_by_open_file(Path::new("/var/run/tor.pid")),
            Lookup::Found(pid(1745))
        );
    }

    #[test]
    fn test_cwd_of_self_runs_nothing() {
        let (_dir, probe) = make_probe(&["pwdx", "lsof"], PlatformKind::LinuxLike, ScriptedRunner::new());
        assert_eq!(
            probe.get_cwd(ProcessId::current()),
            Some(std::env::current_dir().unwrap())
        );
        assert!(probe.runner().calls().is_empty());
    }

    #[test]
    fn test_cwd_of_other_process() {
        let runner = ScriptedRunner::new().respond("pwdx 3799", ["3799: /home/atagar"]);
        let (_dir, probe) = make_probe(&["pwdx"], PlatformKind::LinuxLike, runner);
        assert_eq!(probe.get_cwd(pid(3799)), Some(PathBuf::from("/home/atagar")));
        assert_eq!(probe.get_cwd(pid(3800)), None);
    }

    #[test]
    fn test_jail_id() {
        let runner = ScriptedRunner::new()
            .respond("ps -p 3799 -o jid", ["JID", "  3"])
            .respond("ps -p 4000 -o jid", ["JID"]);
        let (_dir, bsd) = make_probe(&["ps"], PlatformKind::BsdLike, runner);
        assert_eq!(bsd.get_bsd_jail_id(pid(3799)), 3);
        assert_eq!(bsd.get_bsd_jail_id(pid(4000)), 0);

        let (_dir, linux) = make_probe(&["ps"], PlatformKind::LinuxLike, ScriptedRunner::new());
        assert_eq!(linux.get_bsd_jail_id(pid(3799)), 0);
        assert!(linux.runner().calls().is_empty());
    }

    #[test]
    fn test_is_running() {
        let runner = ScriptedRunner::new().respond("ps -A co command", ["COMMAND", "init", "tor"]);
        let (_dir, probe) = make_probe(&["ps"], PlatformKind::LinuxLike, runner);
        assert_eq!(probe.is_running("tor"), Some(true));
        assert_eq!(probe.is_running("blarg_and_stuff"), Some(false));

        let (_dir, no_ps) = make_probe(&[], PlatformKind::LinuxLike, ScriptedRunner::new());
        assert_eq!(no_ps.is_running("tor"), None);
    }

    #[test]
    fn test_call() {
        let runner = ScriptedRunner::new().respond("uptime", ["up 3 days"]);
        let (_dir, probe) = make_probe(&["uptime", "false"], PlatformKind::LinuxLike, runner);
        assert_eq!(probe.call("uptime"), Some(vec!["up 3 days".to_string()]));
        assert_eq!(probe.call("false"), None);
        assert!(matches!(probe.try_call("   "), Err(Error::InvalidArgument(_))));
        assert!(matches!(probe.try_call("missing-tool -x"), Err(Error::ToolUnavailable(_))));
        assert!(matches!(probe.try_call("false"), Err(Error::ExecutionFailure(_))));
    }

    #[test]
    fn test_traced_lookup() {
        let runner = ScriptedRunner::new().respond("lsof -wnP", [
            "COMMAND  PID   USER   FD   TYPE DEVICE SIZE/OFF NODE NAME",
            "tor     1745 atagar    6u  IPv4  14229      0t0  TCP 127.0.0.1:9051 (LISTEN)",
        ]);
        let (_dir, probe) = make_probe(&["lsof"], PlatformKind::LinuxLike, runner);
        let (result, attempts) = probe.get_pid_by_port_traced(Port(9051));
        assert_eq!(result, Lookup::Found(pid(1745)));
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].tool, strategy::Tool::Netstat);
        assert_eq!(attempts[1].command, "lsof -wnP -iTCP -sTCP:LISTEN");
    }
}
