//! Command availability checks.
//!
//! Resolves bare executable names against the search path. Answers are
//! memoized per name for the lifetime of the locator since the search path
//! is not expected to change underneath a running process.

use std::collections::{HashMap, HashSet};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, trace};

/// Memoizing executable lookup.
#[derive(Debug, Default)]
pub struct ToolLocator {
    /// Search path override (None = the PATH environment variable).
    search_path: Option<OsString>,
    /// Tools reported as unavailable regardless of the filesystem.
    disabled: HashSet<String>,
    cache: Mutex<HashMap<String, Option<PathBuf>>>,
    scans: AtomicUsize,
}

impl ToolLocator {
    /// Locator over the process's PATH.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locator over an explicit search path (same syntax as PATH).
    pub fn with_search_path(search_path: impl Into<OsString>) -> Self {
        Self {
            search_path: Some(search_path.into()),
            ..Self::default()
        }
    }

    /// Treat the given tools as missing.
    pub fn with_disabled<I, S>(mut self, tools: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disabled.extend(tools.into_iter().map(Into::into));
        self
    }

    /// Whether `command` resolves to an executable.
    ///
    /// Only the first word is considered, so a full command line may be
    /// passed. Never fails: a missing PATH simply means nothing is available.
    pub fn is_available(&self, command: &str) -> bool {
        self.locate(command).is_some()
    }

    /// Resolve `command` to the executable that would run.
    pub fn locate(&self, command: &str) -> Option<PathBuf> {
        let name = command.split_whitespace().next()?;
        if self.disabled.contains(name) {
            trace!(tool = name, "tool disabled by configuration");
            return None;
        }

        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(name) {
            return cached.clone();
        }

        let resolved = self.scan(name);
        debug!(tool = name, path = ?resolved, "resolved tool availability");
        cache.insert(name.to_string(), resolved.clone());
        resolved
    }

    /// Number of filesystem scans performed so far.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    fn scan(&self, name: &str) -> Option<PathBuf> {
        self.scans.fetch_add(1, Ordering::SeqCst);

        if name.contains('/') {
            let path = Path::new(name);
            return is_executable(path).then(|| path.to_path_buf());
        }

        let search_path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os("PATH"))?;

        std::env::split_paths(&search_path)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(|dir| dir.join(name))
            .find(|candidate| is_executable(candidate))
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[cfg(unix)]
    fn make_tool(dir: &Path, name: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn test_finds_executable_in_search_path() {
        let dir = TempDir::new().unwrap();
        let tool = make_tool(dir.path(), "fake-pgrep", 0o755);

        let locator = ToolLocator::with_search_path(dir.path());
        assert!(locator.is_available("fake-pgrep"));
        assert_eq!(locator.locate("fake-pgrep"), Some(tool));
    }

    #[cfg(unix)]
    #[test]
    fn test_ignores_non_executable_files() {
        let dir = TempDir::new().unwrap();
        make_tool(dir.path(), "not-runnable", 0o644);

        let locator = ToolLocator::with_search_path(dir.path());
        assert!(!locator.is_available("not-runnable"));
    }

    #[cfg(unix)]
    #[test]
    fn test_ignores_directories() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("subdir")).unwrap();

        let locator = ToolLocator::with_search_path(dir.path());
        assert!(!locator.is_available("subdir"));
    }

    #[cfg(unix)]
    #[test]
    fn test_search_order_prefers_first_directory() {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        let expected = make_tool(first.path(), "dup", 0o755);
        make_tool(second.path(), "dup", 0o755);

        let joined = std::env::join_paths([first.path(), second.path()]).unwrap();
        let locator = ToolLocator::with_search_path(joined);
        assert_eq!(locator.locate("dup"), Some(expected));
    }

    #[cfg(unix)]
    #[test]
    fn test_memoizes_per_name() {
        let dir = TempDir::new().unwrap();
        make_tool(dir.path(), "cached", 0o755);

        let locator = ToolLocator::with_search_path(dir.path());
        assert!(locator.is_available("cached"));
        assert!(locator.is_available("cached"));
        assert_eq!(locator.scan_count(), 1);

        // Removing the file doesn't invalidate the cached answer
        fs::remove_file(dir.path().join("cached")).unwrap();
        assert!(locator.is_available("cached"));
        assert_eq!(locator.scan_count(), 1);

        assert!(!locator.is_available("missing"));
        assert!(!locator.is_available("missing"));
        assert_eq!(locator.scan_count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_accepts_full_command_line() {
        let dir = TempDir::new().unwrap();
        make_tool(dir.path(), "lsof", 0o755);

        let locator = ToolLocator::with_search_path(dir.path());
        assert!(locator.is_available("lsof -wnP -iTCP -sTCP:LISTEN"));
    }

    #[cfg(unix)]
    #[test]
    fn test_disabled_tools_are_unavailable() {
        let dir = TempDir::new().unwrap();
        make_tool(dir.path(), "netstat", 0o755);

        let locator = ToolLocator::with_search_path(dir.path()).with_disabled(["netstat"]);
        assert!(!locator.is_available("netstat"));
        assert_eq!(locator.scan_count(), 0);
    }

    #[test]
    fn test_empty_search_path() {
        let locator = ToolLocator::with_search_path("");
        assert!(!locator.is_available("sh"));
        assert!(!locator.is_available(""));
    }

    #[test]
    fn test_real_path() {
        let locator = ToolLocator::new();
        #[cfg(unix)]
        assert!(locator.is_available("sh"));
        assert!(!locator.is_available("blarg_and_stuff"));
    }
}
