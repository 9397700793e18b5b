//! Test utilities for pq-core.
//!
//! This module provides test infrastructure including:
//! - A scripted command runner that replays canned tool output
//! - Fixture loading helpers for captured tool output
//! - A locator backed by a tempdir of fake executables

use crate::availability::ToolLocator;
use crate::collect::{CommandLine, CommandRunner, ToolError};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

// ============================================================================
// Scripted runner
// ============================================================================

#[derive(Debug, Clone)]
enum Reply {
    Lines(Vec<String>),
    Failure,
}

/// Replays canned output for commands matching a rendered prefix.
///
/// The first matching rule wins. Commands matching no rule fail the same way
/// a tool with no matches does (exit status 1). Every call is recorded.
///
/// ```ignore
/// let runner = ScriptedRunner::new()
///     .respond("pgrep -x tor", ["3283"])
///     .fail("pidof");
/// ```
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    rules: Vec<(String, Reply)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer commands starting with `prefix` with `lines`.
    pub fn respond<I, S>(mut self, prefix: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let lines = lines.into_iter().map(Into::into).collect();
        self.rules.push((prefix.to_string(), Reply::Lines(lines)));
        self
    }

    /// Answer commands starting with `prefix` with the lines of `text`.
    pub fn respond_text(self, prefix: &str, text: &str) -> Self {
        self.respond(prefix, text.lines())
    }

    /// Fail commands starting with `prefix`.
    pub fn fail(mut self, prefix: &str) -> Self {
        self.rules.push((prefix.to_string(), Reply::Failure));
        self
    }

    /// Rendered command lines run so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn call(&self, command: &CommandLine) -> Result<Vec<String>, ToolError> {
        let rendered = command.to_string();
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rendered.clone());

        let reply = self
            .rules
            .iter()
            .find(|(prefix, _)| rendered.starts_with(prefix.as_str()))
            .map(|(_, reply)| reply);
        match reply {
            Some(Reply::Lines(lines)) => Ok(lines.clone()),
            Some(Reply::Failure) | None => Err(ToolError::NonZeroExit { code: 1 }),
        }
    }
}

// ============================================================================
// Fake tools
// ============================================================================

/// A search path containing empty executables with the given names.
///
/// Keep the returned guard alive for as long as the locator is used.
#[cfg(unix)]
pub fn fake_toolbox(tools: &[&str]) -> std::io::Result<(tempfile::TempDir, ToolLocator)> {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::TempDir::new()?;
    for tool in tools {
        let path = dir.path().join(tool);
        std::fs::write(&path, "#!/bin/sh\nexit 1\n")?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))?;
    }
    let locator = ToolLocator::with_search_path(dir.path());
    Ok((dir, locator))
}

// ============================================================================
// Fixtures
// ============================================================================

/// Fixture directory relative to crate root.
pub const FIXTURES_DIR: &str = "tests/fixtures";

/// Get the path to a test fixture file.
pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join(FIXTURES_DIR)
        .join(name)
}

/// Load a captured tool output as lines.
pub fn fixture_lines(name: &str) -> std::io::Result<Vec<String>> {
    let text = std::fs::read_to_string(fixture_path(name))?;
    Ok(text.lines().map(str::to_string).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_runner_prefix_match() {
        let runner = ScriptedRunner::new()
            .respond("pgrep -x tor", ["3283"])
            .fail("pidof");

        let pgrep = CommandLine::new("pgrep").args(["-x", "tor"]);
        assert_eq!(runner.call(&pgrep).unwrap(), ["3283"]);

        let pidof = CommandLine::new("pidof").arg("tor");
        assert!(runner.call(&pidof).is_err());

        let unscripted = CommandLine::new("lsof").arg("-t");
        assert!(matches!(
            runner.call(&unscripted),
            Err(ToolError::NonZeroExit { code: 1 })
        ));

        assert_eq!(runner.calls(), ["pgrep -x tor", "pidof tor", "lsof -t"]);
    }

    #[test]
    fn test_first_rule_wins() {
        let runner = ScriptedRunner::new()
            .respond("ps -p 1", ["JID", "3"])
            .respond("ps", ["other"]);
        let command = CommandLine::new("ps").args(["-p", "1", "-o", "jid"]);
        assert_eq!(runner.call(&command).unwrap(), ["JID", "3"]);
    }

    #[test]
    fn test_respond_text() {
        let runner = ScriptedRunner::new().respond_text("pwdx", "42: /srv\n");
        let command = CommandLine::new("pwdx").arg("42");
        assert_eq!(runner.call(&command).unwrap(), ["42: /srv"]);
    }

    #[test]
    fn test_fixtures_present() {
        let lines = fixture_lines("netstat_npltu.txt").unwrap();
        assert!(lines.iter().any(|l| l.contains("LISTEN")));
    }

    #[cfg(unix)]
    #[test]
    fn test_fake_toolbox() {
        let (_guard, locator) = fake_toolbox(&["pwdx"]).unwrap();
        assert!(locator.is_available("pwdx"));
        assert!(!locator.is_available("pgrep"));
    }
}
