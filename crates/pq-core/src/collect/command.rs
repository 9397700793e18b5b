//! Command lines and the runner seam.
//!
//! Discovery strategies build a [`CommandLine`] from a template and hand it
//! to a [`CommandRunner`]. The real implementation spawns the tool; tests
//! substitute canned output.

use super::tool_runner::ToolError;
use std::fmt;

/// A program plus its argument vector. Never interpreted by a shell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CommandLine {
    program: String,
    args: Vec<String>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Append one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Split a command line on whitespace. Returns None for a blank line.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program).args(words))
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    /// Whether the rendered command line begins with `prefix`.
    pub fn starts_with(&self, prefix: &str) -> bool {
        self.to_string().starts_with(prefix)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Runs a command and returns its standard output as lines.
///
/// Any failure (missing tool, non-zero exit, timeout) is an `Err`; callers
/// treat it the same as "no usable output".
pub trait CommandRunner {
    fn call(&self, command: &CommandLine) -> Result<Vec<String>, ToolError>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn call(&self, command: &CommandLine) -> Result<Vec<String>, ToolError> {
        (**self).call(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_trips_through_parse() {
        let command = CommandLine::new("lsof").args(["-a", "-p", "42", "-d", "cwd", "-Fn"]);
        assert_eq!(command.to_string(), "lsof -a -p 42 -d cwd -Fn");
        assert_eq!(CommandLine::parse(&command.to_string()), Some(command));
    }

    #[test]
    fn test_parse_collapses_whitespace() {
        let command = CommandLine::parse("  pgrep   -x\ttor ").unwrap();
        assert_eq!(command.program(), "pgrep");
        assert_eq!(command.argv(), ["-x", "tor"]);
        assert_eq!(CommandLine::parse(" \t "), None);
    }

    #[test]
    fn test_starts_with() {
        let command = CommandLine::new("lsof").args(["-a", "-p", "42"]);
        assert!(command.starts_with("lsof -a -p "));
        assert!(!command.starts_with("lsof -t"));
    }
}
