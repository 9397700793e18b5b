//! Logging configuration.
//!
//! Supports configuration via:
//! - Environment variables (PQ_LOG, RUST_LOG, PQ_LOG_FORMAT)
//! - CLI flags (-v/-q, --log-format)

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::filter::LevelFilter;

/// Log output format on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    Jsonl,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Human => "human",
            LogFormat::Jsonl => "jsonl",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.to_ascii_lowercase().as_str() {
            "human" | "text" => LogFormat::Human,
            "jsonl" | "json" => LogFormat::Jsonl,
            _ => return Err(format!("unknown log format {s:?} (expected human or jsonl)")),
        };
        Ok(format)
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log level, most verbose first so `min` picks the chattiest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Off,
}

/// Accepted spellings, canonical name first for each level.
const LEVEL_NAMES: &[(&str, LogLevel)] = &[
    ("trace", LogLevel::Trace),
    ("debug", LogLevel::Debug),
    ("info", LogLevel::Info),
    ("warn", LogLevel::Warn),
    ("warning", LogLevel::Warn),
    ("error", LogLevel::Error),
    ("off", LogLevel::Off),
    ("none", LogLevel::Off),
];

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        LEVEL_NAMES
            .iter()
            .find(|(_, level)| *level == self)
            .map_or("off", |(name, _)| *name)
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LEVEL_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|(_, level)| *level)
            .ok_or_else(|| format!("unknown log level {s:?}"))
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Off => LevelFilter::OFF,
        }
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    pub format: LogFormat,
    pub level: LogLevel,
    /// Level came from a CLI flag or PQ_LOG, so RUST_LOG must not replace it.
    pub level_explicit: bool,
    /// Prefix human output with timestamps.
    pub timestamps: bool,
}

impl LogConfig {
    /// Create config from the process environment and CLI overrides.
    pub fn from_env(cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self {
        Self::from_lookup(|key| std::env::var(key).ok(), cli_level, cli_format)
    }

    /// Create config from an arbitrary variable source.
    ///
    /// PQ_LOG takes precedence over RUST_LOG; CLI values win over both.
    pub fn from_lookup<F>(lookup: F, cli_level: Option<LogLevel>, cli_format: Option<LogFormat>) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Unparseable values fall through to the default
        let pq_level = lookup("PQ_LOG").and_then(|value| value.parse().ok());
        let explicit = cli_level.or(pq_level);
        let rust_level = lookup("RUST_LOG").and_then(|value| level_from_directives(&value));
        let env_format = lookup("PQ_LOG_FORMAT").and_then(|value| value.parse().ok());

        LogConfig {
            level: explicit.or(rust_level).unwrap_or_default(),
            level_explicit: explicit.is_some(),
            format: cli_format.or(env_format).unwrap_or_default(),
            timestamps: false,
        }
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self.level_explicit = true;
        self
    }

    pub fn with_timestamps(mut self, enabled: bool) -> Self {
        self.timestamps = enabled;
        self
    }

    /// Filter directive for `level` alone.
    pub fn directive(&self) -> String {
        format!("pq_core={}", self.level)
    }

    /// Directives for the subscriber's filter, given the RUST_LOG value.
    ///
    /// RUST_LOG is used verbatim only when no explicit level was chosen.
    pub fn filter_directives(&self, rust_log: Option<&str>) -> String {
        match rust_log.map(str::trim) {
            Some(directives) if !self.level_explicit && !directives.is_empty() => {
                directives.to_string()
            }
            _ => self.directive(),
        }
    }
}

/// Most verbose level named in a RUST_LOG style directive list.
fn level_from_directives(directives: &str) -> Option<LogLevel> {
    directives
        .split(',')
        .filter_map(|directive| {
            let level = directive.rsplit_once('=').map_or(directive, |(_, level)| level);
            level.trim().parse::<LogLevel>().ok()
        })
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("human".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert_eq!("jsonl".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Jsonl);
        assert_eq!(LogFormat::Jsonl.to_string(), "jsonl");
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!("trace".parse::<LogLevel>().unwrap(), LogLevel::Trace);
        assert_eq!("warning".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert_eq!("NONE".parse::<LogLevel>().unwrap(), LogLevel::Off);
        assert!("loud".parse::<LogLevel>().is_err());
    }

    #[test]
    fn test_level_names_round_trip() {
        for level in [
            LogLevel::Trace,
            LogLevel::Debug,
            LogLevel::Info,
            LogLevel::Warn,
            LogLevel::Error,
            LogLevel::Off,
        ] {
            assert_eq!(level.to_string().parse::<LogLevel>().unwrap(), level);
        }
        assert_eq!(LevelFilter::from(LogLevel::Debug), LevelFilter::DEBUG);
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let config = LogConfig::from_lookup(env(&[("PQ_LOG", "loud"), ("PQ_LOG_FORMAT", "xml")]), None, None);
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.format, LogFormat::Human);
    }

    #[test]
    fn test_defaults() {
        let config = LogConfig::from_lookup(env(&[]), None, None);
        assert_eq!(config.format, LogFormat::Human);
        assert_eq!(config.level, LogLevel::Warn);
        assert_eq!(config.directive(), "pq_core=warn");
    }

    #[test]
    fn test_pq_log_beats_rust_log() {
        let config = LogConfig::from_lookup(
            env(&[("PQ_LOG", "error"), ("RUST_LOG", "trace")]),
            None,
            None,
        );
        assert_eq!(config.level, LogLevel::Error);
    }

    #[test]
    fn test_rust_log_directives() {
        let config = LogConfig::from_lookup(env(&[("RUST_LOG", "hyper=info,pq_core=debug")]), None, None);
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(level_from_directives("nonsense"), None);
    }

    #[test]
    fn test_cli_overrides_env() {
        let config = LogConfig::from_lookup(
            env(&[("PQ_LOG", "error"), ("PQ_LOG_FORMAT", "human")]),
            Some(LogLevel::Trace),
            Some(LogFormat::Jsonl),
        );
        assert_eq!(config.level, LogLevel::Trace);
        assert_eq!(config.format, LogFormat::Jsonl);
    }

    #[test]
    fn test_explicit_level_ignores_rust_log() {
        let vars = [("RUST_LOG", "trace")];

        let quiet = LogConfig::from_lookup(env(&vars), Some(LogLevel::Error), None);
        assert!(quiet.level_explicit);
        assert_eq!(quiet.filter_directives(Some("trace")), "pq_core=error");

        let pinned = LogConfig::from_lookup(env(&[("PQ_LOG", "info"), vars[0]]), None, None);
        assert_eq!(pinned.filter_directives(Some("trace")), "pq_core=info");

        let fallback = LogConfig::from_lookup(env(&vars), None, None);
        assert!(!fallback.level_explicit);
        assert_eq!(fallback.level, LogLevel::Trace);
        assert_eq!(fallback.filter_directives(Some("hyper=warn,pq_core=trace")), "hyper=warn,pq_core=trace");
        assert_eq!(fallback.filter_directives(Some("  ")), "pq_core=trace");
        assert_eq!(fallback.filter_directives(None), "pq_core=trace");
    }

    #[test]
    fn test_builder() {
        let config = LogConfig::default()
            .with_format(LogFormat::Jsonl)
            .with_level(LogLevel::Debug)
            .with_timestamps(true);
        assert_eq!(config.format, LogFormat::Jsonl);
        assert_eq!(config.level, LogLevel::Debug);
        assert!(config.level_explicit);
        assert!(config.timestamps);
    }
}
