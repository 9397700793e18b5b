//! Logging setup for pq.
//!
//! Events go to stderr either as plain lines or as JSON objects, one per
//! line. stdout carries lookup results only.

pub mod config;

pub use config::{LogConfig, LogFormat, LogLevel};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// RUST_LOG applies only when neither `-v`/`-q` nor PQ_LOG chose a level.
/// Returns false if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> bool {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(config, rust_log.as_deref());

    let registry = tracing_subscriber::registry().with(filter);
    let result = match config.format {
        LogFormat::Human => {
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(std::io::stderr().is_terminal());
            if config.timestamps {
                registry.with(fmt_layer).try_init()
            } else {
                registry.with(fmt_layer.without_time()).try_init()
            }
        }
        LogFormat::Jsonl => registry
            .with(
                fmt::layer()
                    .json()
                    .flatten_event(true)
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    result.is_ok()
}

fn build_filter(config: &LogConfig, rust_log: Option<&str>) -> EnvFilter {
    EnvFilter::try_new(config.filter_directives(rust_log))
        .unwrap_or_else(|_| EnvFilter::new(config.directive()))
}

/// Shorten a potentially long value (raw tool output) for a log field.
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &s[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_truncate_short() {
        assert_eq!(truncate_for_log("short", 10), "short");
    }

    #[test]
    fn test_truncate_long() {
        let truncated = truncate_for_log("this is a very long line of lsof output", 10);
        assert_eq!(truncated, "this is a ...(truncated)");
    }

    #[test]
    fn test_truncate_respects_char_boundary() {
        let truncated = truncate_for_log("héllo", 2);
        assert_eq!(truncated, "h...(truncated)");
    }

    #[test]
    fn test_filter_honors_explicit_level() {
        let quiet = LogConfig::default().with_level(LogLevel::Error);
        let filter = build_filter(&quiet, Some("trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::ERROR));

        let unset = LogConfig::default();
        let filter = build_filter(&unset, Some("trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::TRACE));

        // an unusable RUST_LOG falls back to the configured level
        let filter = build_filter(&unset, Some("pq_core=loud"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_second_init_is_refused() {
        let config = LogConfig::default().with_level(LogLevel::Off);
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
