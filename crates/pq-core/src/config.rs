//! Configuration loading and validation for pq-core.
//!
//! This module handles:
//! - Loading `config.toml` into a [`ProbeConfig`]
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Environment overrides applied after the file
//! - Semantic validation (non-zero limits)

use crate::availability::ToolLocator;
use crate::collect::ToolConfig;
use pq_common::{Error, PlatformKind, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "pq";

/// Config file name inside the config directory.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "PQ_CONFIG";

/// Environment variable overriding the per-command timeout.
pub const TIMEOUT_ENV: &str = "PQ_TIMEOUT_MS";

/// Settings for a [`SystemProbe`](crate::SystemProbe).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeConfig {
    /// Per-command timeout in milliseconds.
    pub timeout_ms: u64,

    /// Stdout cap per command in bytes.
    pub max_output_bytes: usize,

    /// Search path used both to find tools and as the children's PATH.
    pub search_path: Option<String>,

    /// Tools to treat as missing even when installed.
    pub disabled_tools: Vec<String>,

    /// Run tools under `nice`.
    pub use_nice: bool,

    /// Force a platform classification instead of asking the kernel.
    pub platform: Option<PlatformKind>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: crate::collect::DEFAULT_TIMEOUT_MS,
            max_output_bytes: crate::collect::DEFAULT_MAX_OUTPUT_BYTES,
            search_path: None,
            disabled_tools: Vec::new(),
            use_nice: false,
            platform: None,
        }
    }
}

impl ProbeConfig {
    /// Parse TOML text. `origin` is only used in error messages.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        let config: ProbeConfig = toml::from_str(text).map_err(|e| Error::InvalidConfigFile {
            path: origin.to_path_buf(),
            message: e.message().to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::InvalidConfigFile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text, path)
    }

    /// Reject values that would make every lookup fail.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfigValue {
                field: "timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }
        if self.max_output_bytes == 0 {
            return Err(Error::InvalidConfigValue {
                field: "max_output_bytes".into(),
                message: "must be greater than zero".into(),
            });
        }
        if let Some(tool) = self.disabled_tools.iter().find(|t| t.trim().is_empty()) {
            return Err(Error::InvalidConfigValue {
                field: "disabled_tools".into(),
                message: format!("blank tool name {:?}", tool),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Runner settings derived from this config.
    pub fn tool_config(&self) -> ToolConfig {
        ToolConfig {
            default_timeout: self.timeout(),
            max_output_bytes: self.max_output_bytes,
            use_nice: self.use_nice,
            search_path: self.search_path.clone(),
            ..ToolConfig::default()
        }
    }

    /// Availability checker honoring the search path and disabled tools.
    pub fn locator(&self) -> ToolLocator {
        let locator = match &self.search_path {
            Some(path) => ToolLocator::with_search_path(path),
            None => ToolLocator::new(),
        };
        locator.with_disabled(self.disabled_tools.iter().cloned())
    }
}

/// Configuration resolution options.
#[derive(Debug, Default, Clone)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
    /// Explicit timeout, applied after every other source.
    pub timeout_ms: Option<u64>,
}

/// Loaded configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub config: ProbeConfig,
    /// File the config was read from (None if using defaults).
    pub path: Option<PathBuf>,
}

/// Load configuration from the process environment.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit file (via ConfigOptions)
/// 2. Environment variable (PQ_CONFIG)
/// 3. XDG config home (~/.config/pq/config.toml), if present
/// 4. Built-in defaults
///
/// PQ_TIMEOUT_MS and then `options.timeout_ms` override the loaded timeout.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig> {
    load_config_with(options, |key| std::env::var(key).ok(), dirs::config_dir())
}

/// [`load_config`] with an injected environment and config home.
pub fn load_config_with<F>(
    options: &ConfigOptions,
    env: F,
    config_home: Option<PathBuf>,
) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = resolve_config_path(options, &env, config_home);
    let mut config = match &path {
        Some(path) => ProbeConfig::from_file(path)?,
        None => ProbeConfig::default(),
    };

    if let Some(raw) = env(TIMEOUT_ENV) {
        config.timeout_ms = raw.trim().parse().map_err(|_| Error::InvalidConfigValue {
            field: TIMEOUT_ENV.into(),
            message: format!("expected milliseconds, got {:?}", raw),
        })?;
    }
    if let Some(timeout_ms) = options.timeout_ms {
        config.timeout_ms = timeout_ms;
    }
    config.validate()?;

    debug!(path = ?path, timeout_ms = config.timeout_ms, "loaded configuration");
    Ok(ResolvedConfig { config, path })
}

/// Resolve the config file using the standard resolution order.
fn resolve_config_path<F>(
    options: &ConfigOptions,
    env: &F,
    config_home: Option<PathBuf>,
) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    // An explicit file must exist; a missing default file just means defaults.
    if let Some(path) = &options.config_path {
        return Some(path.clone());
    }
    if let Some(path) = env(CONFIG_ENV).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    let default_path = config_home?.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
    default_path.is_file().then_some(default_path)
}
