//! Run configuration for `decl-e2e`.
//!
//! `decl-e2e.toml` carries the suite-wide defaults (`[suite]`, turned into a
//! [`GlobalConfig`]), HTTP client settings and runner settings. Every key is
//! optional; a missing file is the same as an empty one.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use decl_e2e_core::GlobalConfig;

/// Canonical config file name looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "decl-e2e.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level run configuration (persisted as `decl-e2e.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunConfig {
    #[serde(default)]
    pub suite: GlobalConfig,
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub runner: RunnerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Per-request timeout applied by the HTTP client.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ClientSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RunnerSettings {
    /// Only run tests whose qualified name contains this substring.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Log the captured response of every failed assertion.
    #[serde(default = "default_true")]
    pub log_failures: bool,
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}

impl RunConfig {
    pub fn from_toml_str(input: &str, origin: &str) -> Result<Self, ConfigError> {
        let mut config: RunConfig = toml::from_str(input).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.suite = config.suite.normalized();
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Load the run configuration from `path`.
pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    RunConfig::from_toml_str(&content, &path.display().to_string())
}

/// Load `path` if given, else `decl-e2e.toml` in `dir` when it exists, else
/// defaults.
pub fn load_or_default(path: Option<&Path>, dir: &Path) -> Result<RunConfig, ConfigError> {
    if let Some(path) = path {
        return load_config(path);
    }
    let candidate = dir.join(CONFIG_FILE_NAME);
    if candidate.is_file() {
        load_config(&candidate)
    } else {
        Ok(RunConfig::default())
    }
}
