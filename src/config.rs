//! Configuration file.
//!
//! A JSON document holding endpoint, budget, telemetry and storage
//! settings. Every field has a default, so a partial file (or none at all)
//! is valid. Command-line flags override what is loaded here.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{CompletionOptions, FileBudget};
use crate::error::{Error, Result};

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "KVWARM_CONFIG";

/// Default config location under the user's home.
const DEFAULT_CONFIG_PATH: &str = ".config/kvwarm/config.json";

/// Default inference endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8080";

/// Default model title sent with streaming calls.
pub const DEFAULT_MODEL_TITLE: &str = "default";

/// Default transport timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the inference endpoint.
    pub endpoint: String,
    /// Model title sent with streaming calls.
    pub model_title: String,
    /// Bearer token for the endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Transport timeout in seconds.
    pub timeout_secs: u64,
    /// File budget for context aggregation.
    pub budget: FileBudget,
    /// Options passed to the compile and streaming calls.
    pub options: CompletionOptions,
    /// Extra rules appended to the system message.
    pub rules: Vec<String>,
    /// Extra directory names to skip while walking.
    pub exclude_dirs: Vec<String>,
    /// Extra file extensions to skip while walking.
    pub exclude_extensions: Vec<String>,
    /// Telemetry collector URL; events are only logged when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub telemetry_url: Option<String>,
    /// Session database path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model_title: DEFAULT_MODEL_TITLE.to_string(),
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            budget: FileBudget::default(),
            options: CompletionOptions::default(),
            rules: Vec::new(),
            exclude_dirs: Vec::new(),
            exclude_extensions: Vec::new(),
            telemetry_url: None,
            db_path: None,
        }
    }
}

impl Config {
    /// Loads the config file.
    ///
    /// Resolution order:
    /// 1. Explicit `path` (from `--config`); it must exist
    /// 2. `KVWARM_CONFIG` environment variable
    /// 3. `~/.config/kvwarm/config.json`
    ///
    /// Falls back to defaults when no file is found at steps 2 and 3.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an explicit file is missing or any file
    /// found cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            if !path.exists() {
                return Err(Error::Config {
                    message: format!("config file not found: {}", path.display()),
                });
            }
            return Self::from_file(path);
        }

        let resolved = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .or_else(Self::default_path);

        match resolved {
            Some(path) if path.is_file() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = crate::io::read_file(path).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| Error::Config {
            message: format!("{}: {e}", path.display()),
        })?;
        tracing::debug!(path = %path.display(), "loaded config");
        config.validate()?;
        Ok(config)
    }

    /// Checks values that would make every request fail.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.trim().is_empty() {
            return Err(Error::Config {
                message: "endpoint must not be empty".to_string(),
            });
        }
        Self::validate_budget(&self.budget)
    }

    /// Checks that every budget limit admits at least some content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first zero limit.
    pub fn validate_budget(budget: &FileBudget) -> Result<()> {
        let limits = [
            ("max_files", budget.max_files == 0),
            ("max_file_bytes", budget.max_file_bytes == 0),
            ("max_total_bytes", budget.max_total_bytes == 0),
        ];
        match limits.iter().find(|(_, zero)| *zero) {
            Some((name, _)) => Err(Error::Config {
                message: format!("budget limit {name} must be greater than zero"),
            }),
            None => Ok(()),
        }
    }

    /// Writes the default config to `path` unless a file is already there.
    ///
    /// Returns true if the file was written.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_default(path: &Path) -> Result<bool> {
        let json = serde_json::to_string_pretty(&Self::default()).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        crate::io::write_file_if_absent(path, &json)
    }

    /// Returns the default config path under the user's home.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(DEFAULT_CONFIG_PATH))
    }

    /// Transport timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
