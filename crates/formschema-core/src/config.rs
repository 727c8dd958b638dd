//! Application configuration: data paths, the optional settings file and the
//! Extend API credential.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::catalog::SourceEndpoints;
use crate::error::ConfigError;
use crate::extend::PollPolicy;

/// Environment variable consulted when no API key is passed explicitly.
pub const API_KEY_ENV: &str = "EXTEND_API_KEY";

pub const DEFAULT_API_BASE: &str = "https://api.extend.app/v1";
pub const DEFAULT_API_VERSION: &str = "2025-04-21";

/// Some government sites reject default client identifiers.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Application paths
#[derive(Debug, Clone)]
pub struct Config {
    /// Root data directory (~/.local/share/formschema)
    pub data_dir: PathBuf,
    /// Default destination for downloaded forms
    pub forms_dir: PathBuf,
    /// Default destination for generated schemas
    pub schemas_dir: PathBuf,
    /// Settings file (~/.config/formschema/settings.json)
    pub settings_file: PathBuf,
}

impl Config {
    /// Load configuration or use defaults
    pub fn load_or_default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("formschema");

        let settings_file = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("formschema")
            .join("settings.json");

        Self {
            forms_dir: data_dir.join("forms"),
            schemas_dir: data_dir.join("schemas"),
            data_dir,
            settings_file,
        }
    }

    /// Configuration rooted at an explicit directory (tests, portable installs).
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            forms_dir: data_dir.join("forms"),
            schemas_dir: data_dir.join("schemas"),
            settings_file: data_dir.join("settings.json"),
            data_dir,
        }
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.forms_dir)?;
        std::fs::create_dir_all(&self.schemas_dir)?;
        Ok(())
    }
}

/// Tunables read from the settings file. Every field has a default, so a
/// partial (or missing) file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Extend API base URL
    pub api_base: String,
    /// Value of the `x-extend-api-version` header
    pub api_version: String,
    /// Delay before each status check
    pub poll_interval_ms: u64,
    /// Status checks before giving up
    pub max_poll_attempts: u32,
    /// 1.0 keeps a fixed delay; larger values back off exponentially
    pub backoff_factor: f64,
    /// Upper bound for the backoff delay
    pub max_poll_interval_ms: u64,
    /// Concurrent items in batch commands
    pub concurrency: usize,
    /// Per-request timeout
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub sources: SourceEndpoints,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            poll_interval_ms: 5_000,
            max_poll_attempts: 60,
            backoff_factor: 1.0,
            max_poll_interval_ms: 30_000,
            concurrency: 4,
            request_timeout_secs: 120,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            sources: SourceEndpoints::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`. A missing file yields defaults; an unreadable
    /// or malformed one is a configuration error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::ReadSettings {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let settings: Settings =
            serde_json::from_str(&content).map_err(|source| ConfigError::InvalidSettingsFile {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;

        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Reject values that would make the pipeline misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base.trim().is_empty() {
            return Err(invalid("api_base", "must not be empty"));
        }
        if self.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms", "must be greater than zero"));
        }
        if self.max_poll_attempts == 0 {
            return Err(invalid("max_poll_attempts", "must be at least 1"));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(invalid(
                "backoff_factor",
                &format!("must be a number >= 1.0, got {}", self.backoff_factor),
            ));
        }
        if self.max_poll_interval_ms < self.poll_interval_ms {
            return Err(invalid(
                "max_poll_interval_ms",
                "must not be smaller than poll_interval_ms",
            ));
        }
        if self.concurrency == 0 {
            return Err(invalid("concurrency", "must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
            backoff_factor: self.backoff_factor,
            max_interval: Duration::from_millis(self.max_poll_interval_ms),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn invalid(name: &'static str, reason: &str) -> ConfigError {
    ConfigError::InvalidSetting {
        name,
        reason: reason.to_string(),
    }
}

/// Bearer credential for the Extend API.
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// Explicit key first, then `EXTEND_API_KEY`. Empty values count as absent.
    pub fn resolve(explicit: Option<&str>) -> Result<Self, ConfigError> {
        Self::resolve_with(explicit, |name| std::env::var(name).ok())
    }

    /// Same as [`ApiKey::resolve`] with a custom environment lookup.
    pub fn resolve_with<F>(explicit: Option<&str>, lookup: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(&str) -> Option<String>,
    {
        let explicit = explicit.map(str::trim).filter(|k| !k.is_empty());
        if let Some(key) = explicit {
            return Ok(Self(key.to_string()));
        }

        lookup(API_KEY_ENV)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .map(Self)
            .ok_or(ConfigError::MissingApiKey {
                env_var: API_KEY_ENV,
            })
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}
