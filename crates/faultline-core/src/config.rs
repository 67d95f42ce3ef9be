//! Configuration module for Faultline.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Faultline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub endpoint: EndpointConfig,
    pub rate_limiting: RateLimitingConfig,
    pub offline: OfflineConfig,
    pub logging: LoggingConfig,
}

/// Collection endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Base URL of the collector, e.g. `https://submit.example.com/`.
    /// `None` until configured.
    pub host: Option<String>,
    /// Submission token appended to the request URL.
    pub token: Option<String>,
    /// Upper bound for a single submission, in seconds.
    pub request_timeout_secs: u64,
}

/// Client-side submission rate limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitingConfig {
    /// Maximum reports per window; `0` disables the limit.
    pub reports_per_minute: u32,
    /// Window length in seconds.
    pub window_secs: u64,
}

/// Offline queue and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineConfig {
    /// SQLite database holding undelivered reports.
    pub database_path: PathBuf,
    /// Maximum queued reports; oldest are evicted first. `0` = unbounded.
    pub capacity: u32,
    /// Seconds between retry cycles.
    pub retry_interval_secs: u64,
    /// Upper bound for the backed-off retry interval, in seconds.
    pub max_retry_interval_secs: u64,
    /// Records fetched per page during a retry cycle.
    pub batch_size: u32,
    /// Failed attempts after which a record is dropped. `0` = unlimited.
    pub max_attempts: u32,
    /// Tag queued records with a normal minidump type.
    pub include_minidump: bool,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Serialize and write the configuration to `path`, creating parent
    /// directories as needed.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/faultline/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("faultline")
            .join("config.yaml")
    }
}

impl EndpointConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl RateLimitingConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl OfflineConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn max_retry_interval(&self) -> Duration {
        Duration::from_secs(self.max_retry_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: None,
            token: None,
            request_timeout_secs: 15,
        }
    }
}

impl Default for RateLimitingConfig {
    fn default() -> Self {
        Self {
            reports_per_minute: 0,
            window_secs: 60,
        }
    }
}

impl Default for OfflineConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("faultline");
        Self {
            database_path: data_dir.join("offline.db"),
            capacity: 1000,
            retry_interval_secs: 60,
            max_retry_interval_secs: 900,
            batch_size: 25,
            max_attempts: 0,
            include_minidump: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Checks every section and returns all problems found.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- endpoint ---
        if let Some(host) = &self.endpoint.host {
            match url::Url::parse(host) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => {}
                Ok(url) => errors.push(ValidationError {
                    field: "endpoint.host".into(),
                    message: format!("unsupported scheme '{}'; expected http or https", url.scheme()),
                }),
                Err(e) => errors.push(ValidationError {
                    field: "endpoint.host".into(),
                    message: format!("invalid URL '{host}': {e}"),
                }),
            }
            if self.endpoint.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
                errors.push(ValidationError {
                    field: "endpoint.token".into(),
                    message: "must be set when endpoint.host is set".into(),
                });
            }
        }
        if self.endpoint.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "endpoint.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- rate_limiting ---
        if self.rate_limiting.window_secs == 0 {
            errors.push(ValidationError {
                field: "rate_limiting.window_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- offline ---
        if self.offline.retry_interval_secs == 0 {
            errors.push(ValidationError {
                field: "offline.retry_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.offline.max_retry_interval_secs < self.offline.retry_interval_secs {
            errors.push(ValidationError {
                field: "offline.max_retry_interval_secs".into(),
                message: format!(
                    "max_retry_interval_secs ({}) must not be less than retry_interval_secs ({})",
                    self.offline.max_retry_interval_secs, self.offline.retry_interval_secs
                ),
            });
        }
        if self.offline.batch_size == 0 {
            errors.push(ValidationError {
                field: "offline.batch_size".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- endpoint ---

    pub fn endpoint_host(mut self, host: impl Into<String>) -> Self {
        self.config.endpoint.host = Some(host.into());
        self
    }

    pub fn endpoint_token(mut self, token: impl Into<String>) -> Self {
        self.config.endpoint.token = Some(token.into());
        self
    }

    pub fn endpoint_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.endpoint.request_timeout_secs = seconds;
        self
    }

    // --- rate_limiting ---

    pub fn rate_limiting_reports_per_minute(mut self, n: u32) -> Self {
        self.config.rate_limiting.reports_per_minute = n;
        self
    }

    pub fn rate_limiting_window_secs(mut self, seconds: u64) -> Self {
        self.config.rate_limiting.window_secs = seconds;
        self
    }

    // --- offline ---

    pub fn offline_database_path(mut self, path: PathBuf) -> Self {
        self.config.offline.database_path = path;
        self
    }

    pub fn offline_capacity(mut self, n: u32) -> Self {
        self.config.offline.capacity = n;
        self
    }

    pub fn offline_retry_interval_secs(mut self, seconds: u64) -> Self {
        self.config.offline.retry_interval_secs = seconds;
        self
    }

    pub fn offline_max_retry_interval_secs(mut self, seconds: u64) -> Self {
        self.config.offline.max_retry_interval_secs = seconds;
        self
    }

    pub fn offline_batch_size(mut self, n: u32) -> Self {
        self.config.offline.batch_size = n;
        self
    }

    pub fn offline_max_attempts(mut self, n: u32) -> Self {
        self.config.offline.max_attempts = n;
        self
    }

    pub fn offline_include_minidump(mut self, include: bool) -> Self {
        self.config.offline.include_minidump = include;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    // --- build ---

    pub fn build(self) -> Config {
        self.config
    }

    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
