//! TOML Configuration File Support
//!
//! Configuration for the console lives in a TOML file at
//! `$XDG_CONFIG_HOME/sandbox-console/console.toml`.
//!
//! # Configuration Priority
//!
//! Values are applied with the following priority (highest first):
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [server]
//! base_url = "http://127.0.0.1:63134"
//! request_timeout_secs = 30
//!
//! [session]
//! token = "1073741"
//!
//! [poller]
//! max_consecutive_failures = 5
//! retry_base_delay_ms = 250
//! retry_max_delay_ms = 4000
//!
//! [output]
//! ordering = "result-last"
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Overrides |
//! |---|---|
//! | `SANDBOX_CONSOLE_SERVER` | `server.base_url` |
//! | `SANDBOX_CONSOLE_SESSION` | `session.token` |
//! | `SANDBOX_CONSOLE_ORDERING` | `output.ordering` |
//! | `SANDBOX_CONSOLE_TIMEOUT_SECS` | `server.request_timeout_secs` |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::controller::OutputOrdering;
use crate::poller::PollerConfig;

/// Default sandbox server address
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:63134";

/// Environment variable holding the server base URL
pub const ENV_SERVER: &str = "SANDBOX_CONSOLE_SERVER";
/// Environment variable holding the session token
pub const ENV_SESSION: &str = "SANDBOX_CONSOLE_SESSION";
/// Environment variable holding the output ordering
pub const ENV_ORDERING: &str = "SANDBOX_CONSOLE_ORDERING";
/// Environment variable holding the request timeout in seconds
pub const ENV_TIMEOUT_SECS: &str = "SANDBOX_CONSOLE_TIMEOUT_SECS";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Server section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerToml {
    /// Base URL of the sandbox server
    pub base_url: Option<String>,

    /// Per-request timeout in seconds (absent = wait forever)
    pub request_timeout_secs: Option<u64>,

    /// User-Agent header
    pub user_agent: Option<String>,
}

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Existing session token to reuse
    pub token: Option<String>,
}

/// Poller section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerToml {
    /// Failed polls in a row before the poller gives up
    pub max_consecutive_failures: Option<u32>,

    /// First retry delay after a failed poll, in milliseconds
    pub retry_base_delay_ms: Option<u64>,

    /// Upper bound on the retry delay, in milliseconds
    pub retry_max_delay_ms: Option<u64>,
}

/// Output section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputToml {
    /// Where the evaluation result lands relative to streamed chunks
    pub ordering: Option<OutputOrdering>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleToml {
    /// Server section
    pub server: ServerToml,

    /// Session section
    pub session: SessionToml,

    /// Poller section
    pub poller: PollerToml,

    /// Output section
    pub output: OutputToml,
}

// =============================================================================
// Main Configuration Structs
// =============================================================================

/// How to reach the sandbox server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    /// Base URL, scheme included
    pub base_url: String,

    /// Per-request timeout; `None` lets an evaluation run as long as it needs
    pub request_timeout: Option<Duration>,

    /// User-Agent header
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            user_agent: concat!("sandbox-console/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Resolved console configuration
///
/// Built from defaults, the config file, the environment and CLI overrides.
/// Use [`load_config`] to get one with proper priority handling.
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    /// Server connection settings
    pub server: ServerConfig,

    /// Existing session token, if one is configured
    pub session_token: Option<String>,

    /// Output poller settings
    pub poller: PollerConfig,

    /// Result placement relative to streamed output
    pub ordering: OutputOrdering,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Where `server.base_url` came from
    pub base_url_source: ConfigSource,

    /// Where `session_token` came from
    pub session_source: ConfigSource,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            session_token: None,
            poller: PollerConfig::default(),
            ordering: OutputOrdering::default(),
            config_file_path: None,
            base_url_source: ConfigSource::Default,
            session_source: ConfigSource::Default,
        }
    }
}

impl ConsoleConfig {
    /// Check values that parse fine but cannot work
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = &self.server.base_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "server.base_url must start with http:// or https:// (got {url:?}, from {})",
                self.base_url_source
            )));
        }
        if self.server.request_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::ValidationError(
                "server.request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.poller.max_consecutive_failures == 0 {
            return Err(ConfigError::ValidationError(
                "poller.max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        if self.poller.retry_base_delay > self.poller.retry_max_delay {
            return Err(ConfigError::ValidationError(format!(
                "poller.retry_base_delay_ms ({}) exceeds poller.retry_max_delay_ms ({})",
                self.poller.retry_base_delay.as_millis(),
                self.poller.retry_max_delay.as_millis()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/sandbox-console/console.toml` or
/// `~/.config/sandbox-console/console.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("sandbox-console").join("console.toml"))
}

/// Load configuration from the default path, the environment and overrides
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the resulting configuration fails validation. A missing config file is
/// not an error.
pub fn load_config(overrides: &ConfigOverrides) -> Result<ConsoleConfig, ConfigError> {
    load_config_from_path(default_config_path(), overrides)
}

/// Load configuration from a specific path
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the
/// resulting configuration fails validation.
pub fn load_config_from_path(
    path: Option<PathBuf>,
    overrides: &ConfigOverrides,
) -> Result<ConsoleConfig, ConfigError> {
    load_config_with_env(path, overrides, |name| std::env::var(name).ok())
}

/// Load configuration reading environment variables through `lookup`
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env(
    path: Option<PathBuf>,
    overrides: &ConfigOverrides,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ConsoleConfig, ConfigError> {
    let mut config = ConsoleConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ConsoleToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_values(&mut config, lookup);
    overrides.apply(&mut config);
    config.validate()?;

    tracing::debug!(
        base_url = %config.server.base_url,
        base_url_source = %config.base_url_source,
        session_source = %config.session_source,
        ordering = ?config.ordering,
        "Configuration resolved"
    );

    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut ConsoleConfig, toml: &ConsoleToml) {
    if let Some(ref url) = toml.server.base_url {
        config.server.base_url = url.clone();
        config.base_url_source = ConfigSource::File;
    }
    if let Some(secs) = toml.server.request_timeout_secs {
        config.server.request_timeout = Some(Duration::from_secs(secs));
    }
    if let Some(ref agent) = toml.server.user_agent {
        config.server.user_agent = agent.clone();
    }

    if let Some(ref token) = toml.session.token {
        config.session_token = Some(token.clone());
        config.session_source = ConfigSource::File;
    }

    if let Some(n) = toml.poller.max_consecutive_failures {
        config.poller.max_consecutive_failures = n;
    }
    if let Some(ms) = toml.poller.retry_base_delay_ms {
        config.poller.retry_base_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = toml.poller.retry_max_delay_ms {
        config.poller.retry_max_delay = Duration::from_millis(ms);
    }

    if let Some(ordering) = toml.output.ordering {
        config.ordering = ordering;
    }
}

/// Apply environment variable overrides read through `lookup`
fn apply_env_values(config: &mut ConsoleConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_SERVER) {
        config.server.base_url = url;
        config.base_url_source = ConfigSource::Env;
    }
    if let Some(token) = lookup(ENV_SESSION) {
        config.session_token = Some(token);
        config.session_source = ConfigSource::Env;
    }
    if let Some(ordering) = lookup(ENV_ORDERING) {
        match ordering.parse::<OutputOrdering>() {
            Ok(ordering) => config.ordering = ordering,
            Err(e) => tracing::warn!(variable = ENV_ORDERING, error = %e, "Ignoring invalid value"),
        }
    }
    if let Some(timeout) = lookup(ENV_TIMEOUT_SECS) {
        match timeout.parse::<u64>() {
            Ok(secs) => config.server.request_timeout = Some(Duration::from_secs(secs)),
            Err(e) => {
                tracing::warn!(variable = ENV_TIMEOUT_SECS, error = %e, "Ignoring invalid value");
            }
        }
    }
}

// =============================================================================
// CLI Overrides
// =============================================================================

/// Values given on the command line, applied last
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Server base URL override
    pub base_url: Option<String>,

    /// Session token override
    pub session_token: Option<String>,

    /// Output ordering override
    pub ordering: Option<OutputOrdering>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set server base URL override
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set session token override
    #[must_use]
    pub fn with_session_token(mut self, token: impl Into<String>) -> Self {
        self.session_token = Some(token.into());
        self
    }

    /// Set output ordering override
    #[must_use]
    pub fn with_ordering(mut self, ordering: OutputOrdering) -> Self {
        self.ordering = Some(ordering);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ConsoleConfig) {
        if let Some(ref url) = self.base_url {
            config.server.base_url = url.clone();
            config.base_url_source = ConfigSource::Cli;
        }
        if let Some(ref token) = self.session_token {
            config.session_token = Some(token.clone());
            config.session_source = ConfigSource::Cli;
        }
        if let Some(ordering) = self.ordering {
            config.ordering = ordering;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
