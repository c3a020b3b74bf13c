use crate::resources::PollSettings;
use crate::sender::ClientConfig;
use crate::worker::DeliveryConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.quotientai.co/api/v1";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(
        "could not find QUOTIENT_API_KEY in environment variables. if you do not have an API key, you can create one at https://app.quotientai.co in your settings page"
    )]
    MissingApiKey,
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Environment error: {0}")]
    EnvError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(ConfigError::EnvError(format!("Invalid log level: {s}"))),
        }
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// SDK configuration.
///
/// Timeouts are stored in the serialized form as integers (`*_ms`, `*_secs`)
/// and converted to [`Duration`]s by [`Config::post_process`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub base_url: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub connection_timeout_ms: u64,
    pub worker_idle_interval_ms: u64,
    pub shutdown_timeout_ms: u64,
    pub worker_join_timeout_ms: u64,
    pub poll_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub log_level: LogLevel,
    pub user_agent: String,
    pub enable_compression: bool,

    /// Derived fields
    #[serde(skip)]
    pub request_timeout: Duration,
    #[serde(skip)]
    pub connection_timeout: Duration,
    #[serde(skip)]
    pub worker_idle_interval: Duration,
    #[serde(skip)]
    pub shutdown_timeout: Duration,
    #[serde(skip)]
    pub worker_join_timeout: Duration,
    #[serde(skip)]
    pub poll_timeout: Duration,
    #[serde(skip)]
    pub poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            request_timeout_ms: 30_000,
            connection_timeout_ms: 10_000,
            worker_idle_interval_ms: 10,
            shutdown_timeout_ms: 5_000,
            worker_join_timeout_ms: 1_000,
            poll_timeout_secs: 300,
            poll_interval_ms: 2_000,
            log_level: LogLevel::Info,
            user_agent: format!("quotientai-rust/{}", env!("CARGO_PKG_VERSION")),
            enable_compression: true,
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            worker_idle_interval: Duration::from_millis(10),
            shutdown_timeout: Duration::from_secs(5),
            worker_join_timeout: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Loads from `QUOTIENT_*` environment variables on top of the defaults.
    ///
    /// A full TOML document in `QUOTIENT_CONFIG` takes precedence over the
    /// individual variables, except that `QUOTIENT_API_KEY` still fills in a
    /// missing key.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(document) = std::env::var("QUOTIENT_CONFIG") {
            let mut config: Config = toml::from_str(&document)?;
            if config.api_key.is_empty() {
                load_env_string("QUOTIENT_API_KEY", &mut config.api_key);
            }
            config.post_process()?;
            config.validate()?;
            return Ok(config);
        }

        let mut config = Config::default();

        load_env_string("QUOTIENT_BASE_URL", &mut config.base_url);
        load_env_string("QUOTIENT_API_KEY", &mut config.api_key);
        load_env_var("QUOTIENT_REQUEST_TIMEOUT_MS", &mut config.request_timeout_ms)?;
        load_env_var("QUOTIENT_CONNECTION_TIMEOUT_MS", &mut config.connection_timeout_ms)?;
        load_env_var("QUOTIENT_WORKER_IDLE_INTERVAL_MS", &mut config.worker_idle_interval_ms)?;
        load_env_var("QUOTIENT_SHUTDOWN_TIMEOUT_MS", &mut config.shutdown_timeout_ms)?;
        load_env_var("QUOTIENT_WORKER_JOIN_TIMEOUT_MS", &mut config.worker_join_timeout_ms)?;
        load_env_var("QUOTIENT_POLL_TIMEOUT_SECS", &mut config.poll_timeout_secs)?;
        load_env_var("QUOTIENT_POLL_INTERVAL_MS", &mut config.poll_interval_ms)?;
        load_env_var("QUOTIENT_ENABLE_COMPRESSION", &mut config.enable_compression)?;
        load_env_var("QUOTIENT_LOG_LEVEL", &mut config.log_level)?;
        load_env_string("QUOTIENT_USER_AGENT", &mut config.user_agent);

        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        self.request_timeout = Duration::from_millis(self.request_timeout_ms);
        self.connection_timeout = Duration::from_millis(self.connection_timeout_ms);
        self.worker_idle_interval = Duration::from_millis(self.worker_idle_interval_ms);
        self.shutdown_timeout = Duration::from_millis(self.shutdown_timeout_ms);
        self.worker_join_timeout = Duration::from_millis(self.worker_join_timeout_ms);
        self.poll_timeout = Duration::from_secs(self.poll_timeout_secs);
        self.poll_interval = Duration::from_millis(self.poll_interval_ms);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid base URL '{}': {}", self.base_url, e))
        })?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Base URL must use http or https: {}",
                self.base_url
            )));
        }

        for (name, value) in [
            ("request_timeout_ms", self.request_timeout_ms),
            ("connection_timeout_ms", self.connection_timeout_ms),
            ("worker_idle_interval_ms", self.worker_idle_interval_ms),
            ("shutdown_timeout_ms", self.shutdown_timeout_ms),
            ("worker_join_timeout_ms", self.worker_join_timeout_ms),
            ("poll_timeout_secs", self.poll_timeout_secs),
            ("poll_interval_ms", self.poll_interval_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidConfig(format!(
                    "{name} must be greater than 0"
                )));
            }
        }

        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "User agent must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The API key, or [`ConfigError::MissingApiKey`] when none was configured.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        let key = self.api_key.trim();
        if key.is_empty() {
            Err(ConfigError::MissingApiKey)
        } else {
            Ok(key)
        }
    }

    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        Ok(ClientConfig {
            base_url: self.base_url.clone(),
            api_key: self.require_api_key()?.to_string(),
            timeout: self.request_timeout,
            connection_timeout: self.connection_timeout,
            user_agent: self.user_agent.clone(),
            enable_compression: self.enable_compression,
        })
    }

    pub fn delivery_config(&self) -> DeliveryConfig {
        DeliveryConfig {
            idle_interval: self.worker_idle_interval,
            shutdown_timeout: self.shutdown_timeout,
            join_timeout: self.worker_join_timeout,
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            timeout: self.poll_timeout,
            interval: self.poll_interval,
        }
    }
}

/// Parses an environment variable into `target`, keeping the default when unset.
fn load_env_var<T>(name: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(name) {
        *target = value
            .parse()
            .map_err(|e| ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

fn load_env_string(name: &str, target: &mut String) {
    if let Ok(value) = std::env::var(name) {
        *target = value;
    }
}
