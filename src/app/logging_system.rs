use super::config::LogLevel;
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log directive '{0}'")]
    InvalidDirective(String),
    #[error("Logging initialization failed: {0}")]
    InitFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirective {
    pub target: String,
    pub level: LogLevel,
}

impl LogDirective {
    pub fn new(target: impl Into<String>, level: LogLevel) -> Self {
        Self {
            target: target.into(),
            level,
        }
    }

    /// Parses `target=level`.
    pub fn parse(directive: &str) -> Result<Self, LoggingError> {
        let Some((target, level)) = directive.split_once('=') else {
            return Err(LoggingError::InvalidDirective(directive.to_string()));
        };
        let target = target.trim();
        if target.is_empty() {
            return Err(LoggingError::InvalidDirective(directive.to_string()));
        }
        let level = level
            .trim()
            .parse()
            .map_err(|_| LoggingError::InvalidDirective(directive.to_string()))?;
        Ok(Self::new(target, level))
    }

    pub fn to_filter_string(&self) -> String {
        format!("{}={}", self.target, self.level.as_str())
    }
}

/// Builds the `EnvFilter` for the SDK's tracing subscriber.
pub struct LoggingSystem {
    directives: Arc<RwLock<Vec<LogDirective>>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn add_directive(&self, directive: &str) -> Result<(), LoggingError> {
        let directive = LogDirective::parse(directive)?;
        self.directives.write().push(directive);
        Ok(())
    }

    /// Quiets the HTTP stack below the SDK.
    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for target in ["hyper", "reqwest", "h2"] {
            directives.push(LogDirective::new(target, LogLevel::Warn));
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();
        let mut parts = Vec::with_capacity(directives.len() + 1);
        parts.push(default_level.as_str().to_string());
        parts.extend(directives.iter().map(LogDirective::to_filter_string));
        parts.join(",")
    }

    pub fn directive_count(&self) -> usize {
        self.directives.read().len()
    }

    pub fn initialize_tracing(&self, default_level: LogLevel) -> Result<(), LoggingError> {
        let filter_string = self.build_filter_string(default_level);
        let env_filter = EnvFilter::try_new(&filter_string)
            .map_err(|e| LoggingError::InitFailed(format!("bad filter '{filter_string}': {e}")))?;

        let subscriber = tracing_subscriber::registry().with(env_filter).with(
            fmt::layer()
                .with_target(true)
                .with_thread_names(true)
                .with_level(true)
                .compact(),
        );

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| LoggingError::InitFailed(format!("global subscriber already set: {e}")))
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the SDK subscriber once per process.
///
/// Returns an error instead of panicking when another subscriber is
/// already installed.
pub fn setup_logging_safe(level: LogLevel) -> Result<(), LoggingError> {
    use std::sync::Once;

    static INIT: Once = Once::new();
    static INIT_SUCCESS: AtomicBool = AtomicBool::new(false);

    INIT.call_once(|| {
        let logging_system = LoggingSystem::new();
        logging_system.add_default_directives();
        if logging_system.initialize_tracing(level).is_ok() {
            INIT_SUCCESS.store(true, Ordering::Release);
        }
    });

    if INIT_SUCCESS.load(Ordering::Acquire) {
        Ok(())
    } else {
        Err(LoggingError::InitFailed(
            "another tracing subscriber is installed".to_string(),
        ))
    }
}
