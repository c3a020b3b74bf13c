use crate::app::ConfigError;
use crate::sender::ClientError;
use thiserror::Error;

/// Errors raised while validating a log before it is enqueued.
///
/// These never escape `create`; they are logged and turn into a `None` id.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("app_name must not be empty")]
    EmptyAppName,
    #[error("environment must not be empty")]
    EmptyEnvironment,
    #[error("{field} must be between 0.0 and 1.0, got {value}")]
    InvalidSampleRate { field: &'static str, value: f64 },
    #[error("{detection} detection requires {field}")]
    MissingField {
        detection: &'static str,
        field: &'static str,
    },
    #[error("malformed document at index {index}: {reason}")]
    MalformedDocument { index: usize, reason: String },
    #[error("message at index {index} has an empty role")]
    EmptyMessageRole { index: usize },
    #[error("tag '{key}' must be a string, number, boolean or null")]
    NonScalarTag { key: String },
}

/// Top-level error type for the SDK surface.
#[derive(Error, Debug)]
pub enum QuotientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Logger is not configured. Please call init() before logging")]
    NotConfigured,

    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, QuotientError>;
