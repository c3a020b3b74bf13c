use quotientai::app::{Config, ConfigError, LogLevel};
use serial_test::serial;
use std::env;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const ENV_VARS: &[&str] = &[
    "QUOTIENT_CONFIG",
    "QUOTIENT_BASE_URL",
    "QUOTIENT_API_KEY",
    "QUOTIENT_REQUEST_TIMEOUT_MS",
    "QUOTIENT_CONNECTION_TIMEOUT_MS",
    "QUOTIENT_WORKER_IDLE_INTERVAL_MS",
    "QUOTIENT_SHUTDOWN_TIMEOUT_MS",
    "QUOTIENT_WORKER_JOIN_TIMEOUT_MS",
    "QUOTIENT_POLL_TIMEOUT_SECS",
    "QUOTIENT_POLL_INTERVAL_MS",
    "QUOTIENT_ENABLE_COMPRESSION",
    "QUOTIENT_LOG_LEVEL",
    "QUOTIENT_USER_AGENT",
];

fn clean_env() {
    unsafe {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }
}

fn set_env(name: &str, value: &str) {
    unsafe {
        env::set_var(name, value);
    }
}

#[test]
#[serial]
fn test_from_env_uses_defaults() {
    clean_env();

    let config = Config::from_env().unwrap();
    assert_eq!(config.base_url, "https://api.quotientai.co/api/v1");
    assert!(config.api_key.is_empty());
    assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    assert_eq!(config.worker_join_timeout, Duration::from_secs(1));
    assert_eq!(config.worker_idle_interval, Duration::from_millis(10));
    assert_eq!(config.poll_timeout, Duration::from_secs(300));
    assert_eq!(config.poll_interval, Duration::from_secs(2));
    assert!(matches!(config.require_api_key(), Err(ConfigError::MissingApiKey)));
}

#[test]
#[serial]
fn test_from_env_reads_overrides() {
    clean_env();
    set_env("QUOTIENT_API_KEY", "qai-123");
    set_env("QUOTIENT_BASE_URL", "http://localhost:8082/api/v1");
    set_env("QUOTIENT_SHUTDOWN_TIMEOUT_MS", "1500");
    set_env("QUOTIENT_POLL_INTERVAL_MS", "250");
    set_env("QUOTIENT_LOG_LEVEL", "DEBUG");

    let config = Config::from_env().unwrap();
    assert_eq!(config.require_api_key().unwrap(), "qai-123");
    assert_eq!(config.base_url, "http://localhost:8082/api/v1");
    assert_eq!(config.shutdown_timeout, Duration::from_millis(1500));
    assert_eq!(config.poll_interval, Duration::from_millis(250));
    assert_eq!(config.log_level, LogLevel::Debug);

    clean_env();
}

#[test]
#[serial]
fn test_from_env_rejects_bad_numbers() {
    clean_env();
    set_env("QUOTIENT_SHUTDOWN_TIMEOUT_MS", "soon");
    assert!(matches!(Config::from_env(), Err(ConfigError::EnvError(_))));

    clean_env();
    set_env("QUOTIENT_POLL_INTERVAL_MS", "0");
    assert!(matches!(Config::from_env(), Err(ConfigError::InvalidConfig(_))));

    clean_env();
}

#[test]
#[serial]
fn test_quotient_config_document_takes_precedence() {
    clean_env();
    set_env(
        "QUOTIENT_CONFIG",
        "base_url = \"http://quotient.internal/api/v1\"\nworker_join_timeout_ms = 250\n",
    );
    set_env("QUOTIENT_BASE_URL", "http://ignored.example");
    set_env("QUOTIENT_API_KEY", "from-env");

    let config = Config::from_env().unwrap();
    assert_eq!(config.base_url, "http://quotient.internal/api/v1");
    assert_eq!(config.worker_join_timeout, Duration::from_millis(250));
    assert_eq!(config.api_key, "from-env");

    clean_env();
}

#[test]
fn test_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
base_url = "https://staging.quotientai.co/api/v1"
api_key = "file-key"
request_timeout_ms = 5000
poll_timeout_secs = 60
log_level = "warn"
"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.base_url, "https://staging.quotientai.co/api/v1");
    assert_eq!(config.api_key, "file-key");
    assert_eq!(config.request_timeout, Duration::from_secs(5));
    assert_eq!(config.poll_timeout, Duration::from_secs(60));
    assert_eq!(config.log_level, LogLevel::Warn);

    let client = config.client_config().unwrap();
    assert_eq!(client.timeout, Duration::from_secs(5));
}

#[test]
fn test_from_file_errors() {
    assert!(matches!(
        Config::from_file("/nonexistent/quotient.toml"),
        Err(ConfigError::FileError(_))
    ));

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "shutdown_timeout_ms = \"five\"").unwrap();
    assert!(matches!(Config::from_file(file.path()), Err(ConfigError::ParseError(_))));
}
