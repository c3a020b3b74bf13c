use super::payload::strip_nulls;
use super::{AsyncTransport, Transport};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Request timeout: {0}")]
    RequestTimeout(String),
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Runtime closed: {0}")]
    RuntimeClosed(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl ClientError {
    /// The async runtime driving the request is shutting down.
    pub fn is_runtime_closed(&self) -> bool {
        matches!(self, ClientError::RuntimeClosed(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::RequestTimeout(_))
    }

    fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            return ClientError::RequestTimeout(error.to_string());
        }
        if runtime_gone(&error) {
            return ClientError::RuntimeClosed(error.to_string());
        }
        if error.is_connect() {
            return ClientError::ConnectionFailed(error.to_string());
        }
        ClientError::NetworkError(error)
    }
}

// hyper reports a dropped runtime through the error source chain only.
fn runtime_gone(error: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(error);
    while let Some(err) = source {
        let message = err.to_string().to_lowercase();
        if message.contains("runtime dropped")
            || message.contains("runtime shutdown")
            || message.contains("runtime is shutting down")
        {
            return true;
        }
        source = err.source();
    }
    false
}

/// Maps a non-2xx response to a readable error.
fn status_error(status: StatusCode, body: &str) -> ClientError {
    let message = match status.as_u16() {
        400 => "bad request: the server could not understand the request due to invalid syntax."
            .to_string(),
        401 => {
            "unauthorized: the request requires user authentication. ensure your API key is correct."
                .to_string()
        }
        403 => "forbidden: the server understood the request, but it refuses to authorize it."
            .to_string(),
        404 => "not found: the server can not find the requested resource.".to_string(),
        422 => missing_fields_message(body)
            .unwrap_or_else(|| format!("unprocessable entity: {body}")),
        code => format!("unexpected status code: {code}. contact support@quotientai.co for help."),
    };
    ClientError::HttpError {
        status: status.as_u16(),
        message,
    }
}

fn missing_fields_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let missing: Vec<String> = parsed
        .get("detail")?
        .as_array()?
        .iter()
        .filter(|detail| detail.get("type").and_then(Value::as_str) == Some("missing"))
        .filter_map(|detail| detail.get("loc")?.as_array()?.last().map(loc_to_string))
        .collect();

    if missing.is_empty() {
        None
    } else {
        Some(format!("missing required fields: {}", missing.join(", ")))
    }
}

fn loc_to_string(loc: &Value) -> String {
    match loc {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn decode_body(text: &str) -> Result<Value, ClientError> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(text).map_err(|e| ClientError::Deserialization(e.to_string()))
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
    pub enable_compression: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.quotientai.co/api/v1".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            user_agent: format!("quotientai-rust/{}", env!("CARGO_PKG_VERSION")),
            enable_compression: true,
        }
    }
}

impl ClientConfig {
    fn validate(&self) -> Result<Url, ClientError> {
        if self.api_key.trim().is_empty() {
            return Err(ClientError::InvalidConfiguration("API key must not be empty".to_string()));
        }
        self.base_url
            .parse::<Url>()
            .map_err(|e| ClientError::InvalidConfiguration(format!("Invalid base URL: {e}")))
    }

    fn default_headers(&self) -> Result<HeaderMap, ClientError> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| ClientError::InvalidConfiguration(format!("Invalid API key: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub average_response_time: Duration,
}

#[derive(Debug, Default)]
pub struct ClientStats {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    total_response_time: AtomicU64,
}

impl ClientStats {
    pub fn record_request(&self, success: bool, response_time: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time
            .fetch_add(response_time.as_millis() as u64, Ordering::Relaxed);

        if success {
            self.successful_requests.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> ConnectionStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_response_time = self.total_response_time.load(Ordering::Relaxed);

        let average_response_time = if total_requests > 0 {
            Duration::from_millis(total_response_time / total_requests)
        } else {
            Duration::ZERO
        };

        ConnectionStats {
            total_requests,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            average_response_time,
        }
    }
}

/// Records the request and turns the response body into the call's result.
///
/// A body that could not be read counts as a failed request.
fn settle_response(
    stats: &ClientStats,
    start: Instant,
    status: StatusCode,
    body: Result<String, ClientError>,
) -> Result<Value, ClientError> {
    let text = match body {
        Ok(text) => text,
        Err(e) => {
            stats.record_request(false, start.elapsed());
            return Err(e);
        }
    };
    stats.record_request(status.is_success(), start.elapsed());

    if !status.is_success() {
        return Err(status_error(status, &text));
    }
    decode_body(&text)
}

fn join_path(base: &Url, path: &str) -> Result<Url, ClientError> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    joined
        .parse()
        .map_err(|e| {
            ClientError::InvalidConfiguration(format!("Invalid request path '{path}': {e}"))
        })
}

/// Async JSON client for the service API.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: ClientConfig,
    base_url: Url,
    stats: Arc<ClientStats>,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = config.validate()?;

        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent)
            .default_headers(config.default_headers()?);

        if config.enable_compression {
            builder = builder.gzip(true);
        }

        let client = builder.build().map_err(|e| {
            ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            client,
            config,
            base_url,
            stats: Arc::new(ClientStats::default()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.stats.snapshot()
    }

    async fn finish(&self, request: reqwest::RequestBuilder) -> Result<Value, ClientError> {
        let start = Instant::now();
        let result = request.send().await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.stats.record_request(false, start.elapsed());
                return Err(ClientError::from_reqwest(e));
            }
        };

        let status = response.status();
        let text = response.text().await.map_err(ClientError::from_reqwest);
        settle_response(&self.stats, start, status, text)
    }
}

impl AsyncTransport for HttpClient {
    async fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let url = join_path(&self.base_url, path)?;
        debug!(%url, "POST");
        self.finish(self.client.post(url).json(&strip_nulls(body))).await
    }

    async fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, ClientError> {
        let url = join_path(&self.base_url, path)?;
        debug!(%url, "GET");
        self.finish(self.client.get(url).query(params)).await
    }
}

/// Blocking JSON client for the worker thread and the sync resources.
///
/// Must not be created or dropped from inside an async context.
#[derive(Debug, Clone)]
pub struct BlockingHttpClient {
    client: reqwest::blocking::Client,
    config: ClientConfig,
    base_url: Url,
    stats: Arc<ClientStats>,
}

impl BlockingHttpClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let base_url = config.validate()?;

        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent)
            .default_headers(config.default_headers()?)
            .gzip(config.enable_compression)
            .build()
            .map_err(|e| {
                ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            base_url,
            stats: Arc::new(ClientStats::default()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn connection_stats(&self) -> ConnectionStats {
        self.stats.snapshot()
    }

    fn finish(&self, request: reqwest::blocking::RequestBuilder) -> Result<Value, ClientError> {
        let start = Instant::now();
        let response = match request.send() {
            Ok(response) => response,
            Err(e) => {
                self.stats.record_request(false, start.elapsed());
                return Err(ClientError::from_reqwest(e));
            }
        };

        let status = response.status();
        let text = response.text().map_err(ClientError::from_reqwest);
        settle_response(&self.stats, start, status, text)
    }
}

impl Transport for BlockingHttpClient {
    fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let url = join_path(&self.base_url, path)?;
        debug!(%url, "POST");
        self.finish(self.client.post(url).json(&strip_nulls(body)))
    }

    fn get(&self, path: &str, params: &[(String, String)]) -> Result<Value, ClientError> {
        let url = join_path(&self.base_url, path)?;
        debug!(%url, "GET");
        self.finish(self.client.get(url).query(params))
    }
}
