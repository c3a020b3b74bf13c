pub mod config;
pub mod logger;
pub mod logging_system;
pub mod shutdown;

pub use config::{Config, ConfigError, LogLevel};
pub use logger::{AsyncQuotientLogger, LogInput, LoggerOptions, QuotientLogger};
pub use logging_system::{LoggingError, LoggingSystem, setup_logging_safe};
pub use shutdown::{ShutdownSignal, ShutdownTrigger, SignalHandler};

use crate::domain::Result;
use crate::resources::{
    AsyncDetectionsResource, AsyncLogsResource, DetectionsResource, LogsResource,
};
use crate::sender::{AsyncTransport, BlockingHttpClient, HttpClient, Transport};
use crate::worker::ShutdownReport;
use std::sync::Arc;
use tracing::info;

/// Blocking client: logs, detections and the logger facade over one transport.
pub struct QuotientAI<T: Transport + 'static = BlockingHttpClient> {
    config: Config,
    logs: Arc<LogsResource<T>>,
    detections: Arc<DetectionsResource<T>>,
    logger: QuotientLogger<T>,
}

impl QuotientAI<BlockingHttpClient> {
    /// Builds a client from `QUOTIENT_*` environment variables.
    pub fn new() -> Result<Self> {
        Self::from_config(Config::from_env()?)
    }

    /// Must not be called from inside an async runtime; use [`AsyncQuotientAI`] there.
    pub fn from_config(config: Config) -> Result<Self> {
        let transport = BlockingHttpClient::new(config.client_config()?)?;
        Self::with_transport(Arc::new(transport), config)
    }
}

impl<T: Transport + 'static> QuotientAI<T> {
    pub fn with_transport(transport: Arc<T>, config: Config) -> Result<Self> {
        let logs = Arc::new(LogsResource::new(transport.clone(), config.delivery_config())?);
        let detections = Arc::new(DetectionsResource::new(transport, config.poll_settings()));
        let logger = QuotientLogger::new(logs.clone(), detections.clone());

        info!(base_url = %config.base_url, "quotientai client ready (v{})", crate::VERSION);
        Ok(Self {
            config,
            logs,
            detections,
            logger,
        })
    }

    pub fn logs(&self) -> &LogsResource<T> {
        &self.logs
    }

    pub fn detections(&self) -> &DetectionsResource<T> {
        &self.detections
    }

    pub fn logger(&self) -> &QuotientLogger<T> {
        &self.logger
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Drains log delivery. Also runs when the client is dropped.
    pub fn shutdown(&self) -> ShutdownReport {
        self.logs.shutdown()
    }
}

/// Async client; delivery runs on tasks of the runtime it was built in.
pub struct AsyncQuotientAI<T: AsyncTransport + 'static = HttpClient> {
    config: Config,
    logs: Arc<AsyncLogsResource<T>>,
    detections: Arc<AsyncDetectionsResource<T>>,
    logger: AsyncQuotientLogger<T>,
}

impl AsyncQuotientAI<HttpClient> {
    /// Builds a client from `QUOTIENT_*` environment variables.
    pub fn new() -> Result<Self> {
        Self::from_config(Config::from_env()?)
    }

    /// Must be called from within a tokio runtime.
    pub fn from_config(config: Config) -> Result<Self> {
        let transport = HttpClient::new(config.client_config()?)?;
        Self::with_transport(Arc::new(transport), config)
    }
}

impl<T: AsyncTransport + 'static> AsyncQuotientAI<T> {
    pub fn with_transport(transport: Arc<T>, config: Config) -> Result<Self> {
        let logs = Arc::new(AsyncLogsResource::new(transport.clone(), config.delivery_config())?);
        let detections = Arc::new(AsyncDetectionsResource::new(transport, config.poll_settings()));
        let logger = AsyncQuotientLogger::new(logs.clone(), detections.clone());

        info!(base_url = %config.base_url, "quotientai async client ready (v{})", crate::VERSION);
        Ok(Self {
            config,
            logs,
            detections,
            logger,
        })
    }

    pub fn logs(&self) -> &AsyncLogsResource<T> {
        &self.logs
    }

    pub fn detections(&self) -> &AsyncDetectionsResource<T> {
        &self.detections
    }

    pub fn logger(&self) -> &AsyncQuotientLogger<T> {
        &self.logger
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Waits for in-flight deliveries. Dropping the client cannot do this.
    pub async fn shutdown(&self) -> ShutdownReport {
        self.logs.shutdown().await
    }
}
