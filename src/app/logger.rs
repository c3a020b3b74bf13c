use crate::domain::log_record::validate_sample_rate;
use crate::domain::{
    CreateLog, Detection, DetectionType, Document, Message, QuotientError, Result, Tags,
    ValidationError,
};
use crate::resources::{
    AsyncDetectionsResource, AsyncLogsResource, DetectionsResource, LogsResource,
};
use crate::sender::{AsyncTransport, Transport};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Defaults applied to every log sent through a logger.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggerOptions {
    pub app_name: String,
    pub environment: String,
    pub tags: Tags,
    /// Fraction of `log` calls that are submitted at all.
    pub sample_rate: f64,
    pub detections: Vec<DetectionType>,
    pub detection_sample_rate: f64,
}

impl LoggerOptions {
    pub fn new(app_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            environment: environment.into(),
            tags: Tags::new(),
            sample_rate: 1.0,
            detections: Vec::new(),
            detection_sample_rate: 0.0,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn detections(mut self, detections: impl IntoIterator<Item = DetectionType>) -> Self {
        self.detections = detections.into_iter().collect();
        self
    }

    pub fn detection_sample_rate(mut self, rate: f64) -> Self {
        self.detection_sample_rate = rate;
        self
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        if self.app_name.trim().is_empty() {
            return Err(ValidationError::EmptyAppName);
        }
        if self.environment.trim().is_empty() {
            return Err(ValidationError::EmptyEnvironment);
        }
        validate_sample_rate("sample_rate", self.sample_rate)?;
        validate_sample_rate("detection_sample_rate", self.detection_sample_rate)
    }
}

/// Per-call content of a log.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogInput {
    pub user_query: Option<String>,
    pub model_output: Option<String>,
    pub documents: Option<Vec<Document>>,
    pub message_history: Option<Vec<Message>>,
    pub instructions: Option<Vec<String>>,
    /// Merged over the logger's tags; these win on conflict.
    pub tags: Tags,
    /// Replaces the logger's detections when set.
    pub detections: Option<Vec<DetectionType>>,
}

impl LogInput {
    pub fn new(user_query: impl Into<String>, model_output: impl Into<String>) -> Self {
        Self {
            user_query: Some(user_query.into()),
            model_output: Some(model_output.into()),
            ..Self::default()
        }
    }

    pub fn documents(mut self, documents: impl IntoIterator<Item = impl Into<Document>>) -> Self {
        self.documents = Some(documents.into_iter().map(Into::into).collect());
        self
    }

    pub fn message_history(mut self, messages: Vec<Message>) -> Self {
        self.message_history = Some(messages);
        self
    }

    pub fn instructions(
        mut self,
        instructions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.instructions = Some(instructions.into_iter().map(Into::into).collect());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn detections(mut self, detections: impl IntoIterator<Item = DetectionType>) -> Self {
        self.detections = Some(detections.into_iter().collect());
        self
    }
}

fn should_sample(rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    rate > 0.0 && rand::random::<f64>() < rate
}

#[derive(Debug, Default)]
struct LoggerState {
    options: RwLock<Option<LoggerOptions>>,
}

impl LoggerState {
    fn init(&self, options: LoggerOptions) -> Result<()> {
        options.validate()?;
        *self.options.write() = Some(options);
        Ok(())
    }

    /// `Ok(None)` when the call is sampled out.
    fn prepare(&self, input: LogInput) -> Result<Option<CreateLog>> {
        let guard = self.options.read();
        let options = guard.as_ref().ok_or(QuotientError::NotConfigured)?;

        if !should_sample(options.sample_rate) {
            debug!(app_name = %options.app_name, "Log sampled out");
            return Ok(None);
        }

        let mut tags = options.tags.clone();
        tags.extend(input.tags);

        Ok(Some(CreateLog {
            app_name: options.app_name.clone(),
            environment: options.environment.clone(),
            detections: input.detections.unwrap_or_else(|| options.detections.clone()),
            detection_sample_rate: options.detection_sample_rate,
            user_query: input.user_query,
            model_output: input.model_output,
            documents: input.documents,
            message_history: input.message_history,
            instructions: input.instructions,
            tags: Some(tags),
        }))
    }

    fn options(&self) -> Option<LoggerOptions> {
        self.options.read().clone()
    }
}

/// Configure-once logging facade over [`LogsResource`].
pub struct QuotientLogger<T: Transport + 'static> {
    logs: Arc<LogsResource<T>>,
    detections: Arc<DetectionsResource<T>>,
    state: LoggerState,
}

impl<T: Transport + 'static> QuotientLogger<T> {
    pub fn new(logs: Arc<LogsResource<T>>, detections: Arc<DetectionsResource<T>>) -> Self {
        Self {
            logs,
            detections,
            state: LoggerState::default(),
        }
    }

    /// Sets the logger defaults. May be called again to reconfigure.
    pub fn init(&self, options: LoggerOptions) -> Result<&Self> {
        self.state.init(options)?;
        Ok(self)
    }

    pub fn is_configured(&self) -> bool {
        self.state.options.read().is_some()
    }

    pub fn options(&self) -> Option<LoggerOptions> {
        self.state.options()
    }

    /// Queues a log and returns its id, or `None` if it was sampled out or rejected.
    pub fn log(&self, input: LogInput) -> Result<Option<String>> {
        Ok(self.state.prepare(input)?.and_then(|request| self.logs.create(request)))
    }

    pub fn poll_for_detection(
        &self,
        log_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<Detection> {
        self.detections.poll(log_id, timeout, poll_interval)
    }
}

/// Async counterpart of [`QuotientLogger`].
pub struct AsyncQuotientLogger<T: AsyncTransport + 'static> {
    logs: Arc<AsyncLogsResource<T>>,
    detections: Arc<AsyncDetectionsResource<T>>,
    state: LoggerState,
}

impl<T: AsyncTransport + 'static> AsyncQuotientLogger<T> {
    pub fn new(
        logs: Arc<AsyncLogsResource<T>>,
        detections: Arc<AsyncDetectionsResource<T>>,
    ) -> Self {
        Self {
            logs,
            detections,
            state: LoggerState::default(),
        }
    }

    pub fn init(&self, options: LoggerOptions) -> Result<&Self> {
        self.state.init(options)?;
        Ok(self)
    }

    pub fn is_configured(&self) -> bool {
        self.state.options.read().is_some()
    }

    pub fn options(&self) -> Option<LoggerOptions> {
        self.state.options()
    }

    /// Never suspends; delivery happens on a background task.
    pub fn log(&self, input: LogInput) -> Result<Option<String>> {
        Ok(self.state.prepare(input)?.and_then(|request| self.logs.create(request)))
    }

    pub async fn poll_for_detection(
        &self,
        log_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<Detection> {
        self.detections.poll(log_id, timeout, poll_interval).await
    }
}
