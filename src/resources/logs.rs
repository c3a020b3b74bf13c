use crate::domain::{CreateLog, Log, LogRecord, QuotientError};
use crate::sender::{AsyncTransport, Transport};
use crate::worker::{
    DeliveryConfig, DeliveryStatsSnapshot, DeliveryWorker, LifecycleManager, LogDelivery,
    ShutdownReport, TaskDelivery,
};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

/// Filters for `GET /logs`. Unset fields are not sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListLogsQuery {
    pub app_name: Option<String>,
    pub environment: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ListLogsQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = Some(app_name.into());
        self
    }

    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    pub fn between(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.start_date = Some(start);
        self.end_date = Some(end);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(app_name) = &self.app_name {
            params.push(("app_name".to_string(), app_name.clone()));
        }
        if let Some(environment) = &self.environment {
            params.push(("environment".to_string(), environment.clone()));
        }
        if let Some(start) = &self.start_date {
            params.push((
                "start_date".to_string(),
                start.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        if let Some(end) = &self.end_date {
            params.push((
                "end_date".to_string(),
                end.to_rfc3339_opts(SecondsFormat::Secs, true),
            ));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset".to_string(), offset.to_string()));
        }
        params
    }
}

#[derive(Deserialize)]
struct LogsResponse {
    #[serde(default)]
    logs: Option<Vec<Log>>,
}

/// Decodes a `GET /logs` response. A null body or null `logs` is an empty page.
pub(crate) fn decode_logs(response: Value) -> Result<Vec<Log>, serde_json::Error> {
    if response.is_null() {
        return Ok(Vec::new());
    }
    let page: LogsResponse = serde_json::from_value(response)?;
    Ok(page.logs.unwrap_or_default())
}

// Validation failures are reported here and never reach the delivery path.
fn build_record(request: CreateLog) -> Option<LogRecord> {
    match LogRecord::build(request) {
        Ok(record) => Some(record),
        Err(e) => {
            error!(error = %e, "Rejected log request");
            None
        }
    }
}

/// Blocking logs API backed by a background [`DeliveryWorker`].
///
/// Dropping the resource runs the shutdown drain.
pub struct LogsResource<T: Transport + 'static> {
    transport: Arc<T>,
    worker: Arc<DeliveryWorker<T>>,
    lifecycle: LifecycleManager<T>,
}

impl<T: Transport + 'static> LogsResource<T> {
    pub fn new(transport: Arc<T>, config: DeliveryConfig) -> Result<Self, QuotientError> {
        let worker = DeliveryWorker::spawn(transport.clone(), &config)
            .map_err(|e| {
                QuotientError::Runtime(format!("failed to start log delivery worker: {e}"))
            })?;
        let worker = Arc::new(worker);
        let lifecycle = LifecycleManager::new(worker.clone(), config);

        Ok(Self {
            transport,
            worker,
            lifecycle,
        })
    }

    /// Validates the request, assigns its id and timestamp, and queues it.
    ///
    /// Returns immediately; the id is usable for polling right away.
    pub fn create(&self, request: CreateLog) -> Option<String> {
        let record = build_record(request)?;
        let id = record.id().to_string();
        debug!(log_id = %id, "Queued log");
        self.worker.enqueue(record);
        Some(id)
    }

    pub fn list(&self, query: &ListLogsQuery) -> Option<Vec<Log>> {
        let response = match self.transport.get(crate::worker::LOGS_PATH, &query.to_params()) {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "error listing logs");
                return None;
            }
        };
        match decode_logs(response) {
            Ok(logs) => Some(logs),
            Err(e) => {
                error!(error = %e, "error listing logs");
                None
            }
        }
    }

    pub fn shutdown(&self) -> ShutdownReport {
        self.lifecycle.shutdown()
    }

    pub fn stats(&self) -> DeliveryStatsSnapshot {
        self.worker.stats()
    }

    /// Records waiting in the channel.
    pub fn queued(&self) -> usize {
        self.worker.channel().len()
    }

    pub fn worker(&self) -> &DeliveryWorker<T> {
        &self.worker
    }
}

impl<T: Transport + 'static> Drop for LogsResource<T> {
    fn drop(&mut self) {
        self.lifecycle.shutdown();
    }
}

/// Async logs API; each record is delivered on its own tracked task.
///
/// Dropping without awaiting [`shutdown`](Self::shutdown) cannot drain and
/// only logs a warning when deliveries are still in flight.
pub struct AsyncLogsResource<T: AsyncTransport + 'static> {
    transport: Arc<T>,
    delivery: TaskDelivery<T>,
}

impl<T: AsyncTransport + 'static> AsyncLogsResource<T> {
    /// Must be called from within a tokio runtime.
    pub fn new(transport: Arc<T>, config: DeliveryConfig) -> Result<Self, QuotientError> {
        let delivery = TaskDelivery::new(transport.clone(), &config)?;
        Ok(Self { transport, delivery })
    }

    pub fn create(&self, request: CreateLog) -> Option<String> {
        let record = build_record(request)?;
        let id = record.id().to_string();
        debug!(log_id = %id, "Queued log");
        self.delivery.enqueue(record);
        Some(id)
    }

    pub async fn list(&self, query: &ListLogsQuery) -> Option<Vec<Log>> {
        let params = query.to_params();
        let response = match self.transport.get(crate::worker::LOGS_PATH, &params).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "error listing logs");
                return None;
            }
        };
        decode_logs(response)
            .inspect_err(|e| error!(error = %e, "error listing logs"))
            .ok()
    }

    pub async fn shutdown(&self) -> ShutdownReport {
        self.delivery.shutdown().await
    }

    pub fn stats(&self) -> DeliveryStatsSnapshot {
        self.delivery.stats()
    }

    /// Delivery tasks still running.
    pub fn pending(&self) -> usize {
        self.delivery.pending()
    }
}
