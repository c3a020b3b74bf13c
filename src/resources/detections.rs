use crate::domain::Detection;
use crate::sender::{AsyncTransport, ClientError, Transport};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use url::form_urlencoded;

/// Runtime-closed errors tolerated by the async poller before it gives up.
pub const MAX_RUNTIME_CLOSED_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            interval: Duration::from_secs(2),
        }
    }
}

// The id is a single path segment; `/`, `?` and `#` must not escape it.
fn rca_path(log_id: &str) -> String {
    let segment: String = form_urlencoded::byte_serialize(log_id.as_bytes())
        .map(|chunk| if chunk == "+" { "%20" } else { chunk })
        .collect();
    format!("/logs/{segment}/rca")
}

/// Interprets one poll response. `Some` only for a terminal detection.
fn terminal_detection(log_id: &str, response: &Value) -> Option<Detection> {
    match Detection::from_rca_response(response) {
        Ok(Some(detection)) if detection.is_terminal() => Some(detection),
        Ok(Some(detection)) => {
            debug!(
                log_id,
                status = detection.status.map(|s| s.as_str()).unwrap_or("unknown"),
                "Detection not ready"
            );
            None
        }
        Ok(None) => {
            debug!(log_id, "Detection response carried no log yet");
            None
        }
        Err(e) => {
            error!(log_id, error = %e, "Error getting detection results");
            None
        }
    }
}

fn timed_out(log_id: &str, timeout: Duration) {
    error!(
        log_id,
        timeout_secs = timeout.as_secs_f64(),
        "Timed out waiting for detection results"
    );
}

/// Blocking detection poller.
pub struct DetectionsResource<T> {
    transport: Arc<T>,
    defaults: PollSettings,
}

impl<T: Transport> DetectionsResource<T> {
    pub fn new(transport: Arc<T>, defaults: PollSettings) -> Self {
        Self { transport, defaults }
    }

    pub fn defaults(&self) -> PollSettings {
        self.defaults
    }

    /// Polls with the configured timeout and interval.
    pub fn poll_default(&self, log_id: &str) -> Option<Detection> {
        self.poll(log_id, self.defaults.timeout, self.defaults.interval)
    }

    /// Fetches detection status until it is terminal or `timeout` elapses.
    ///
    /// Transport and decode errors are logged and polling continues. Blocks
    /// the calling thread for up to `timeout`.
    pub fn poll(
        &self,
        log_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<Detection> {
        if log_id.trim().is_empty() {
            error!("Log ID is required for detection polling");
            return None;
        }

        let path = rca_path(log_id);
        let start = std::time::Instant::now();

        while start.elapsed() < timeout {
            match self.transport.get(&path, &[]) {
                Ok(response) => {
                    if let Some(detection) = terminal_detection(log_id, &response) {
                        return Some(detection);
                    }
                }
                Err(e) => error!(log_id, error = %e, "Error getting detection results"),
            }
            std::thread::sleep(poll_interval);
        }

        timed_out(log_id, timeout);
        None
    }
}

/// Async detection poller.
pub struct AsyncDetectionsResource<T> {
    transport: Arc<T>,
    defaults: PollSettings,
}

impl<T: AsyncTransport> AsyncDetectionsResource<T> {
    pub fn new(transport: Arc<T>, defaults: PollSettings) -> Self {
        Self { transport, defaults }
    }

    pub fn defaults(&self) -> PollSettings {
        self.defaults
    }

    pub async fn poll_default(&self, log_id: &str) -> Option<Detection> {
        self.poll(log_id, self.defaults.timeout, self.defaults.interval).await
    }

    /// Async counterpart of [`DetectionsResource::poll`].
    ///
    /// Gives up early once more than [`MAX_RUNTIME_CLOSED_RETRIES`]
    /// runtime-closed errors have been seen.
    pub async fn poll(
        &self,
        log_id: &str,
        timeout: Duration,
        poll_interval: Duration,
    ) -> Option<Detection> {
        if log_id.trim().is_empty() {
            error!("Log ID is required for detection polling");
            return None;
        }

        let path = rca_path(log_id);
        let start = tokio::time::Instant::now();
        let mut runtime_closed = 0u32;

        while start.elapsed() < timeout {
            match self.transport.get(&path, &[]).await {
                Ok(response) => {
                    if let Some(detection) = terminal_detection(log_id, &response) {
                        return Some(detection);
                    }
                }
                Err(ClientError::RuntimeClosed(reason)) => {
                    runtime_closed += 1;
                    info!(
                        log_id,
                        attempt = runtime_closed,
                        max_retries = MAX_RUNTIME_CLOSED_RETRIES,
                        reason = %reason,
                        "Runtime closed during polling, retrying"
                    );
                    if runtime_closed > MAX_RUNTIME_CLOSED_RETRIES {
                        error!(
                            log_id,
                            "Maximum retries exceeded for runtime errors, aborting polling"
                        );
                        return None;
                    }
                }
                Err(e) => error!(log_id, error = %e, "Error getting detection results"),
            }
            tokio::time::sleep(poll_interval).await;
        }

        timed_out(log_id, timeout);
        None
    }
}
