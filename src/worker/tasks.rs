use super::lifecycle::ShutdownReport;
use super::stats::{DeliveryStats, DeliveryStatsSnapshot};
use super::{DeliveryConfig, LOGS_PATH, LogDelivery};
use crate::domain::{LogRecord, QuotientError};
use crate::sender::AsyncTransport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Delivers each record on its own tracked task.
///
/// Tasks are spawned on the runtime that was current at construction, so
/// `enqueue` can be called from any thread. Shutdown waits for every tracked
/// task up to the configured timeout.
pub struct TaskDelivery<T> {
    transport: Arc<T>,
    tracker: TaskTracker,
    handle: Handle,
    stats: Arc<DeliveryStats>,
    shutdown_timeout: Duration,
    shut_down: AtomicBool,
}

impl<T: AsyncTransport + 'static> TaskDelivery<T> {
    /// Must be called from within a tokio runtime.
    pub fn new(transport: Arc<T>, config: &DeliveryConfig) -> Result<Self, QuotientError> {
        let handle = Handle::try_current()
            .map_err(|e| QuotientError::Runtime(format!("no tokio runtime available: {e}")))?;
        Ok(Self::with_handle(transport, config, handle))
    }

    pub fn with_handle(transport: Arc<T>, config: &DeliveryConfig, handle: Handle) -> Self {
        Self {
            transport,
            tracker: TaskTracker::new(),
            handle,
            stats: Arc::new(DeliveryStats::default()),
            shutdown_timeout: config.shutdown_timeout,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Number of delivery tasks that have not finished yet.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Waits up to the shutdown timeout for every tracked delivery.
    ///
    /// Safe to call repeatedly; later calls also wait for records enqueued
    /// after the first one.
    pub async fn shutdown(&self) -> ShutdownReport {
        let already_shut_down = self.shut_down.swap(true, Ordering::AcqRel);
        self.tracker.close();

        let drained = tokio::time::timeout(self.shutdown_timeout, self.tracker.wait())
            .await
            .is_ok();
        let abandoned = self.tracker.len();
        if !drained {
            warn!(
                pending = abandoned,
                "Timeout waiting for log queue to empty during shutdown"
            );
        }

        if !already_shut_down {
            let stats = self.stats.snapshot();
            info!(
                delivered = stats.delivered,
                failed = stats.failed,
                abandoned,
                "Log delivery shut down"
            );
        }

        ShutdownReport {
            already_shut_down,
            drained,
            worker_stopped: drained,
            forced: 0,
            abandoned,
        }
    }
}

pub(crate) async fn deliver_async<T: AsyncTransport + ?Sized>(
    transport: &T,
    record: &LogRecord,
    stats: &DeliveryStats,
) -> bool {
    let payload = match record.to_payload() {
        Ok(payload) => payload,
        Err(e) => {
            stats.record_failed();
            error!(log_id = record.id(), error = %e, "Failed to serialize log");
            return false;
        }
    };

    match transport.post(LOGS_PATH, &payload).await {
        Ok(_) => {
            stats.record_delivered();
            debug!(log_id = record.id(), "Log delivered");
            true
        }
        Err(e) => {
            stats.record_failed();
            error!(
                log_id = record.id(),
                app_name = record.app_name(),
                environment = record.environment(),
                error = %e,
                "Failed to deliver log"
            );
            false
        }
    }
}

/// Counts a delivery task as failed if it is dropped before finishing.
///
/// Covers a panicking transport and a runtime that shut down before the
/// task was ever polled.
struct CompletionGuard {
    log_id: String,
    stats: Arc<DeliveryStats>,
    finished: bool,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.stats.record_failed();
            error!(log_id = %self.log_id, "Log delivery task dropped before completion");
        }
    }
}

impl<T: AsyncTransport + 'static> LogDelivery for TaskDelivery<T> {
    fn enqueue(&self, record: LogRecord) {
        self.stats.record_enqueued();
        let transport = self.transport.clone();
        let stats = self.stats.clone();
        let mut guard = CompletionGuard {
            log_id: record.id().to_string(),
            stats: self.stats.clone(),
            finished: false,
        };
        // A panicking transport only takes down its own task.
        self.tracker.spawn_on(
            async move {
                deliver_async(transport.as_ref(), &record, &stats).await;
                guard.finished = true;
            },
            &self.handle,
        );
    }

    fn stats(&self) -> DeliveryStatsSnapshot {
        self.stats.snapshot()
    }
}

impl<T> Drop for TaskDelivery<T> {
    fn drop(&mut self) {
        let pending = self.tracker.len();
        if pending > 0 && !self.shut_down.load(Ordering::Acquire) {
            warn!(
                pending,
                "Async log delivery dropped with deliveries in flight; await shutdown() to drain"
            );
        }
    }
}

impl<T> std::fmt::Debug for TaskDelivery<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskDelivery")
            .field("pending", &self.tracker.len())
            .field("shutdown_timeout", &self.shutdown_timeout)
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}
