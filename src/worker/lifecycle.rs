use super::{DeliveryConfig, LogDelivery};
use super::thread::{DeliveryWorker, WorkerState};
use crate::sender::Transport;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one shutdown call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShutdownReport {
    /// A previous call already ran the full shutdown sequence.
    pub already_shut_down: bool,
    /// The pipeline emptied before the shutdown timeout.
    pub drained: bool,
    /// The worker thread (or every delivery task) finished.
    pub worker_stopped: bool,
    /// Records delivered synchronously by the shutdown path.
    pub forced: usize,
    /// Records or tasks still outstanding when shutdown returned.
    pub abandoned: usize,
}

/// Flushes a [`DeliveryWorker`] on shutdown.
///
/// Owned by the logs resource and invoked from its `Drop`; calling
/// [`shutdown`](Self::shutdown) manually first is fine.
pub struct LifecycleManager<T> {
    worker: Arc<DeliveryWorker<T>>,
    config: DeliveryConfig,
    shut_down: AtomicBool,
}

impl<T: Transport> LifecycleManager<T> {
    pub fn new(worker: Arc<DeliveryWorker<T>>, config: DeliveryConfig) -> Self {
        Self {
            worker,
            config,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    pub fn shutdown(&self) -> ShutdownReport {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return self.shutdown_again();
        }

        let start = Instant::now();
        let channel = self.worker.channel();
        let timeout = self.config.shutdown_timeout;

        let drained = if channel.is_empty() && channel.is_drained() {
            true
        } else if channel.is_empty() {
            // Worker is delivering the last popped record.
            channel.wait_drained(timeout)
        } else {
            self.worker.request_stop();
            channel.wait_drained(timeout)
        };

        // Stop is requested on every path so the thread never outlives the resource.
        self.worker.request_stop();

        let mut forced = 0;
        if !drained && !channel.is_empty() {
            warn!(
                remaining = channel.len(),
                "Timeout waiting for log queue to empty during shutdown"
            );
            forced = self.worker.drain_now();
        }

        let worker_stopped = self.worker.join_timeout(self.config.join_timeout);
        if !worker_stopped {
            warn!("Worker thread did not terminate during shutdown");
        }

        let stats = self.worker.stats();
        info!(
            delivered = stats.delivered,
            failed = stats.failed,
            forced,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Log delivery shut down"
        );

        ShutdownReport {
            already_shut_down: false,
            drained,
            worker_stopped,
            forced,
            abandoned: channel.len(),
        }
    }

    // Records enqueued after the first shutdown are delivered here, on the caller's thread.
    fn shutdown_again(&self) -> ShutdownReport {
        let forced = self.worker.drain_now();
        if forced > 0 {
            debug!(forced, "Delivered logs enqueued after shutdown");
        }
        ShutdownReport {
            already_shut_down: true,
            drained: true,
            worker_stopped: self.worker.state() == WorkerState::Stopped,
            forced,
            abandoned: 0,
        }
    }
}

impl<T> std::fmt::Debug for LifecycleManager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager")
            .field("config", &self.config)
            .field("shut_down", &self.shut_down.load(Ordering::Relaxed))
            .finish()
    }
}
