use super::stats::{DeliveryStats, DeliveryStatsSnapshot};
use super::{DeliveryConfig, LOGS_PATH, LogDelivery};
use crate::buffer::DeliveryChannel;
use crate::domain::LogRecord;
use crate::sender::Transport;
use parking_lot::Mutex;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Draining,
    Stopped,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Draining,
            _ => WorkerState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Draining => 1,
            WorkerState::Stopped => 2,
        }
    }
}

struct Shared<T> {
    channel: DeliveryChannel<LogRecord>,
    transport: Arc<T>,
    stats: DeliveryStats,
    stop_requested: AtomicBool,
    state: AtomicU8,
}

impl<T: Transport> Shared<T> {
    fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }

    fn run(&self, idle_interval: Duration) {
        debug!("Log delivery worker started");
        loop {
            if !self.channel.is_empty() {
                self.set_state(WorkerState::Draining);
                self.channel.begin_drain();
                while let Some(record) = self.channel.pop() {
                    deliver(self.transport.as_ref(), &record, &self.stats);
                }
                self.channel.mark_drained();
                self.set_state(WorkerState::Idle);
                continue;
            }

            // Stop only once nothing is left, so a stop request never strands records.
            if self.stop_requested.load(Ordering::Acquire) {
                break;
            }
            thread::sleep(idle_interval);
        }
        self.set_state(WorkerState::Stopped);
        info!("Log delivery worker stopped");
    }
}

/// Sends one record through the transport, containing every failure.
///
/// Returns whether the service accepted the record. Errors and panics in
/// the transport are logged and counted, never propagated.
pub(crate) fn deliver<T: Transport + ?Sized>(
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

    match catch_unwind(AssertUnwindSafe(|| transport.post(LOGS_PATH, &payload))) {
        Ok(Ok(_)) => {
            stats.record_delivered();
            debug!(log_id = record.id(), "Log delivered");
            true
        }
        Ok(Err(e)) => {
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
        Err(_) => {
            stats.record_failed();
            error!(log_id = record.id(), "Transport panicked while delivering log");
            false
        }
    }
}

/// Single background thread that drains the channel for one resource.
pub struct DeliveryWorker<T> {
    shared: Arc<Shared<T>>,
    handle: Mutex<Option<JoinHandle<()>>>,
    // Disconnects when the worker thread exits, including by panic.
    exited: Mutex<mpsc::Receiver<()>>,
}

impl<T: Transport + 'static> DeliveryWorker<T> {
    pub fn spawn(transport: Arc<T>, config: &DeliveryConfig) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            channel: DeliveryChannel::new(),
            transport,
            stats: DeliveryStats::default(),
            stop_requested: AtomicBool::new(false),
            state: AtomicU8::new(WorkerState::Idle.as_u8()),
        });

        let (exit_tx, exit_rx) = mpsc::channel::<()>();
        let idle_interval = config.idle_interval;
        let worker_shared = shared.clone();
        let handle = thread::Builder::new()
            .name("quotient-log-worker".to_string())
            .spawn(move || {
                let _exit_guard = exit_tx;
                worker_shared.run(idle_interval);
            })?;

        Ok(Self {
            shared,
            handle: Mutex::new(Some(handle)),
            exited: Mutex::new(exit_rx),
        })
    }
}

impl<T: Transport> DeliveryWorker<T> {
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn channel(&self) -> &DeliveryChannel<LogRecord> {
        &self.shared.channel
    }

    /// Asks the worker to exit once the channel is empty.
    pub fn request_stop(&self) {
        self.shared.stop_requested.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.shared.stop_requested.load(Ordering::Acquire)
    }

    /// Pops and delivers every queued record on the calling thread.
    pub fn drain_now(&self) -> usize {
        let mut drained = 0;
        while let Some(record) = self.shared.channel.pop() {
            deliver(self.shared.transport.as_ref(), &record, &self.shared.stats);
            drained += 1;
        }
        self.shared.channel.mark_drained();
        self.shared.stats.record_drained_on_shutdown(drained as u64);
        drained
    }

    /// Waits up to `timeout` for the thread to exit and joins it.
    ///
    /// Returns `false` if the thread is still running; it is then left detached.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let mut handle = self.handle.lock();
        let Some(join_handle) = handle.take() else {
            return true;
        };

        match self.exited.lock().recv_timeout(timeout) {
            Err(RecvTimeoutError::Disconnected) | Ok(()) => {
                if join_handle.join().is_err() {
                    error!("Log delivery worker panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                *handle = Some(join_handle);
                false
            }
        }
    }
}

impl<T: Transport> LogDelivery for DeliveryWorker<T> {
    fn enqueue(&self, record: LogRecord) {
        self.shared.stats.record_enqueued();
        self.shared.channel.push(record);
    }

    fn stats(&self) -> DeliveryStatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl<T> std::fmt::Debug for DeliveryWorker<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryWorker")
            .field("channel", &self.shared.channel)
            .field("state", &WorkerState::from_u8(self.shared.state.load(Ordering::Relaxed)))
            .field("stop_requested", &self.shared.stop_requested.load(Ordering::Relaxed))
            .finish()
    }
}
