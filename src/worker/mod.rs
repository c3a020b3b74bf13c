//! Non-blocking log delivery.
//!
//! Two implementations share one contract ([`LogDelivery`]): a dedicated
//! worker thread draining a [`DeliveryChannel`](crate::buffer::DeliveryChannel)
//! and a set of tracked tokio tasks, one per record. Both deliver each record
//! at most once and never surface delivery failures to the producer.

pub mod lifecycle;
pub mod stats;
pub mod tasks;
pub mod thread;

pub use lifecycle::{LifecycleManager, ShutdownReport};
pub use stats::{DeliveryStats, DeliveryStatsSnapshot};
pub use tasks::TaskDelivery;
pub use thread::{DeliveryWorker, WorkerState};

use crate::domain::LogRecord;
use std::time::Duration;

pub(crate) const LOGS_PATH: &str = "/logs";

/// Delivery contract shared by the thread and task implementations.
pub trait LogDelivery: Send + Sync {
    /// Hands a record to the pipeline. Never blocks on I/O and never fails.
    fn enqueue(&self, record: LogRecord);

    fn stats(&self) -> DeliveryStatsSnapshot;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryConfig {
    /// Sleep between checks while the channel is empty.
    pub idle_interval: Duration,
    /// Upper bound on waiting for the pipeline to drain at shutdown.
    pub shutdown_timeout: Duration,
    /// Upper bound on waiting for the worker thread to exit.
    pub join_timeout: Duration,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            idle_interval: Duration::from_millis(10),
            shutdown_timeout: Duration::from_secs(5),
            join_timeout: Duration::from_secs(1),
        }
    }
}
