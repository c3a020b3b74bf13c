//! Public resource APIs: log submission and detection polling.

pub mod detections;
pub mod logs;

pub use detections::{
    AsyncDetectionsResource, DetectionsResource, MAX_RUNTIME_CLOSED_RETRIES, PollSettings,
};
pub use logs::{AsyncLogsResource, ListLogsQuery, LogsResource};
