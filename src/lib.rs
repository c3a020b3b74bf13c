// Specific pedantic lints enforced (not blanket allow):
#![deny(
    clippy::explicit_iter_loop,
    clippy::manual_let_else,
    clippy::semicolon_if_nothing_returned,
    clippy::inconsistent_struct_constructor
)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Durations and counts stay far below the truncation bounds
    clippy::cast_precision_loss,      // Acceptable for stats and display
    clippy::missing_errors_doc,       // Error types document themselves
    clippy::missing_panics_doc,       // Library code does not panic
    clippy::module_name_repetitions,  // e.g. LogsResource in resources::logs
    clippy::must_use_candidate,       // Annotated selectively on critical APIs
    clippy::doc_markdown
)]

pub mod app;
pub mod buffer;
pub mod domain;
pub mod resources;
pub mod sender;
pub mod worker;

// Re-export main types for easy access
pub use app::{
    AsyncQuotientAI, AsyncQuotientLogger, Config, LogInput, LoggerOptions, QuotientAI,
    QuotientLogger,
};
pub use domain::{
    CreateLog, Detection, DetectionType, Document, Log, LogDocument, LogRecord, LogStatus, Message,
    QuotientError, Result, ValidationError,
};
pub use resources::{
    AsyncDetectionsResource, AsyncLogsResource, DetectionsResource, ListLogsQuery, LogsResource,
};
pub use sender::{AsyncTransport, BlockingHttpClient, ClientError, HttpClient, Transport};
pub use worker::{DeliveryConfig, DeliveryStatsSnapshot, LogDelivery, ShutdownReport};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
