//! Domain layer for the quotientai SDK.
//!
//! Contains the canonical types shared across all modules:
//! - `LogRecord`: the unit of work handed to the delivery pipeline
//! - `Detection` / `Log`: polled detection results and the log they belong to
//! - `ValidationError` / `QuotientError`: submission-time and top-level errors

pub mod detection;
pub mod error;
pub mod log_record;

pub use detection::{Detection, Log, LogStatus};
pub use error::{QuotientError, Result, ValidationError};
pub use log_record::{CreateLog, DetectionType, Document, LogDocument, LogRecord, Message, Tags};
