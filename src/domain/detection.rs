use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;

/// Processing state of a log on the detection service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogStatus {
    LogNotFound,
    LogCreationInProgress,
    LogCreatedNoDetectionsPending,
    LogCreatedAndDetectionInProgress,
    LogCreatedAndDetectionCompleted,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogStatus::LogNotFound => "log_not_found",
            LogStatus::LogCreationInProgress => "log_creation_in_progress",
            LogStatus::LogCreatedNoDetectionsPending => "log_created_no_detections_pending",
            LogStatus::LogCreatedAndDetectionInProgress => "log_created_and_detection_in_progress",
            LogStatus::LogCreatedAndDetectionCompleted => "log_created_and_detection_completed",
        }
    }

    /// No further state change is expected after a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LogStatus::LogCreatedNoDetectionsPending | LogStatus::LogCreatedAndDetectionCompleted
        )
    }
}

impl FromStr for LogStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "log_not_found" => Ok(LogStatus::LogNotFound),
            "log_creation_in_progress" => Ok(LogStatus::LogCreationInProgress),
            "log_created_no_detections_pending" => Ok(LogStatus::LogCreatedNoDetectionsPending),
            "log_created_and_detection_in_progress" => {
                Ok(LogStatus::LogCreatedAndDetectionInProgress)
            }
            "log_created_and_detection_completed" => Ok(LogStatus::LogCreatedAndDetectionCompleted),
            other => Err(format!("unknown log status: {other}")),
        }
    }
}

impl std::fmt::Display for LogStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A log as stored by the service.
///
/// Documents and message history are kept as raw JSON because the service
/// may enrich them with fields this SDK does not model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub id: String,
    pub app_name: String,
    pub environment: String,
    #[serde(default)]
    pub detections: Option<Vec<String>>,
    #[serde(default)]
    pub detection_sample_rate: Option<f64>,
    #[serde(default)]
    pub hallucination_detection: Option<bool>,
    #[serde(default)]
    pub inconsistency_detection: Option<bool>,
    #[serde(default)]
    pub user_query: Option<String>,
    #[serde(default)]
    pub model_output: Option<String>,
    #[serde(default)]
    pub documents: Option<Vec<Value>>,
    #[serde(default)]
    pub message_history: Option<Vec<Value>>,
    #[serde(default)]
    pub instructions: Option<Vec<String>>,
    #[serde(default)]
    pub tags: Option<HashMap<String, Value>>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_status")]
    pub status: Option<LogStatus>,
    #[serde(default)]
    pub has_hallucination: Option<bool>,
    #[serde(default)]
    pub has_inconsistency: Option<bool>,
}

/// Detection results for a previously created log.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub id: String,
    pub status: Option<LogStatus>,
    pub has_hallucination: Option<bool>,
    pub has_inconsistency: Option<bool>,
    pub evaluations: Vec<Value>,
    pub log_documents: Option<Vec<Value>>,
    pub log_message_history: Option<Vec<Value>>,
    pub log_instructions: Option<Vec<Value>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub log: Log,
}

#[derive(Deserialize)]
struct RcaResponse {
    log: Log,
    #[serde(default)]
    evaluations: Option<Vec<Value>>,
    #[serde(default)]
    log_documents: Option<Vec<Value>>,
    #[serde(default)]
    log_message_history: Option<Vec<Value>>,
    #[serde(default)]
    log_instructions: Option<Vec<Value>>,
}

impl Detection {
    /// Decodes a `GET /logs/{id}/rca` response.
    ///
    /// Returns `Ok(None)` when the response carries no `log` object yet.
    pub fn from_rca_response(response: &Value) -> Result<Option<Self>, serde_json::Error> {
        match response.get("log") {
            Some(log) if !log.is_null() => {}
            _ => return Ok(None),
        }

        let rca = RcaResponse::deserialize(response)?;
        let log = rca.log;

        Ok(Some(Self {
            id: log.id.clone(),
            status: log.status,
            has_hallucination: log.has_hallucination,
            has_inconsistency: log.has_inconsistency,
            evaluations: rca.evaluations.unwrap_or_default(),
            log_documents: rca.log_documents,
            log_message_history: rca.log_message_history,
            log_instructions: rca.log_instructions,
            updated_at: log.updated_at,
            log,
        }))
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(|status| status.is_terminal())
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // The service sometimes omits the offset; those timestamps are UTC.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

fn deserialize_optional_timestamp<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}"))),
    }
}

// Unrecognized statuses are treated as "not yet terminal" rather than a decode failure.
fn deserialize_status<'de, D>(deserializer: D) -> Result<Option<LogStatus>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|status| status.parse().ok()))
}
