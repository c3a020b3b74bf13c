use super::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use uuid::Uuid;

/// Free-form tags attached to a log. Values must be JSON scalars.
pub type Tags = HashMap<String, Value>;

/// Kinds of detection the service can run on a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    Hallucination,
    DocumentRelevancy,
}

impl DetectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionType::Hallucination => "hallucination",
            DetectionType::DocumentRelevancy => "document_relevancy",
        }
    }
}

/// A retrieved document with optional metadata, shaped like a LangChain `Document`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogDocument {
    pub page_content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl LogDocument {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Parses an untyped document entry.
    ///
    /// Accepts a JSON string or an object with a string `page_content` and an
    /// optional object `metadata`.
    pub fn from_value(index: usize, value: &Value) -> Result<Document, ValidationError> {
        let malformed = |reason: &str| ValidationError::MalformedDocument {
            index,
            reason: reason.to_string(),
        };

        match value {
            Value::String(text) => Ok(Document::Text(text.clone())),
            Value::Object(fields) => {
                let page_content = match fields.get("page_content") {
                    Some(Value::String(content)) => content.clone(),
                    Some(_) => return Err(malformed("page_content must be a string")),
                    None => return Err(malformed("missing page_content")),
                };
                let metadata = match fields.get("metadata") {
                    None | Some(Value::Null) => None,
                    Some(Value::Object(metadata)) => Some(metadata.clone()),
                    Some(_) => return Err(malformed("metadata must be an object")),
                };
                Ok(Document::Structured(LogDocument {
                    page_content,
                    metadata,
                }))
            }
            _ => Err(malformed("expected a string or an object")),
        }
    }
}

/// A document entry: either raw text or a structured `LogDocument`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Document {
    Text(String),
    Structured(LogDocument),
}

impl From<&str> for Document {
    fn from(text: &str) -> Self {
        Document::Text(text.to_string())
    }
}

impl From<String> for Document {
    fn from(text: String) -> Self {
        Document::Text(text)
    }
}

impl From<LogDocument> for Document {
    fn from(document: LogDocument) -> Self {
        Document::Structured(document)
    }
}

/// One turn of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Caller-supplied fields of a log, before identity and timestamp are assigned.
#[derive(Debug, Clone, Default)]
pub struct CreateLog {
    pub app_name: String,
    pub environment: String,
    pub detections: Vec<DetectionType>,
    pub detection_sample_rate: f64,
    pub user_query: Option<String>,
    pub model_output: Option<String>,
    pub documents: Option<Vec<Document>>,
    pub message_history: Option<Vec<Message>>,
    pub instructions: Option<Vec<String>>,
    pub tags: Option<Tags>,
}

impl CreateLog {
    pub fn new(app_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            environment: environment.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.app_name.trim().is_empty() {
            return Err(ValidationError::EmptyAppName);
        }
        if self.environment.trim().is_empty() {
            return Err(ValidationError::EmptyEnvironment);
        }
        validate_sample_rate("detection_sample_rate", self.detection_sample_rate)?;

        let has_text =
            |field: &Option<String>| field.as_deref().is_some_and(|s| !s.trim().is_empty());

        for detection in &self.detections {
            match detection {
                DetectionType::Hallucination => {
                    if !has_text(&self.user_query) {
                        return Err(ValidationError::MissingField {
                            detection: detection.as_str(),
                            field: "user_query",
                        });
                    }
                    if !has_text(&self.model_output) {
                        return Err(ValidationError::MissingField {
                            detection: detection.as_str(),
                            field: "model_output",
                        });
                    }
                }
                DetectionType::DocumentRelevancy => {
                    if !has_text(&self.user_query) {
                        return Err(ValidationError::MissingField {
                            detection: detection.as_str(),
                            field: "user_query",
                        });
                    }
                    if self.documents.as_ref().is_none_or(|docs| docs.is_empty()) {
                        return Err(ValidationError::MissingField {
                            detection: detection.as_str(),
                            field: "documents",
                        });
                    }
                }
            }
        }

        for (index, document) in self.documents.iter().flatten().enumerate() {
            if let Document::Structured(doc) = document
                && doc.page_content.trim().is_empty()
            {
                return Err(ValidationError::MalformedDocument {
                    index,
                    reason: "page_content must not be empty".to_string(),
                });
            }
        }

        for (index, message) in self.message_history.iter().flatten().enumerate() {
            if message.role.trim().is_empty() {
                return Err(ValidationError::EmptyMessageRole { index });
            }
        }

        for (key, value) in self.tags.iter().flatten() {
            if value.is_array() || value.is_object() {
                return Err(ValidationError::NonScalarTag { key: key.clone() });
            }
        }

        Ok(())
    }
}

pub(crate) fn validate_sample_rate(field: &'static str, value: f64) -> Result<(), ValidationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidSampleRate { field, value })
    }
}

/// A validated log with its client-side identity.
///
/// The id and `created_at` are assigned when the record is built, before any
/// network I/O, so callers can hold on to the id immediately. Fields are
/// read-only after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    id: String,
    created_at: DateTime<Utc>,
    app_name: String,
    environment: String,
    tags: Tags,
    detections: Vec<DetectionType>,
    detection_sample_rate: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model_output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    documents: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    message_history: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    instructions: Option<Vec<String>>,
}

impl LogRecord {
    /// Validates the request and stamps it with a fresh UUID v4 and the current UTC time.
    pub fn build(request: CreateLog) -> Result<Self, ValidationError> {
        request.validate()?;

        // Ordered set: keep first occurrence of each detection.
        let mut detections = Vec::with_capacity(request.detections.len());
        for detection in request.detections {
            if !detections.contains(&detection) {
                detections.push(detection);
            }
        }

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            app_name: request.app_name,
            environment: request.environment,
            tags: request.tags.unwrap_or_default(),
            detections,
            detection_sample_rate: request.detection_sample_rate,
            user_query: request.user_query,
            model_output: request.model_output,
            documents: request.documents,
            message_history: request.message_history,
            instructions: request.instructions,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn detections(&self) -> &[DetectionType] {
        &self.detections
    }

    pub fn detection_sample_rate(&self) -> f64 {
        self.detection_sample_rate
    }

    pub fn user_query(&self) -> Option<&str> {
        self.user_query.as_deref()
    }

    pub fn model_output(&self) -> Option<&str> {
        self.model_output.as_deref()
    }

    pub fn documents(&self) -> Option<&[Document]> {
        self.documents.as_deref()
    }

    pub fn message_history(&self) -> Option<&[Message]> {
        self.message_history.as_deref()
    }

    pub fn instructions(&self) -> Option<&[String]> {
        self.instructions.as_deref()
    }

    /// JSON body for `POST /logs`. Absent optional fields are omitted.
    pub fn to_payload(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
