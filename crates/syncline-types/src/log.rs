//! Stream-scoped log entries.
//!
//! Errors are always rendered to text before they reach a [`LogRecord`],
//! so a log line never carries a non-serializable error object.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConnectorError;

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Body of a log entry: plain text or a structured JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LogPayload {
    Message(String),
    Value(Value),
}

impl LogPayload {
    /// Render the payload as a single line of text.
    pub fn to_text(&self) -> String {
        match self {
            Self::Message(s) => s.clone(),
            Self::Value(Value::String(s)) => s.clone(),
            Self::Value(v) => v.to_string(),
        }
    }
}

/// A log entry emitted on a stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub level: LogLevel,
    pub payload: LogPayload,
}

impl LogRecord {
    pub fn new(level: LogLevel, payload: LogPayload) -> Self {
        Self { level, payload }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, LogPayload::Message(message.into()))
    }

    pub fn warn(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, LogPayload::Message(message.into()))
    }

    /// Error entry carrying the error's display text.
    pub fn error(err: &dyn std::error::Error) -> Self {
        Self::new(LogLevel::Error, LogPayload::Message(err.to_string()))
    }

    /// Error entry for a stream failure.
    ///
    /// Plain text, unless the error carries a panic backtrace: then the
    /// payload is `{"error": <text>, "backtrace": <trace>}`.
    pub fn failure(err: &ConnectorError) -> Self {
        match err.backtrace() {
            Some(trace) => Self::value(
                LogLevel::Error,
                serde_json::json!({ "error": err.to_string(), "backtrace": trace }),
            ),
            None => Self::error(err),
        }
    }

    /// Entry with a structured payload.
    pub fn value(level: LogLevel, value: Value) -> Self {
        Self::new(level, LogPayload::Value(value))
    }
}
