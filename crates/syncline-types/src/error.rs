//! Structured error model for connector operations.
//!
//! [`ConnectorError`] carries a category, a stable code and optional
//! diagnostic details. Construct via category-specific factory methods.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad classification of a connector error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[non_exhaustive]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Invalid or missing connector configuration.
    Config,
    /// Authentication failure.
    Auth,
    /// Insufficient permissions.
    Permission,
    /// Rate limit exceeded (retryable).
    RateLimit,
    /// Transient network error (retryable).
    TransientNetwork,
    /// Invalid, unexpected or undecodable data.
    Data,
    /// Schema definition problem.
    Schema,
    /// Internal connector or runtime error, including contained panics.
    Internal,
    /// The stream was cancelled because a sibling failed.
    Cancelled,
    /// Writing to the output sink failed.
    Output,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Auth => "auth",
            Self::Permission => "permission",
            Self::RateLimit => "rate_limit",
            Self::TransientNetwork => "transient_network",
            Self::Data => "data",
            Self::Schema => "schema",
            Self::Internal => "internal",
            Self::Cancelled => "cancelled",
            Self::Output => "output",
        };
        f.write_str(s)
    }
}

/// Structured error from a connector operation.
///
/// Construct via category-specific factory methods (e.g., [`ConnectorError::config`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("[{category}] {code}: {message}")]
pub struct ConnectorError {
    pub category: ErrorCategory,
    pub code: String,
    pub message: String,
    pub retryable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ConnectorError {
    fn new(
        category: ErrorCategory,
        retryable: bool,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retryable,
            retry_after_ms: None,
            details: None,
        }
    }

    /// Configuration error (not retryable).
    #[must_use]
    pub fn config(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Config, false, code, message)
    }

    /// Authentication error (not retryable).
    #[must_use]
    pub fn auth(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Auth, false, code, message)
    }

    /// Permission error (not retryable).
    #[must_use]
    pub fn permission(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Permission, false, code, message)
    }

    /// Rate limit error (retryable).
    #[must_use]
    pub fn rate_limit(
        code: impl Into<String>,
        message: impl Into<String>,
        retry_after_ms: Option<u64>,
    ) -> Self {
        let mut err = Self::new(ErrorCategory::RateLimit, true, code, message);
        err.retry_after_ms = retry_after_ms;
        err
    }

    /// Transient network error (retryable).
    #[must_use]
    pub fn transient_network(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::TransientNetwork, true, code, message)
    }

    /// Data error (not retryable).
    #[must_use]
    pub fn data(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Data, false, code, message)
    }

    /// Schema definition error (not retryable).
    #[must_use]
    pub fn schema(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Schema, false, code, message)
    }

    /// Internal error (not retryable).
    #[must_use]
    pub fn internal(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, false, code, message)
    }

    /// Cancellation observed before or during a request.
    #[must_use]
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Cancelled, false, "CANCELLED", message)
    }

    /// Output sink write failure.
    #[must_use]
    pub fn output(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Output, false, code, message)
    }

    /// Attach structured diagnostic details.
    #[must_use]
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Whether this error only reports that the stream was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.category == ErrorCategory::Cancelled
    }

    /// Stack trace captured when this error was converted from a panic.
    pub fn backtrace(&self) -> Option<&str> {
        self.details.as_ref()?.get("backtrace")?.as_str()
    }
}

impl From<std::io::Error> for ConnectorError {
    fn from(err: std::io::Error) -> Self {
        Self::output("WRITE_FAILED", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_defaults() {
        let err = ConnectorError::config("MISSING_CONFIG", "expected config");
        assert_eq!(err.category, ErrorCategory::Config);
        assert!(!err.retryable);
        assert!(err.retry_after_ms.is_none());
    }

    #[test]
    fn transient_errors_are_retryable() {
        let net = ConnectorError::transient_network("HTTP_503", "unavailable");
        assert!(net.retryable);

        let limited = ConnectorError::rate_limit("HTTP_429", "slow down", Some(5000));
        assert!(limited.retryable);
        assert_eq!(limited.retry_after_ms, Some(5000));
    }

    #[test]
    fn backtrace_is_read_from_details() {
        let err = ConnectorError::internal("PANIC", "panic: boom")
            .with_details(serde_json::json!({"backtrace": "0: run_stream"}));
        assert_eq!(err.backtrace(), Some("0: run_stream"));
        assert_eq!(ConnectorError::internal("PANIC", "boom").backtrace(), None);
        let other = ConnectorError::data("BAD", "bad").with_details(serde_json::json!({"row": 3}));
        assert_eq!(other.backtrace(), None);
    }

    #[test]
    fn cancelled_is_detected() {
        assert!(ConnectorError::cancelled("stream cancelled").is_cancelled());
        assert!(!ConnectorError::internal("PANIC", "boom").is_cancelled());
    }

    #[test]
    fn io_errors_become_output_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err = ConnectorError::from(io);
        assert_eq!(err.category, ErrorCategory::Output);
        assert_eq!(err.code, "WRITE_FAILED");
    }

    #[test]
    fn serde_roundtrip() {
        let err = ConnectorError::rate_limit("THROTTLED", "slow down", Some(5000))
            .with_details(serde_json::json!({"endpoint": "/api/data"}));
        let json = serde_json::to_string(&err).unwrap();
        let back: ConnectorError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }

    #[test]
    fn display_format() {
        let err = ConnectorError::auth("HTTP_401", "invalid token");
        assert_eq!(err.to_string(), "[auth] HTTP_401: invalid token");
    }
}
