//! Backend errors and their retry classification.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Error as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    /// Human-readable message.
    pub message: String,
    /// Backend error code (Postgres SQLSTATE, PostgREST code, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Extra detail text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// HTTP status of the response carrying the error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl BackendError {
    /// Create an error with only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            details: None,
            status: None,
        }
    }

    /// Set the error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the detail text.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Set the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Retry class of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// Network or connection failure.
    Connection,
    /// Did not settle in time.
    Timeout,
    /// Validation, not found, permission denied, malformed input.
    Fatal,
}

impl ErrorClass {
    /// Only connection and timeout failures are retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection | Self::Timeout)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connection => write!(f, "connection"),
            Self::Timeout => write!(f, "timeout"),
            Self::Fatal => write!(f, "fatal"),
        }
    }
}

const TIMEOUT_PATTERNS: &[&str] = &["timeout", "timed out", "etimedout"];

const CONNECTION_PATTERNS: &[&str] = &[
    "network",
    "connection",
    "failed to fetch",
    "fetch failed",
    "econnrefused",
    "econnreset",
    "socket hang up",
    "service unavailable",
];

/// Postgres `query_canceled`, raised by `statement_timeout`.
const PG_QUERY_CANCELED: &str = "57014";

/// Classify a backend error by message, code and HTTP status.
pub fn classify(err: &BackendError) -> ErrorClass {
    let message = err.message.to_lowercase();
    let code = err.code.as_deref().unwrap_or_default();

    if code == PG_QUERY_CANCELED || TIMEOUT_PATTERNS.iter().any(|p| message.contains(p)) {
        return ErrorClass::Timeout;
    }

    // SQLSTATE class 08: connection exception.
    if code.starts_with("08")
        || matches!(err.status, Some(502..=504))
        || CONNECTION_PATTERNS.iter().any(|p| message.contains(p))
    {
        return ErrorClass::Connection;
    }

    ErrorClass::Fatal
}

/// Error surfaced by a backend query after retries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    #[error("connection error: {message}")]
    Connection { message: String },

    #[error("timeout: {message}")]
    Timeout { message: String },

    #[error("query failed: {message}")]
    Fatal {
        code: Option<String>,
        message: String,
    },
}

impl QueryError {
    /// A local attempt timeout.
    pub fn timed_out(after: Duration) -> Self {
        Self::Timeout {
            message: format!("attempt timed out after {}ms", after.as_millis()),
        }
    }

    /// A fatal error without a backend code.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            code: None,
            message: message.into(),
        }
    }

    /// The retry class.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Connection { .. } => ErrorClass::Connection,
            Self::Timeout { .. } => ErrorClass::Timeout,
            Self::Fatal { .. } => ErrorClass::Fatal,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        self.class().is_retryable()
    }

    /// Backend error code, for fatal errors that carry one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Fatal { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

impl From<BackendError> for QueryError {
    fn from(err: BackendError) -> Self {
        match classify(&err) {
            ErrorClass::Connection => Self::Connection {
                message: err.message,
            },
            ErrorClass::Timeout => Self::Timeout {
                message: err.message,
            },
            ErrorClass::Fatal => Self::Fatal {
                code: err.code,
                message: err.message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn class_of(message: &str) -> ErrorClass {
        classify(&BackendError::new(message))
    }

    // === Classification Tests ===

    #[test]
    fn test_timeout_messages() {
        assert_eq!(class_of("Request timeout"), ErrorClass::Timeout);
        assert_eq!(class_of("connection timed out"), ErrorClass::Timeout);
        assert_eq!(class_of("connect ETIMEDOUT 10.0.0.1:443"), ErrorClass::Timeout);
    }

    #[test]
    fn test_timeout_code() {
        let err = BackendError::new("canceling statement due to statement timeout").with_code("57014");
        assert_eq!(classify(&err), ErrorClass::Timeout);

        let err = BackendError::new("canceling statement").with_code("57014");
        assert_eq!(classify(&err), ErrorClass::Timeout);
    }

    #[test]
    fn test_connection_messages() {
        for message in [
            "NetworkError when attempting to fetch resource.",
            "TypeError: Failed to fetch",
            "fetch failed",
            "connect ECONNREFUSED 127.0.0.1:5432",
            "read ECONNRESET",
            "socket hang up",
            "Service Unavailable",
            "Connection terminated unexpectedly",
        ] {
            assert_eq!(class_of(message), ErrorClass::Connection, "{message}");
        }
    }

    #[test]
    fn test_connection_codes_and_statuses() {
        let err = BackendError::new("server closed the connection").with_code("08006");
        assert_eq!(classify(&err), ErrorClass::Connection);

        let err = BackendError::new("unexpected").with_code("08001");
        assert_eq!(classify(&err), ErrorClass::Connection);

        for status in [502, 503, 504] {
            let err = BackendError::new("upstream error").with_status(status);
            assert_eq!(classify(&err), ErrorClass::Connection);
        }
    }

    #[test]
    fn test_everything_else_fatal() {
        let err = BackendError::new("duplicate key value violates unique constraint").with_code("23505");
        assert_eq!(classify(&err), ErrorClass::Fatal);

        let err = BackendError::new("permission denied for table orders").with_code("42501");
        assert_eq!(classify(&err), ErrorClass::Fatal);

        let err = BackendError::new("not found").with_status(404);
        assert_eq!(classify(&err), ErrorClass::Fatal);

        let err = BackendError::new("Internal Server Error").with_status(500);
        assert_eq!(classify(&err), ErrorClass::Fatal);
    }

    // === QueryError Tests ===

    #[test]
    fn test_query_error_from_backend() {
        let err: QueryError = BackendError::new("fetch failed").into();
        assert_eq!(err.class(), ErrorClass::Connection);
        assert!(err.is_retryable());

        let err: QueryError = BackendError::new("Could not find a relationship")
            .with_code("PGRST200")
            .into();
        assert_eq!(err.class(), ErrorClass::Fatal);
        assert!(!err.is_retryable());
        assert_eq!(err.code(), Some("PGRST200"));
    }

    #[test]
    fn test_timed_out_is_retryable() {
        let err = QueryError::timed_out(Duration::from_secs(5));
        assert_eq!(err.class(), ErrorClass::Timeout);
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "timeout: attempt timed out after 5000ms");
    }

    #[test]
    fn test_backend_error_deserializes() {
        let err: BackendError = serde_json::from_str(
            r#"{"message":"relation \"public.x\" does not exist","code":"42P01"}"#,
        )
        .unwrap();
        assert_eq!(err.code.as_deref(), Some("42P01"));
        assert_eq!(err.status, None);
        assert_eq!(classify(&err), ErrorClass::Fatal);
    }
}
