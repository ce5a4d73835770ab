//! Storefront error types.

use casa_cache::CacheError;
use casa_data::QueryError;
use http::StatusCode;
use thiserror::Error;

/// Result type for storefront operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by admin mutations and strict reads.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend query failed after retries.
    #[error("query failed: {0}")]
    Query(#[from] QueryError),

    /// Cache write failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input rejected before reaching the backend.
    #[error("validation error: {0}")]
    Validation(String),

    /// No row matched.
    #[error("{resource} not found: {id}")]
    NotFound { resource: &'static str, id: u64 },

    /// A write succeeded but returned no rows.
    #[error("{0} write returned no rows")]
    EmptyWrite(&'static str),
}

impl StoreError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// HTTP status to answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Query(e) if e.is_retryable() => StatusCode::SERVICE_UNAVAILABLE,
            Self::Query(_) => StatusCode::BAD_GATEWAY,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Cache(_) | Self::Serialization(_) | Self::EmptyWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
