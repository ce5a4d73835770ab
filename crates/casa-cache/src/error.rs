//! Cache error types.

use std::time::Duration;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by cache writes.
///
/// Reads never fail: a missing, expired or undecodable entry is `None`.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// TTL must be positive.
    #[error("invalid ttl {0:?}: must be greater than zero")]
    InvalidTtl(Duration),

    /// Failed to serialize the value.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
