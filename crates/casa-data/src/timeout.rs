//! Timeout configuration for backend queries.

use std::future::Future;
use std::time::Duration;

use casa_core::QuerySettings;

use crate::error::QueryError;

/// Timeouts for one logical query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutConfig {
    /// Bound on each attempt.
    pub attempt: Duration,
    /// Optional bound across all attempts and backoff sleeps.
    pub total: Option<Duration>,
}

impl TimeoutConfig {
    /// Per-attempt timeout only.
    pub fn new(attempt: Duration) -> Self {
        Self {
            attempt,
            total: None,
        }
    }

    /// Add an overall budget.
    pub fn with_total(mut self, total: Duration) -> Self {
        self.total = Some(total);
        self
    }

    /// Build from configuration.
    pub fn from_config(settings: &QuerySettings) -> Self {
        Self {
            attempt: Duration::from_millis(settings.attempt_timeout_ms),
            total: settings.total_budget_ms.map(Duration::from_millis),
        }
    }

    /// Attempt bound given `elapsed` time already spent.
    ///
    /// `None` when the overall budget is used up.
    pub fn attempt_limit(&self, elapsed: Duration) -> Option<Duration> {
        match self.total {
            None => Some(self.attempt),
            Some(total) => {
                let remaining = total.checked_sub(elapsed).filter(|r| !r.is_zero())?;
                Some(self.attempt.min(remaining))
            }
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

/// Run `future` for at most `limit`.
///
/// On expiry the future is dropped, so a late result can never be observed.
pub async fn with_timeout<T, F>(limit: Duration, future: F) -> Result<T, QueryError>
where
    F: Future<Output = Result<T, QueryError>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(QueryError::timed_out(limit)),
    }
}
