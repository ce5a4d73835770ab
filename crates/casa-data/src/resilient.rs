//! Bounded retry loop with per-attempt timeouts.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{ErrorClass, QueryError};
use crate::retry::RetryPolicy;
use crate::timeout::{with_timeout, TimeoutConfig};

/// Lifecycle of one logical query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryState {
    /// Not started.
    Idle,
    /// An attempt is in flight.
    Attempting,
    /// Waiting out the backoff before the next attempt.
    Retrying,
    /// An attempt succeeded.
    Succeeded,
    /// Retryable failures used up the retries or the budget.
    ExhaustedFailed,
    /// A non-retryable failure.
    FatalFailed,
}

impl QueryState {
    /// Whether no further transitions happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::ExhaustedFailed | Self::FatalFailed)
    }
}

impl std::fmt::Display for QueryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Attempting => "attempting",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::ExhaustedFailed => "exhausted_failed",
            Self::FatalFailed => "fatal_failed",
        };
        f.write_str(name)
    }
}

/// A failed attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// 0-based attempt number.
    pub attempt: u32,
    /// Class of the failure.
    pub class: ErrorClass,
    /// Failure message.
    pub message: String,
}

/// Outcome of `ResilientQuery::execute`.
#[derive(Debug)]
pub struct QueryReport<T> {
    /// Final result.
    pub result: Result<T, QueryError>,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Terminal state.
    pub state: QueryState,
    /// Wall time including backoff sleeps.
    pub elapsed: Duration,
    /// Failed attempts in order.
    pub failures: Vec<RetryAttempt>,
}

/// Runs an operation with classified retries.
///
/// Each attempt is raced against its timeout; an attempt that loses the race
/// is dropped and counts as a `Timeout` failure. Connection and timeout
/// failures are retried after the policy's backoff while retries remain.
/// Fatal failures end the loop at once.
#[derive(Debug, Clone, Default)]
pub struct ResilientQuery {
    name: String,
    retry: RetryPolicy,
    timeout: TimeoutConfig,
}

impl ResilientQuery {
    /// Create a query runner with default retry and timeout policies.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set timeouts.
    pub fn with_timeout(mut self, timeout: TimeoutConfig) -> Self {
        self.timeout = timeout;
        self
    }

    /// The retry policy in use.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn transition(&self, from: QueryState, to: QueryState, attempt: u32) -> QueryState {
        debug!(query = %self.name, attempt, %from, %to, "query state");
        to
    }

    /// Run `operation` until it succeeds, fails fatally, or runs out of
    /// retries, and report how it went.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> QueryReport<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QueryError>>,
    {
        let start = Instant::now();
        let mut state = QueryState::Idle;
        let mut failures = Vec::new();
        let mut attempt: u32 = 0;
        let mut last_error = None;

        loop {
            let Some(limit) = self.timeout.attempt_limit(start.elapsed()) else {
                state = self.transition(state, QueryState::ExhaustedFailed, attempt);
                let error = last_error.unwrap_or_else(|| QueryError::timed_out(Duration::ZERO));
                return self.report(Err(error), attempt, state, start, failures);
            };

            state = self.transition(state, QueryState::Attempting, attempt);
            let error = match with_timeout(limit, operation()).await {
                Ok(value) => {
                    state = self.transition(state, QueryState::Succeeded, attempt);
                    return self.report(Ok(value), attempt + 1, state, start, failures);
                }
                Err(error) => error,
            };

            let class = error.class();
            failures.push(RetryAttempt {
                attempt,
                class,
                message: error.to_string(),
            });

            if !class.is_retryable() {
                state = self.transition(state, QueryState::FatalFailed, attempt);
                return self.report(Err(error), attempt + 1, state, start, failures);
            }

            if !self.retry.should_retry(class, attempt) {
                warn!(query = %self.name, attempts = attempt + 1, error = %error, "query retries exhausted");
                state = self.transition(state, QueryState::ExhaustedFailed, attempt);
                return self.report(Err(error), attempt + 1, state, start, failures);
            }

            let delay = self.retry.backoff.delay_for_attempt(attempt);
            if let Some(total) = self.timeout.total {
                if start.elapsed() + delay >= total {
                    warn!(query = %self.name, attempts = attempt + 1, error = %error, "query budget exhausted");
                    state = self.transition(state, QueryState::ExhaustedFailed, attempt);
                    return self.report(Err(error), attempt + 1, state, start, failures);
                }
            }

            warn!(
                query = %self.name,
                attempt,
                class = %class,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying query"
            );
            state = self.transition(state, QueryState::Retrying, attempt);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            last_error = Some(error);
            attempt += 1;
        }
    }

    /// Like `execute`, returning only the result.
    pub async fn run<T, F, Fut>(&self, operation: F) -> Result<T, QueryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, QueryError>>,
    {
        self.execute(operation).await.result
    }

    fn report<T>(
        &self,
        result: Result<T, QueryError>,
        attempts: u32,
        state: QueryState,
        start: Instant,
        failures: Vec<RetryAttempt>,
    ) -> QueryReport<T> {
        QueryReport {
            result,
            attempts,
            state,
            elapsed: start.elapsed(),
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use tokio::time::sleep;

    use super::*;
    use crate::retry::BackoffStrategy;

    fn connection_error() -> QueryError {
        QueryError::Connection {
            message: "fetch failed".to_string(),
        }
    }

    fn assert_close(actual: Duration, expected: Duration) {
        let slack = Duration::from_millis(10);
        assert!(
            actual >= expected && actual <= expected + slack,
            "expected about {expected:?}, got {actual:?}"
        );
    }

    fn runner(max_retries: u32) -> ResilientQuery {
        ResilientQuery::new("test")
            .with_retry(RetryPolicy::new(max_retries))
            .with_timeout(TimeoutConfig::new(Duration::from_secs(5)))
    }

    // === Termination Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_always_connection_error_makes_three_attempts() {
        let calls = AtomicU32::new(0);

        let report = runner(2)
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(connection_error())
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(report.attempts, 3);
        assert_eq!(report.state, QueryState::ExhaustedFailed);
        assert_eq!(report.result.unwrap_err(), connection_error());
        assert_eq!(report.failures.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_makes_one_attempt() {
        let calls = AtomicU32::new(0);

        let report = runner(2)
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(QueryError::fatal("permission denied"))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.attempts, 1);
        assert_eq!(report.state, QueryState::FatalFailed);
        assert!(report.state.is_terminal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);

        let report = runner(2)
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(connection_error())
                } else {
                    Ok("rows")
                }
            })
            .await;

        assert_eq!(report.result.unwrap(), "rows");
        assert_eq!(report.attempts, 3);
        assert_eq!(report.state, QueryState::Succeeded);
        assert_eq!(report.failures[0].class, ErrorClass::Connection);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries() {
        let calls = AtomicU32::new(0);
        let result = runner(0)
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(connection_error())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // === Backoff Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_linear_backoff_timing() {
        let report = runner(2)
            .execute(|| async { Err::<(), _>(connection_error()) })
            .await;

        // 1s after the first failure, 2s after the second.
        assert_close(report.elapsed, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_backoff() {
        let query = runner(3).with_retry(RetryPolicy::new(3).with_backoff(BackoffStrategy::Fixed(
            Duration::from_millis(100),
        )));

        let report = query.execute(|| async { Err::<(), _>(connection_error()) }).await;
        assert_eq!(report.attempts, 4);
        assert_close(report.elapsed, Duration::from_millis(300));
    }

    // === Timeout Tests ===

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_times_out_and_retries() {
        let calls = AtomicU32::new(0);

        let report = runner(1)
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    sleep(Duration::from_secs(3600)).await;
                }
                Ok::<_, QueryError>(n)
            })
            .await;

        assert_eq!(report.result.unwrap(), 1);
        assert_eq!(report.failures[0].class, ErrorClass::Timeout);
        // 5s timeout plus 1s backoff.
        assert_close(report.elapsed, Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_hanging_exhausts_as_timeout() {
        let report = runner(2)
            .execute(|| async {
                sleep(Duration::from_secs(3600)).await;
                Ok::<_, QueryError>(())
            })
            .await;

        assert_eq!(report.attempts, 3);
        assert_eq!(report.state, QueryState::ExhaustedFailed);
        assert_eq!(report.result.unwrap_err().class(), ErrorClass::Timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_budget_stops_retries() {
        let calls = AtomicU32::new(0);
        let query = runner(5).with_timeout(
            TimeoutConfig::new(Duration::from_secs(5)).with_total(Duration::from_secs(8)),
        );

        let report = query
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                sleep(Duration::from_secs(3600)).await;
                Ok::<_, QueryError>(())
            })
            .await;

        // 5s attempt, 1s backoff, then a 2s attempt clipped to the budget.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(report.state, QueryState::ExhaustedFailed);
        assert_close(report.elapsed, Duration::from_secs(8));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(QueryState::ExhaustedFailed.to_string(), "exhausted_failed");
        assert!(!QueryState::Retrying.is_terminal());
    }
}
