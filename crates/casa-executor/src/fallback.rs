//! Fallback cascades for reads with more than one way to load.
//!
//! A cascade tries its strategies in order and keeps the first that
//! succeeds. A strategy that errors or outlives its timeout hands over to
//! the next one. When every strategy fails the cascade still answers, with
//! `T::default()` and `degraded` set.
//!
//! Success is judged by `Ok` alone. A strategy that succeeds with an empty
//! value ends the cascade even if a later strategy could have found data.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Await `candidates` one at a time and return the first `Ok`.
///
/// Candidates after the winner are never polled. If none succeeds, every
/// error is returned in order.
pub async fn first_success<T, E, I, Fut>(candidates: I) -> Result<T, Vec<E>>
where
    I: IntoIterator<Item = Fut>,
    Fut: Future<Output = Result<T, E>>,
{
    let mut errors = Vec::new();
    for candidate in candidates {
        match candidate.await {
            Ok(value) => return Ok(value),
            Err(e) => errors.push(e),
        }
    }
    Err(errors)
}

type StrategyFn<'a, T, E> = Box<dyn FnOnce() -> BoxFuture<'a, Result<T, E>> + Send + 'a>;

struct Strategy<'a, T, E> {
    name: String,
    timeout: Option<Duration>,
    run: StrategyFn<'a, T, E>,
}

/// Why a strategy was passed over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("{strategy}: {error}")]
pub struct TierFailure {
    /// Strategy name.
    pub strategy: String,
    /// Rendered error.
    pub error: String,
    /// Whether the strategy ran out of time.
    pub timed_out: bool,
}

/// Result of running a cascade.
#[derive(Debug, Clone)]
pub struct CascadeOutcome<T> {
    /// The winning value, or `T::default()` when degraded.
    pub value: T,
    /// Name of the winning strategy.
    pub strategy: Option<String>,
    /// Failures of the strategies tried before the winner (or all of them).
    pub failures: Vec<TierFailure>,
    /// Every strategy failed.
    pub degraded: bool,
    /// Time spent across all strategies.
    pub elapsed: Duration,
}

impl<T> CascadeOutcome<T> {
    /// Name of the winning strategy.
    pub fn winner(&self) -> Option<&str> {
        self.strategy.as_deref()
    }

    /// Whether any strategy failed before the outcome was settled.
    pub fn fell_back(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Take the value.
    pub fn into_value(self) -> T {
        self.value
    }
}

/// Ordered strategies for loading one value.
pub struct FallbackCascade<'a, T, E> {
    name: String,
    default_timeout: Option<Duration>,
    strategies: Vec<Strategy<'a, T, E>>,
}

impl<'a, T, E> FallbackCascade<'a, T, E>
where
    T: Default + Send + 'a,
    E: fmt::Display + Send + 'a,
{
    /// Create an empty cascade.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default_timeout: None,
            strategies: Vec::new(),
        }
    }

    /// Timeout for strategies added without their own.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Append a strategy using the default timeout.
    pub fn strategy<F, Fut>(self, name: impl Into<String>, run: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        self.push(name.into(), None, run)
    }

    /// Append a strategy with its own timeout.
    pub fn strategy_with_timeout<F, Fut>(self, name: impl Into<String>, timeout: Duration, run: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        self.push(name.into(), Some(timeout), run)
    }

    fn push<F, Fut>(mut self, name: String, timeout: Option<Duration>, run: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<T, E>> + Send + 'a,
    {
        self.strategies.push(Strategy {
            name,
            timeout,
            run: Box::new(move || run().boxed()),
        });
        self
    }

    /// Number of strategies.
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether the cascade has no strategies.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Run strategies in order until one succeeds.
    pub async fn run(self) -> CascadeOutcome<T> {
        let started = Instant::now();
        let mut failures = Vec::new();

        for strategy in self.strategies {
            let limit = strategy.timeout.or(self.default_timeout);
            let future = (strategy.run)();

            let result = match limit {
                Some(limit) => match tokio::time::timeout(limit, future).await {
                    Ok(result) => result.map_err(|e| (e.to_string(), false)),
                    Err(_) => Err((format!("timed out after {}ms", limit.as_millis()), true)),
                },
                None => future.await.map_err(|e| (e.to_string(), false)),
            };

            match result {
                Ok(value) => {
                    debug!(
                        cascade = %self.name,
                        strategy = %strategy.name,
                        skipped = failures.len(),
                        "cascade strategy succeeded"
                    );
                    return CascadeOutcome {
                        value,
                        strategy: Some(strategy.name),
                        failures,
                        degraded: false,
                        elapsed: started.elapsed(),
                    };
                }
                Err((error, timed_out)) => {
                    warn!(
                        cascade = %self.name,
                        strategy = %strategy.name,
                        timed_out,
                        error = %error,
                        "cascade strategy failed"
                    );
                    failures.push(TierFailure {
                        strategy: strategy.name,
                        error,
                        timed_out,
                    });
                }
            }
        }

        warn!(cascade = %self.name, failures = failures.len(), "all cascade strategies failed");
        CascadeOutcome {
            value: T::default(),
            strategy: None,
            failures,
            degraded: true,
            elapsed: started.elapsed(),
        }
    }
}

impl<T, E> fmt::Debug for FallbackCascade<'_, T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackCascade")
            .field("name", &self.name)
            .field("default_timeout", &self.default_timeout)
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
