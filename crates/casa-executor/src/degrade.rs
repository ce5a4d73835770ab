//! Degraded results for failed reads.

use std::fmt;

use tracing::warn;

/// What a read serves when its load fails.
#[derive(Debug, Clone, PartialEq)]
pub enum Degrade<T> {
    /// Serve `T::default()`.
    Empty,

    /// Serve a fixed value.
    Value(T),

    /// Serve nothing and hand the error back.
    Propagate,
}

impl<T> Degrade<T> {
    /// Serve `value` on failure.
    pub fn value(value: T) -> Self {
        Self::Value(value)
    }
}

impl<T> Default for Degrade<T> {
    fn default() -> Self {
        Self::Empty
    }
}

/// A read after its degrade policy was applied.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovered<T, E> {
    /// The load succeeded.
    Fresh(T),
    /// The load failed and a stand-in was served.
    Degraded { value: T, error: String },
    /// The load failed and nothing could stand in.
    Failed(E),
}

impl<T, E> Recovered<T, E> {
    /// Whether a stand-in was served.
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    /// The served value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Fresh(value) | Self::Degraded { value, .. } => Some(value),
            Self::Failed(_) => None,
        }
    }

    /// Collapse into a `Result`, treating a stand-in as success.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Fresh(value) | Self::Degraded { value, .. } => Ok(value),
            Self::Failed(error) => Err(error),
        }
    }
}

impl<T: Default + Clone> Degrade<T> {
    /// Apply the policy to a load result.
    ///
    /// `context` names the read in the log line emitted on failure.
    pub fn apply<E: fmt::Display>(&self, context: &str, result: Result<T, E>) -> Recovered<T, E> {
        let error = match result {
            Ok(value) => return Recovered::Fresh(value),
            Err(error) => error,
        };

        let value = match self {
            Self::Empty => T::default(),
            Self::Value(value) => value.clone(),
            Self::Propagate => {
                warn!(read = context, error = %error, "read failed");
                return Recovered::Failed(error);
            }
        };

        warn!(read = context, error = %error, "serving degraded result");
        Recovered::Degraded {
            value,
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default, PartialEq)]
    struct Stats {
        total: u64,
    }

    #[test]
    fn test_success_is_fresh() {
        let recovered = Degrade::<Vec<u32>>::Empty.apply::<String>("list", Ok(vec![1]));
        assert_eq!(recovered, Recovered::Fresh(vec![1]));
        assert!(!recovered.is_degraded());
    }

    #[test]
    fn test_empty_serves_default() {
        let recovered = Degrade::<Stats>::default().apply("stats", Err("timed out"));
        assert!(recovered.is_degraded());
        assert_eq!(recovered.value(), Some(&Stats::default()));
        assert_eq!(
            recovered,
            Recovered::Degraded {
                value: Stats::default(),
                error: "timed out".to_string()
            }
        );
    }

    #[test]
    fn test_value_serves_fixed_value() {
        let policy = Degrade::value(Stats { total: 7 });
        let recovered = policy.apply("stats", Err("boom"));
        assert_eq!(recovered.into_result(), Ok(Stats { total: 7 }));
    }

    #[test]
    fn test_propagate_returns_error() {
        let recovered = Degrade::<Stats>::Propagate.apply("stats", Err("boom"));
        assert!(!recovered.is_degraded());
        assert_eq!(recovered.value(), None);
        assert_eq!(recovered.into_result(), Err("boom"));
    }
}
