//! Read-through orchestration over `TtlCache`.

use std::future::Future;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::key::CacheKey;
use crate::store::TtlCache;

/// How a read-through call was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CacheStatus {
    /// Served from cache; the producer did not run.
    Hit,
    /// Producer ran and its value was offered to the cache.
    Miss,
    /// Producer ran but its value was error-shaped or unserializable, so
    /// it was returned without being stored.
    Skipped,
    /// Caching disabled for this call.
    Bypass,
}

impl CacheStatus {
    /// Whether the value came from the cache.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit)
    }
}

impl std::fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hit => write!(f, "HIT"),
            Self::Miss => write!(f, "MISS"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Bypass => write!(f, "BYPASS"),
        }
    }
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy.
///
/// Empty arrays and objects are truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Whether a producer result reports an error in-band.
///
/// True for objects whose `error` field is truthy.
pub fn is_error_shaped(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.get("error").is_some_and(is_truthy),
        _ => false,
    }
}

impl TtlCache {
    /// Return the cached value for `key`, or run `producer` and cache its
    /// result for `ttl`.
    ///
    /// Failures are never cached: an `Err` from the producer is propagated
    /// and an error-shaped `Ok` is returned without being stored. The write
    /// goes through a token reserved before the producer runs, so a slow
    /// producer cannot overwrite a newer entry or undo an invalidation that
    /// happened while it was running.
    ///
    /// A zero `ttl` bypasses the cache entirely.
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        producer: F,
    ) -> Result<(T, CacheStatus), E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if ttl.is_zero() {
            let value = producer().await?;
            return Ok((value, CacheStatus::Bypass));
        }

        if let Some(value) = self.get::<T>(key.as_str()) {
            debug!(key = %key, "cache hit");
            return Ok((value, CacheStatus::Hit));
        }
        debug!(key = %key, "cache miss");

        let token = self.reserve(key.as_str());
        let value = producer().await?;

        let json = match serde_json::to_value(&value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, error = %e, "producer result not serializable, not caching");
                return Ok((value, CacheStatus::Skipped));
            }
        };

        if is_error_shaped(&json) {
            debug!(key = %key, "producer result is error-shaped, not caching");
            return Ok((value, CacheStatus::Skipped));
        }

        match token.commit_value(json, ttl) {
            Ok(true) => {}
            Ok(false) => debug!(key = %key, "newer write won, result not stored"),
            Err(e) => warn!(key = %key, error = %e, "cache write failed"),
        }
        Ok((value, CacheStatus::Miss))
    }
}

/// Read-through helper returning only the value.
pub async fn cached_query<T, E, F, Fut>(
    cache: &TtlCache,
    key: &CacheKey,
    ttl: Duration,
    producer: F,
) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    cache
        .get_or_compute(key, ttl, producer)
        .await
        .map(|(value, _)| value)
}
