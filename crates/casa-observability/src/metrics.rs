//! Per-request query and cache metrics.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use casa_core::RequestId;
use serde::{Deserialize, Serialize};

/// Metrics for one backend query (all attempts included).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyMetrics {
    /// Resource tag the query ran under.
    pub tag: String,
    /// Table and operation, e.g. `products.select`.
    pub operation: String,
    /// Wall time across all attempts (microseconds).
    pub duration_us: u64,
    /// Attempts made, including the first.
    pub attempts: u32,
    /// Whether the query eventually succeeded.
    pub success: bool,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DependencyMetrics {
    /// Whether more than one attempt was needed.
    pub fn retried(&self) -> bool {
        self.attempts > 1
    }
}

/// Cache lookup counters for one resource family.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    /// Producer results that were returned but not stored.
    pub skipped: u64,
}

/// Finalized metrics for a single request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestMetrics {
    /// Request ID for correlation.
    pub request_id: String,
    /// Route or loader name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub route: Option<String>,
    /// Backend queries in the order they finished.
    pub dependencies: Vec<DependencyMetrics>,
    /// Cache counters keyed by resource prefix.
    pub cache: BTreeMap<String, CacheMetrics>,
    /// Whether any loader fell back to a degraded response.
    pub degraded: bool,
    /// Total request duration (microseconds).
    pub total_duration_us: u64,
}

#[derive(Debug, Default)]
struct Recorded {
    route: Option<String>,
    dependencies: Vec<DependencyMetrics>,
    cache: BTreeMap<String, CacheMetrics>,
    degraded: bool,
}

/// Collector for request metrics.
///
/// Shared by reference between the backend client and the storefront
/// loaders; recording takes `&self`.
#[derive(Debug)]
pub struct MetricsCollector {
    request_id: RequestId,
    start: Instant,
    recorded: Mutex<Recorded>,
}

/// Outcome of a cache lookup, as seen by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Miss,
    Skipped,
}

impl MetricsCollector {
    /// Create a new metrics collector.
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            start: Instant::now(),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    fn with_recorded<R>(&self, f: impl FnOnce(&mut Recorded) -> R) -> R {
        let mut guard = self.recorded.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Set route or loader name.
    pub fn set_route(&self, route: impl Into<String>) {
        let route = route.into();
        self.with_recorded(|r| r.route = Some(route));
    }

    /// Record a finished backend query.
    pub fn record_dependency(
        &self,
        tag: &str,
        operation: &str,
        duration: Duration,
        attempts: u32,
        error: Option<String>,
    ) {
        let metrics = DependencyMetrics {
            tag: tag.to_string(),
            operation: operation.to_string(),
            duration_us: duration.as_micros() as u64,
            attempts,
            success: error.is_none(),
            error,
        };
        self.with_recorded(|r| r.dependencies.push(metrics));
    }

    /// Record a cache lookup under the key's resource prefix.
    pub fn record_cache(&self, prefix: &str, lookup: CacheLookup) {
        self.with_recorded(|r| {
            let counters = r.cache.entry(prefix.to_string()).or_default();
            match lookup {
                CacheLookup::Hit => counters.hits += 1,
                CacheLookup::Miss => counters.misses += 1,
                CacheLookup::Skipped => counters.skipped += 1,
            }
        });
    }

    /// Record that a degraded response was served.
    pub fn record_degraded(&self) {
        self.with_recorded(|r| r.degraded = true);
    }

    /// Number of backend queries recorded so far.
    pub fn dependency_count(&self) -> usize {
        self.with_recorded(|r| r.dependencies.len())
    }

    /// Get total elapsed time.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Snapshot the metrics recorded so far.
    pub fn finalize(&self) -> RequestMetrics {
        let total = self.start.elapsed();
        self.with_recorded(|r| RequestMetrics {
            request_id: self.request_id.to_string(),
            route: r.route.clone(),
            dependencies: r.dependencies.clone(),
            cache: r.cache.clone(),
            degraded: r.degraded,
            total_duration_us: total.as_micros() as u64,
        })
    }
}

impl RequestMetrics {
    /// Format as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Format as human-readable summary.
    pub fn to_summary(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Request: {}", self.request_id));
        if let Some(route) = &self.route {
            lines.push(format!("  Route: {}", route));
        }
        lines.push(format!(
            "  Total: {}us ({:.2}ms)",
            self.total_duration_us,
            self.total_duration_us as f64 / 1000.0
        ));

        if !self.cache.is_empty() {
            lines.push("  Cache:".to_string());
            for (prefix, c) in &self.cache {
                lines.push(format!(
                    "    {}: {} hit / {} miss / {} skipped",
                    prefix, c.hits, c.misses, c.skipped
                ));
            }
        }

        if !self.dependencies.is_empty() {
            lines.push("  Dependencies:".to_string());
            for dep in &self.dependencies {
                let status = if dep.success { "OK" } else { "FAILED" };
                lines.push(format!(
                    "    {} {} [{}]: {}us, {} attempt(s)",
                    dep.tag, dep.operation, status, dep.duration_us, dep.attempts
                ));
            }
        }

        if self.degraded {
            lines.push("  Degraded: yes".to_string());
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> MetricsCollector {
        MetricsCollector::new(RequestId::from_string("req-1"))
    }

    #[test]
    fn test_record_dependency() {
        let metrics = collector();
        metrics.record_dependency("products", "products.select", Duration::from_millis(12), 1, None);
        metrics.record_dependency(
            "orders",
            "orders.select",
            Duration::from_millis(40),
            3,
            Some("connection refused".to_string()),
        );

        let finalized = metrics.finalize();
        assert_eq!(finalized.dependencies.len(), 2);
        assert!(finalized.dependencies[0].success);
        assert!(!finalized.dependencies[0].retried());
        assert!(!finalized.dependencies[1].success);
        assert!(finalized.dependencies[1].retried());
        assert_eq!(finalized.dependencies[0].duration_us, 12_000);
    }

    #[test]
    fn test_record_cache_counters() {
        let metrics = collector();
        metrics.record_cache("products", CacheLookup::Miss);
        metrics.record_cache("products", CacheLookup::Hit);
        metrics.record_cache("products", CacheLookup::Hit);
        metrics.record_cache("reviews", CacheLookup::Skipped);

        let finalized = metrics.finalize();
        assert_eq!(
            finalized.cache["products"],
            CacheMetrics {
                hits: 2,
                misses: 1,
                skipped: 0
            }
        );
        assert_eq!(finalized.cache["reviews"].skipped, 1);
    }

    #[test]
    fn test_summary_and_json() {
        let metrics = collector();
        metrics.set_route("catalog.list_products");
        metrics.record_cache("products", CacheLookup::Hit);
        metrics.record_degraded();

        let finalized = metrics.finalize();
        let summary = finalized.to_summary();
        assert!(summary.contains("Request: req-1"));
        assert!(summary.contains("catalog.list_products"));
        assert!(summary.contains("products: 1 hit"));
        assert!(summary.contains("Degraded: yes"));

        let json: serde_json::Value = serde_json::from_str(&finalized.to_json()).unwrap();
        assert_eq!(json["request_id"], "req-1");
        assert_eq!(json["degraded"], true);
    }
}
