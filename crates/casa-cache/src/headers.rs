//! HTTP cache headers for storefront responses.

use http::header::{HeaderName, HeaderValue, CACHE_CONTROL, VARY};
use http::HeaderMap;

use crate::policy::ResourceCachePolicy;
use crate::query::CacheStatus;

/// Header names used for cache debugging.
pub mod header_names {
    /// Request header asking for debug output.
    pub const X_DEBUG_CACHE: &str = "X-Debug-Cache";
    /// Cache status (HIT, MISS, SKIPPED, BYPASS).
    pub const X_CACHE_STATUS: &str = "x-cache-status";
    /// Cache key used for lookup.
    pub const X_CACHE_KEY: &str = "x-cache-key";
}

/// Builder for response cache headers.
#[derive(Debug, Default, Clone)]
pub struct CacheHeaders {
    cache_control: Option<String>,
    vary: Option<String>,
    status: Option<CacheStatus>,
    key: Option<String>,
    include_debug: bool,
}

impl CacheHeaders {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// `Cache-Control` and `Vary` from a resource policy.
    pub fn from_policy(policy: &ResourceCachePolicy) -> Self {
        Self {
            cache_control: Some(policy.cache_control_header()),
            vary: policy.vary_header(),
            ..Self::default()
        }
    }

    /// `Cache-Control: no-store`, used for degraded and per-user responses.
    pub fn no_store() -> Self {
        Self {
            cache_control: Some("no-store".to_string()),
            ..Self::default()
        }
    }

    /// Record the cache status for the debug header.
    pub fn with_status(mut self, status: CacheStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Record the cache key for the debug header.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Emit debug headers.
    pub fn include_debug(mut self, enabled: bool) -> Self {
        self.include_debug = enabled;
        self
    }

    /// Build the header map. Values that are not valid header text are
    /// left out.
    pub fn build(self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(value) = self.cache_control.as_deref().and_then(to_value) {
            headers.insert(CACHE_CONTROL, value);
        }
        if let Some(value) = self.vary.as_deref().and_then(to_value) {
            headers.insert(VARY, value);
        }

        if self.include_debug {
            if let Some(status) = self.status {
                headers.insert(
                    HeaderName::from_static(header_names::X_CACHE_STATUS),
                    HeaderValue::from_static(status_str(status)),
                );
            }
            if let Some(value) = self.key.as_deref().and_then(to_value) {
                headers.insert(HeaderName::from_static(header_names::X_CACHE_KEY), value);
            }
        }

        headers
    }
}

fn to_value(s: &str) -> Option<HeaderValue> {
    HeaderValue::from_str(s).ok()
}

fn status_str(status: CacheStatus) -> &'static str {
    match status {
        CacheStatus::Hit => "HIT",
        CacheStatus::Miss => "MISS",
        CacheStatus::Skipped => "SKIPPED",
        CacheStatus::Bypass => "BYPASS",
    }
}

/// Whether the request asked for cache debug headers (`X-Debug-Cache: 1`).
pub fn should_include_debug_headers(debug_header: Option<&str>) -> bool {
    debug_header.is_some_and(|value| value.trim() == "1")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_headers() {
        let headers = CacheHeaders::from_policy(&ResourceCachePolicy::product_list()).build();

        assert_eq!(headers[CACHE_CONTROL], "public, max-age=180, s-maxage=300");
        assert_eq!(headers[VARY], "Accept-Encoding");
        assert!(headers.get(header_names::X_CACHE_STATUS).is_none());
    }

    #[test]
    fn test_no_store() {
        let headers = CacheHeaders::no_store().build();
        assert_eq!(headers[CACHE_CONTROL], "no-store");
        assert!(headers.get(VARY).is_none());
    }

    #[test]
    fn test_debug_headers_only_when_enabled() {
        let base = CacheHeaders::from_policy(&ResourceCachePolicy::categories())
            .with_status(CacheStatus::Hit)
            .with_key("categories:all");

        let quiet = base.clone().build();
        assert!(quiet.get(header_names::X_CACHE_STATUS).is_none());
        assert!(quiet.get(header_names::X_CACHE_KEY).is_none());

        let debug = base.include_debug(true).build();
        assert_eq!(debug[header_names::X_CACHE_STATUS], "HIT");
        assert_eq!(debug[header_names::X_CACHE_KEY], "categories:all");
    }

    #[test]
    fn test_should_include_debug_headers() {
        assert!(should_include_debug_headers(Some("1")));
        assert!(!should_include_debug_headers(Some("0")));
        assert!(!should_include_debug_headers(Some("true")));
        assert!(!should_include_debug_headers(None));
    }
}
