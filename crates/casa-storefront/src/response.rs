//! Response envelope for storefront reads.

use casa_cache::{CacheHeaders, CacheStatus};
use http::header::{AsHeaderName, CACHE_CONTROL};
use http::{HeaderMap, StatusCode};

/// A loader's answer, ready to be written as an HTTP response.
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: T,
    /// How the cache served this read, if it went through the cache.
    pub cache_status: Option<CacheStatus>,
    /// The load failed and `body` is a stand-in.
    pub degraded: bool,
}

impl<T> ApiResponse<T> {
    /// A `200 OK` response.
    pub fn new(body: T, headers: HeaderMap) -> Self {
        Self {
            status: StatusCode::OK,
            headers,
            body,
            cache_status: None,
            degraded: false,
        }
    }

    /// A stand-in response that must not be cached downstream.
    pub fn degraded(body: T) -> Self {
        Self {
            status: StatusCode::OK,
            headers: CacheHeaders::no_store().build(),
            body,
            cache_status: None,
            degraded: true,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_cache_status(mut self, status: CacheStatus) -> Self {
        self.cache_status = Some(status);
        self
    }

    /// Header value as text.
    pub fn header<K: AsHeaderName>(&self, name: K) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// The `Cache-Control` header.
    pub fn cache_control(&self) -> Option<&str> {
        self.header(CACHE_CONTROL)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Transform the body, keeping status and headers.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
            cache_status: self.cache_status,
            degraded: self.degraded,
        }
    }
}

#[cfg(test)]
mod tests {
    use http::header::VARY;

    use super::*;

    #[test]
    fn test_degraded_is_no_store() {
        let response = ApiResponse::degraded(Vec::<u32>::new());
        assert!(response.degraded);
        assert!(response.is_success());
        assert_eq!(response.cache_control(), Some("no-store"));
        assert_eq!(response.header(VARY), None);
    }

    #[test]
    fn test_map_keeps_envelope() {
        let response = ApiResponse::new(vec![1, 2, 3], HeaderMap::new())
            .with_status(StatusCode::PARTIAL_CONTENT)
            .with_cache_status(CacheStatus::Hit)
            .map(|rows| rows.len());

        assert_eq!(response.body, 3);
        assert_eq!(response.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(response.cache_status, Some(CacheStatus::Hit));
    }
}
