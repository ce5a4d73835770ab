//! The storefront service.

use std::future::Future;
use std::sync::Arc;

use casa_cache::{
    header_names, should_include_debug_headers, CacheHeaders, CacheKey, CachePolicies, CacheStatus,
    ResourceCachePolicy, TtlCache,
};
use casa_core::{CasaConfig, RequestContext};
use casa_data::{Backend, BackendClient, QueryError, QueryPolicy, ResourceTag};
use casa_executor::{Degrade, Recovered};
use casa_observability::{CacheLookup, MetricsCollector};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::StoreResult;
use crate::response::ApiResponse;

/// Catalog, order and review loaders over one backend and one cache.
///
/// The cache is shared: every `Storefront` built on the same `Arc<TtlCache>`
/// sees the others' entries and invalidations.
pub struct Storefront<B> {
    pub(crate) client: BackendClient<B>,
    cache: Arc<TtlCache>,
    pub(crate) policies: CachePolicies,
    debug_headers: bool,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<B: Backend> Storefront<B> {
    /// Create a storefront with default policies.
    pub fn new(backend: B, cache: Arc<TtlCache>) -> Self {
        Self {
            client: BackendClient::new(backend),
            cache,
            policies: CachePolicies::default(),
            debug_headers: false,
            metrics: None,
        }
    }

    /// Create a storefront from configuration.
    pub fn from_config(backend: B, cache: Arc<TtlCache>, config: &CasaConfig) -> Self {
        Self {
            client: BackendClient::new(backend).with_settings(&config.query),
            cache,
            policies: CachePolicies::from_config(&config.cache),
            debug_headers: config.cache.debug_headers,
            metrics: None,
        }
    }

    /// Replace every resource cache policy.
    pub fn with_policies(mut self, policies: CachePolicies) -> Self {
        self.policies = policies;
        self
    }

    /// Override the query policy for one resource.
    pub fn with_query_policy(mut self, tag: ResourceTag, policy: QueryPolicy) -> Self {
        self.client = self.client.with_policy(tag, policy);
        self
    }

    /// Emit `x-cache-status` / `x-cache-key` on cached reads.
    pub fn with_debug_headers(mut self, enabled: bool) -> Self {
        self.debug_headers = enabled;
        self
    }

    /// Turn on debug headers if the request sent `X-Debug-Cache: 1`.
    pub fn debug_from_request(self, ctx: &RequestContext) -> Self {
        let requested = should_include_debug_headers(ctx.header(header_names::X_DEBUG_CACHE));
        let enabled = self.debug_headers || requested;
        self.with_debug_headers(enabled)
    }

    /// Record cache lookups, degraded reads and backend queries on `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.client = self.client.with_metrics(metrics.clone());
        self.metrics = Some(metrics);
        self
    }

    /// The shared cache.
    pub fn cache(&self) -> &Arc<TtlCache> {
        &self.cache
    }

    /// The backend client with its query policies.
    pub fn client(&self) -> &BackendClient<B> {
        &self.client
    }

    /// The underlying backend.
    pub fn backend(&self) -> &B {
        self.client.backend()
    }

    /// Cache policies in effect.
    pub fn policies(&self) -> &CachePolicies {
        &self.policies
    }

    /// Serve `key` from the cache or `load`, degrading on failure.
    pub(crate) async fn cached_read<T, F, Fut>(
        &self,
        key: CacheKey,
        policy: &ResourceCachePolicy,
        degrade: Degrade<T>,
        load: F,
    ) -> StoreResult<ApiResponse<T>>
    where
        T: Serialize + DeserializeOwned + Default + Clone,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, QueryError>>,
    {
        match self.cache.get_or_compute(&key, policy.ttl, load).await {
            Ok((body, status)) => {
                self.record_lookup(&key, status);
                let headers = CacheHeaders::from_policy(policy)
                    .with_status(status)
                    .with_key(key.as_str())
                    .include_debug(self.debug_headers)
                    .build();
                Ok(ApiResponse::new(body, headers).with_cache_status(status))
            }
            Err(error) => self.recover(key.as_str(), &degrade, error),
        }
    }

    /// Apply `degrade` to a failed read.
    pub(crate) fn recover<T: Default + Clone>(
        &self,
        context: &str,
        degrade: &Degrade<T>,
        error: QueryError,
    ) -> StoreResult<ApiResponse<T>> {
        match degrade.apply(context, Err(error)) {
            Recovered::Fresh(body) => Ok(ApiResponse::new(body, CacheHeaders::no_store().build())),
            Recovered::Degraded { value, .. } => {
                self.mark_degraded();
                Ok(ApiResponse::degraded(value))
            }
            Recovered::Failed(error) => Err(error.into()),
        }
    }

    pub(crate) fn mark_degraded(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.record_degraded();
        }
    }

    /// Drop every cached key containing any of `patterns`.
    pub(crate) fn invalidate(&self, patterns: &[&str]) -> usize {
        let removed = patterns
            .iter()
            .map(|pattern| self.cache.invalidate(pattern))
            .sum();
        info!(?patterns, removed, "invalidated after write");
        removed
    }

    fn record_lookup(&self, key: &CacheKey, status: CacheStatus) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        let lookup = match status {
            CacheStatus::Hit => CacheLookup::Hit,
            CacheStatus::Miss => CacheLookup::Miss,
            CacheStatus::Skipped => CacheLookup::Skipped,
            CacheStatus::Bypass => return,
        };
        metrics.record_cache(key.prefix(), lookup);
    }
}
