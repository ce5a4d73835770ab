//! Backend client with per-resource policies.

use std::collections::HashMap;
use std::sync::Arc;

use casa_core::QuerySettings;
use casa_observability::MetricsCollector;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::{Backend, QueryRequest, QueryResponse};
use crate::dependency::ResourceTag;
use crate::error::QueryError;
use crate::resilient::{QueryReport, ResilientQuery};
use crate::retry::RetryPolicy;
use crate::timeout::TimeoutConfig;

/// Query policy combining timeout and retry configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPolicy {
    /// Timeout configuration.
    pub timeout: TimeoutConfig,
    /// Retry policy.
    pub retry: RetryPolicy,
}

impl QueryPolicy {
    /// Create a new query policy.
    pub fn new(timeout: TimeoutConfig, retry: RetryPolicy) -> Self {
        Self { timeout, retry }
    }

    /// Create from a resource tag's defaults.
    pub fn from_tag(tag: ResourceTag) -> Self {
        Self {
            timeout: TimeoutConfig::new(tag.default_timeout()),
            retry: RetryPolicy::new(tag.default_max_retries()),
        }
    }

    /// Create from configuration.
    pub fn from_config(settings: &QuerySettings) -> Self {
        Self {
            timeout: TimeoutConfig::from_config(settings),
            retry: RetryPolicy::from_config(settings),
        }
    }
}

/// Runs backend requests through `ResilientQuery`.
///
/// Error-shaped responses are classified into `QueryError`s so transient
/// failures are retried and fatal ones surface at once. Writes get a single
/// attempt. Every finished request is recorded on the attached
/// `MetricsCollector`, if any.
pub struct BackendClient<B> {
    backend: B,
    default_policy: Option<QueryPolicy>,
    overrides: HashMap<ResourceTag, QueryPolicy>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl<B: Backend> BackendClient<B> {
    /// Create a client using each tag's default policy.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            default_policy: None,
            overrides: HashMap::new(),
            metrics: None,
        }
    }

    /// Use `settings` for every tag without an explicit override.
    pub fn with_settings(mut self, settings: &QuerySettings) -> Self {
        self.default_policy = Some(QueryPolicy::from_config(settings));
        self
    }

    /// Override the policy for one tag.
    pub fn with_policy(mut self, tag: ResourceTag, policy: QueryPolicy) -> Self {
        self.overrides.insert(tag, policy);
        self
    }

    /// Record query metrics on `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The attached metrics collector.
    pub fn metrics(&self) -> Option<&Arc<MetricsCollector>> {
        self.metrics.as_ref()
    }

    /// Policy in effect for `tag`.
    pub fn policy_for(&self, tag: ResourceTag) -> QueryPolicy {
        self.overrides
            .get(&tag)
            .or(self.default_policy.as_ref())
            .cloned()
            .unwrap_or_else(|| QueryPolicy::from_tag(tag))
    }

    /// Run `request` and report every attempt.
    pub async fn execute(&self, tag: ResourceTag, request: QueryRequest) -> QueryReport<QueryResponse> {
        let policy = self.policy_for(tag);
        let operation = request.describe();
        let retry = if request.operation.is_write() {
            RetryPolicy::none()
        } else {
            policy.retry
        };
        let runner = ResilientQuery::new(format!("{tag}:{operation}"))
            .with_retry(retry)
            .with_timeout(policy.timeout);

        let backend = &self.backend;
        let report = runner
            .execute(|| {
                let request = request.clone();
                async move {
                    let mut response = backend.query(request).await;
                    match response.error.take() {
                        Some(error) => Err(QueryError::from(error)),
                        None => Ok(response),
                    }
                }
            })
            .await;

        match &report.result {
            Ok(_) => debug!(%tag, operation = %operation, attempts = report.attempts, "query ok"),
            Err(e) => warn!(%tag, operation = %operation, attempts = report.attempts, error = %e, "query failed"),
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_dependency(
                tag.name(),
                &operation,
                report.elapsed,
                report.attempts,
                report.result.as_ref().err().map(ToString::to_string),
            );
        }

        report
    }

    /// Run `request`, returning the successful response.
    pub async fn query(&self, tag: ResourceTag, request: QueryRequest) -> Result<QueryResponse, QueryError> {
        self.execute(tag, request).await.result
    }

    /// Run `request` and decode its data as `T`.
    ///
    /// Missing data decodes from `null`.
    pub async fn fetch<T: DeserializeOwned>(&self, tag: ResourceTag, request: QueryRequest) -> Result<T, QueryError> {
        let response = self.query(tag, request).await?;
        decode(response.data.unwrap_or(Value::Null))
    }

    /// Like `fetch`, also returning the exact row count if requested.
    pub async fn fetch_with_count<T: DeserializeOwned>(
        &self,
        tag: ResourceTag,
        request: QueryRequest,
    ) -> Result<(T, Option<u64>), QueryError> {
        let response = self.query(tag, request).await?;
        let count = response.count;
        Ok((decode(response.data.unwrap_or(Value::Null))?, count))
    }
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T, QueryError> {
    serde_json::from_value(data).map_err(|e| QueryError::Fatal {
        code: Some("decode".to_string()),
        message: format!("unexpected response shape: {e}"),
    })
}
