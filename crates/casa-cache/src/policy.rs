//! Per-resource cache policies.
//!
//! A policy pairs the server-side TTL used for `TtlCache` entries with the
//! client (`max-age`) and CDN (`s-maxage`) lifetimes advertised in
//! `Cache-Control`.

use std::time::Duration;

use casa_core::CacheSettings;
use serde::{Deserialize, Serialize};

/// Who may cache the HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheScope {
    /// Cacheable by CDN and browser.
    Public,
    /// Cacheable by the browser only.
    Private,
    /// Not cacheable downstream.
    #[default]
    None,
}

impl CacheScope {
    /// The leading `Cache-Control` directive for this scope.
    pub fn cache_control_directive(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::None => "no-store",
        }
    }

    /// Whether a CDN may store the response.
    pub fn allows_cdn_caching(&self) -> bool {
        matches!(self, Self::Public)
    }
}

/// Cache policy for one resource family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceCachePolicy {
    /// Resource family, also the key prefix used for invalidation.
    pub resource: String,
    /// Downstream cache scope.
    pub scope: CacheScope,
    /// Server-side `TtlCache` lifetime.
    pub ttl: Duration,
    /// Browser lifetime (`max-age`).
    pub client_max_age: Duration,
    /// Shared-cache lifetime (`s-maxage`).
    pub cdn_max_age: Duration,
    /// Request headers the response varies on.
    pub vary: Vec<String>,
}

impl ResourceCachePolicy {
    /// A public policy with `Vary: Accept-Encoding`.
    pub fn public(
        resource: impl Into<String>,
        ttl: Duration,
        client_max_age: Duration,
        cdn_max_age: Duration,
    ) -> Self {
        Self {
            resource: resource.into(),
            scope: CacheScope::Public,
            ttl,
            client_max_age,
            cdn_max_age,
            vary: vec!["Accept-Encoding".to_string()],
        }
    }

    /// Cached on the server only; responses are `no-store`.
    pub fn server_only(resource: impl Into<String>, ttl: Duration) -> Self {
        Self {
            resource: resource.into(),
            scope: CacheScope::None,
            ttl,
            client_max_age: Duration::ZERO,
            cdn_max_age: Duration::ZERO,
            vary: Vec::new(),
        }
    }

    /// Product listing pages.
    pub fn product_list() -> Self {
        Self::public("products", secs(300), secs(180), secs(300))
    }

    /// Single product pages.
    pub fn product_detail() -> Self {
        Self::public("products", secs(300), secs(300), secs(600))
    }

    /// Catalog statistics.
    pub fn stats() -> Self {
        Self::public("products", secs(600), secs(600), secs(600))
    }

    /// Category list.
    pub fn categories() -> Self {
        Self::public("categories", secs(600), secs(600), secs(600))
    }

    /// Approved reviews for a product.
    pub fn reviews() -> Self {
        Self::public("reviews", secs(300), secs(180), secs(300))
    }

    /// Admin order listing.
    pub fn admin_orders() -> Self {
        Self::server_only("orders", secs(60))
    }

    /// Replace the server TTL, keeping the header lifetimes.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// `Cache-Control` header value.
    pub fn cache_control_header(&self) -> String {
        let mut parts = vec![self.scope.cache_control_directive().to_string()];
        match self.scope {
            CacheScope::None => {}
            CacheScope::Private => {
                parts.push(format!("max-age={}", self.client_max_age.as_secs()));
            }
            CacheScope::Public => {
                parts.push(format!("max-age={}", self.client_max_age.as_secs()));
                parts.push(format!("s-maxage={}", self.cdn_max_age.as_secs()));
            }
        }
        parts.join(", ")
    }

    /// `Vary` header value, if any.
    pub fn vary_header(&self) -> Option<String> {
        if self.vary.is_empty() {
            None
        } else {
            Some(self.vary.join(", "))
        }
    }
}

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

/// The storefront's policy set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachePolicies {
    pub product_list: ResourceCachePolicy,
    pub product_detail: ResourceCachePolicy,
    pub stats: ResourceCachePolicy,
    pub categories: ResourceCachePolicy,
    pub reviews: ResourceCachePolicy,
    pub admin_orders: ResourceCachePolicy,
}

impl Default for CachePolicies {
    fn default() -> Self {
        Self {
            product_list: ResourceCachePolicy::product_list(),
            product_detail: ResourceCachePolicy::product_detail(),
            stats: ResourceCachePolicy::stats(),
            categories: ResourceCachePolicy::categories(),
            reviews: ResourceCachePolicy::reviews(),
            admin_orders: ResourceCachePolicy::admin_orders(),
        }
    }
}

impl CachePolicies {
    /// Presets with server TTLs taken from configuration.
    pub fn from_config(settings: &CacheSettings) -> Self {
        let defaults = Self::default();
        Self {
            product_list: defaults.product_list.with_ttl(secs(settings.product_list_ttl_secs)),
            product_detail: defaults.product_detail.with_ttl(secs(settings.product_detail_ttl_secs)),
            stats: defaults.stats.with_ttl(secs(settings.stats_ttl_secs)),
            categories: defaults.categories.with_ttl(secs(settings.categories_ttl_secs)),
            reviews: defaults.reviews.with_ttl(secs(settings.reviews_ttl_secs)),
            admin_orders: defaults.admin_orders.with_ttl(secs(settings.admin_orders_ttl_secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_lifetimes() {
        let list = ResourceCachePolicy::product_list();
        assert_eq!(list.ttl, secs(300));
        assert_eq!(list.cache_control_header(), "public, max-age=180, s-maxage=300");

        let detail = ResourceCachePolicy::product_detail();
        assert_eq!(detail.cache_control_header(), "public, max-age=300, s-maxage=600");

        assert_eq!(ResourceCachePolicy::stats().ttl, secs(600));
        assert_eq!(ResourceCachePolicy::categories().ttl, secs(600));
        assert_eq!(
            ResourceCachePolicy::reviews().cache_control_header(),
            "public, max-age=180, s-maxage=300"
        );
    }

    #[test]
    fn test_vary_header() {
        assert_eq!(
            ResourceCachePolicy::product_list().vary_header().as_deref(),
            Some("Accept-Encoding")
        );
        assert_eq!(ResourceCachePolicy::admin_orders().vary_header(), None);
    }

    #[test]
    fn test_server_only_policy() {
        let admin = ResourceCachePolicy::admin_orders();
        assert_eq!(admin.ttl, secs(60));
        assert_eq!(admin.cache_control_header(), "no-store");
        assert!(!admin.scope.allows_cdn_caching());
    }

    #[test]
    fn test_private_scope_has_no_s_maxage() {
        let policy = ResourceCachePolicy {
            scope: CacheScope::Private,
            ..ResourceCachePolicy::product_list()
        };
        assert_eq!(policy.cache_control_header(), "private, max-age=180");
    }

    #[test]
    fn test_from_config_overrides_server_ttl_only() {
        let settings = CacheSettings {
            product_list_ttl_secs: 30,
            admin_orders_ttl_secs: 5,
            ..CacheSettings::default()
        };
        let policies = CachePolicies::from_config(&settings);

        assert_eq!(policies.product_list.ttl, secs(30));
        assert_eq!(policies.product_list.client_max_age, secs(180));
        assert_eq!(policies.admin_orders.ttl, secs(5));
        assert_eq!(policies.stats.ttl, secs(600));
    }
}
