//! In-process caching for storefront reads.
//!
//! This crate provides:
//! - `TtlCache` - Key/value store with per-entry expiry and substring invalidation
//! - `CacheKey` / `cache_key!` - Deterministic key composition
//! - `cached_query` - Read-through orchestration that never caches failures
//! - `ResourceCachePolicy` - Per-resource server TTLs and client/CDN max-ages
//! - `CacheHeaders` - `Cache-Control` / `Vary` response headers
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use casa_cache::{cache_key, cached_query, TtlCache};
//!
//! let cache = Arc::new(TtlCache::new());
//! let key = cache_key!("products", "list", page, per_page, category);
//!
//! let products: Vec<Product> = cached_query(&cache, &key, Duration::from_secs(300), || async {
//!     client.select_products(page, per_page).await
//! })
//! .await?;
//!
//! // After an admin write:
//! cache.invalidate("products");
//! ```

mod error;
mod headers;
mod key;
mod policy;
mod query;
mod store;

pub use error::*;
pub use headers::*;
pub use key::*;
pub use policy::*;
pub use query::*;
pub use store::*;
