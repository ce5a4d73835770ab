//! Storefront loaders and admin mutations for the casa furniture shop.
//!
//! Reads go through the shared `TtlCache` and the resilient backend
//! client; when a read fails the caller still gets an answer, marked
//! degraded and sent with `Cache-Control: no-store`. Admin writes
//! invalidate every cached key mentioning the resources they touch.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use casa_cache::TtlCache;
//! use casa_storefront::prelude::*;
//!
//! let store = Storefront::new(backend, Arc::new(TtlCache::new()));
//!
//! let response = store.list_products(&ProductListQuery::new().category("chairs")).await?;
//! assert_eq!(response.cache_control(), Some("public, max-age=180, s-maxage=300"));
//!
//! store.create_product(&NewProduct::new("Oak Chair", "oak-chair", 149.0)).await?;
//! ```

pub mod error;
pub mod model;
pub mod response;

mod catalog;
mod orders;
mod reviews;
mod storefront;

pub use error::{StoreError, StoreResult};
pub use model::*;
pub use response::ApiResponse;
pub use storefront::Storefront;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{StoreError, StoreResult};
    pub use crate::model::{
        Category, NewProduct, NewReview, Order, OrderItem, OrderStatus, Page, Product,
        ProductListQuery, ProductPatch, ProductStats, Review,
    };
    pub use crate::response::ApiResponse;
    pub use crate::storefront::Storefront;
}
