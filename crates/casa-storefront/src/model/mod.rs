//! Storefront data model.
//!
//! Field names follow the backend's table columns.

mod catalog;
mod order;
mod page;
mod review;

pub use catalog::{
    Category, NewProduct, Product, ProductListQuery, ProductPatch, ProductStats, StockLevel,
};
pub use order::{Order, OrderItem, OrderStatus};
pub use page::Page;
pub use review::{NewReview, Review};
