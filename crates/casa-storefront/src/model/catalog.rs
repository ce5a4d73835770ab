//! Catalog types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

const MAX_PER_PAGE: u32 = 100;
const DEFAULT_PER_PAGE: u32 = 20;

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: u64,
    pub name: String,
    /// URL-friendly slug (unique).
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    /// Category slug.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub featured: bool,
    /// Units on hand.
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Mean rating of approved reviews.
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Check if the product can be ordered.
    pub fn is_in_stock(&self) -> bool {
        self.stock > 0
    }
}

/// Fields for a new product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProduct {
    pub name: String,
    pub slug: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub stock: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl NewProduct {
    /// Create a product with no category and no stock.
    pub fn new(name: impl Into<String>, slug: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            slug: slug.into(),
            description: None,
            price,
            category: None,
            featured: false,
            stock: 0,
            image_url: None,
        }
    }

    /// Set the category slug.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set units on hand.
    pub fn stock(mut self, stock: i64) -> Self {
        self.stock = stock;
        self
    }

    /// Mark as featured.
    pub fn featured(mut self) -> Self {
        self.featured = true;
        self
    }

    /// Reject blank names, bad prices and negative stock.
    pub fn validate(&self) -> StoreResult<()> {
        if self.name.trim().is_empty() {
            return Err(StoreError::validation("product name is required"));
        }
        if self.slug.trim().is_empty() {
            return Err(StoreError::validation("product slug is required"));
        }
        validate_price(self.price)?;
        validate_stock(self.stock)
    }
}

/// Partial product update. Unset fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl ProductPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Reject empty patches and out-of-range values.
    pub fn validate(&self) -> StoreResult<()> {
        if self.is_empty() {
            return Err(StoreError::validation("nothing to update"));
        }
        if self.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(StoreError::validation("product name is required"));
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(stock) = self.stock {
            validate_stock(stock)?;
        }
        Ok(())
    }
}

fn validate_price(price: f64) -> StoreResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(StoreError::validation(format!("invalid price: {price}")));
    }
    Ok(())
}

fn validate_stock(stock: i64) -> StoreResult<()> {
    if stock < 0 {
        return Err(StoreError::validation(format!("invalid stock: {stock}")));
    }
    Ok(())
}

/// A product category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Columns read to compute `ProductStats`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLevel {
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub category: Option<String>,
}

impl StockLevel {
    /// Backend projection for this shape.
    pub const COLUMNS: &'static str = "price, stock, featured, category";
}

/// Catalog-wide counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProductStats {
    pub total_products: u64,
    pub featured: u64,
    pub in_stock: u64,
    pub out_of_stock: u64,
    /// Mean list price, rounded to cents.
    pub average_price: f64,
    /// Products per category slug.
    pub by_category: BTreeMap<String, u64>,
}

impl ProductStats {
    /// Aggregate stock levels.
    pub fn tally(levels: &[StockLevel]) -> Self {
        let mut stats = Self::default();
        let mut price_sum = 0.0;

        for level in levels {
            stats.total_products += 1;
            price_sum += level.price;
            if level.featured {
                stats.featured += 1;
            }
            if level.stock > 0 {
                stats.in_stock += 1;
            } else {
                stats.out_of_stock += 1;
            }
            if let Some(category) = &level.category {
                *stats.by_category.entry(category.clone()).or_default() += 1;
            }
        }

        if stats.total_products > 0 {
            let mean = price_sum / stats.total_products as f64;
            stats.average_price = (mean * 100.0).round() / 100.0;
        }
        stats
    }
}

/// Product listing filters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductListQuery {
    /// Page number (1-indexed).
    pub page: u32,
    pub per_page: u32,
    /// Category slug.
    #[serde(default)]
    pub category: Option<String>,
    /// Only featured products.
    #[serde(default)]
    pub featured: bool,
    /// Case-insensitive name search.
    #[serde(default)]
    pub search: Option<String>,
}

impl Default for ProductListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
            category: None,
            featured: false,
            search: None,
        }
    }
}

impl ProductListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn featured(mut self) -> Self {
        self.featured = true;
        self
    }

    pub fn search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// Clamp paging into range, drop blank text filters and lowercase the
    /// search term.
    pub fn normalized(mut self) -> Self {
        self.page = self.page.max(1);
        self.per_page = match self.per_page {
            0 => DEFAULT_PER_PAGE,
            n => n.min(MAX_PER_PAGE),
        };
        self.category = non_blank(self.category);
        self.search = non_blank(self.search).map(|s| s.to_lowercase());
        self
    }

    /// Inclusive zero-based row range for this page.
    pub fn row_range(&self) -> (usize, usize) {
        let per_page = self.per_page.max(1) as usize;
        let from = (self.page.max(1) as usize - 1) * per_page;
        (from, from + per_page - 1)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
