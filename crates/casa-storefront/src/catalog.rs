//! Catalog reads and admin product writes.

use casa_cache::cache_key;
use casa_data::{Backend, QueryError, QueryRequest, ResourceTag};
use casa_executor::Degrade;
use chrono::Utc;
use http::StatusCode;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::model::{
    Category, NewProduct, Page, Product, ProductListQuery, ProductPatch, ProductStats, StockLevel,
};
use crate::response::ApiResponse;
use crate::storefront::Storefront;

const PRODUCTS: &str = "products";
const CATEGORIES: &str = "categories";

impl<B: Backend> Storefront<B> {
    /// One page of products matching `query`.
    ///
    /// Cached under `products:list:<page>:<per_page>[:cat=<category>][:featured][:q=<search>]`.
    pub async fn list_products(&self, query: &ProductListQuery) -> StoreResult<ApiResponse<Page<Product>>> {
        let query = query.clone().normalized();
        // Optional filters are tagged; a category and a search term with the
        // same text must not collide.
        let key = cache_key!(
            PRODUCTS,
            "list",
            query.page,
            query.per_page,
            query.category.as_ref().map(|category| format!("cat={category}")),
            query.featured.then_some("featured"),
            query.search.as_ref().map(|search| format!("q={search}"))
        );
        let (page, per_page) = (query.page, query.per_page);
        let request = list_request(&query);

        self.cached_read(
            key,
            &self.policies.product_list,
            Degrade::value(Page::empty(page, per_page)),
            move || async move {
                let (items, count): (Vec<Product>, _) = self
                    .client
                    .fetch_with_count(ResourceTag::Products, request)
                    .await?;
                let total = count.unwrap_or(items.len() as u64);
                Ok::<_, QueryError>(Page::new(items, page, per_page, total))
            },
        )
        .await
    }

    /// A single product, `404` when it does not exist.
    pub async fn product(&self, id: u64) -> StoreResult<ApiResponse<Option<Product>>> {
        let key = cache_key!(PRODUCTS, "detail", id);
        let response = self
            .cached_read(key, &self.policies.product_detail, Degrade::Empty, move || async move {
                let rows: Vec<Product> = self
                    .client
                    .fetch(ResourceTag::Products, QueryRequest::select(PRODUCTS, "*").eq("id", id))
                    .await?;
                Ok::<_, QueryError>(rows.into_iter().next())
            })
            .await?;

        if response.body.is_none() && !response.degraded {
            return Ok(response.with_status(StatusCode::NOT_FOUND));
        }
        Ok(response)
    }

    /// Catalog-wide counters, cached under `products:stats`.
    pub async fn product_stats(&self) -> StoreResult<ApiResponse<ProductStats>> {
        let key = cache_key!(PRODUCTS, "stats");
        self.cached_read(key, &self.policies.stats, Degrade::Empty, move || async move {
            let levels: Vec<StockLevel> = self
                .client
                .fetch(ResourceTag::Stats, QueryRequest::select(PRODUCTS, StockLevel::COLUMNS))
                .await?;
            Ok::<_, QueryError>(ProductStats::tally(&levels))
        })
        .await
    }

    /// All categories by name, cached under `categories:all`.
    pub async fn categories(&self) -> StoreResult<ApiResponse<Vec<Category>>> {
        let key = cache_key!(CATEGORIES, "all");
        self.cached_read(key, &self.policies.categories, Degrade::Empty, move || async move {
            self.client
                .fetch::<Vec<Category>>(
                    ResourceTag::Categories,
                    QueryRequest::select(CATEGORIES, "*").order("name", true),
                )
                .await
        })
        .await
    }

    /// Insert a product.
    pub async fn create_product(&self, product: &NewProduct) -> StoreResult<Product> {
        product.validate()?;

        let mut row = serde_json::to_value(product)?;
        if let Value::Object(fields) = &mut row {
            fields.insert("created_at".to_string(), serde_json::to_value(Utc::now())?);
        }

        let rows: Vec<Product> = self
            .client
            .fetch(ResourceTag::Products, QueryRequest::insert(PRODUCTS, row))
            .await?;
        let created = rows.into_iter().next().ok_or(StoreError::EmptyWrite(PRODUCTS))?;

        if product.category.is_some() {
            self.invalidate(&[PRODUCTS, CATEGORIES]);
        } else {
            self.invalidate(&[PRODUCTS]);
        }
        Ok(created)
    }

    /// Apply `patch` to product `id`.
    pub async fn update_product(&self, id: u64, patch: &ProductPatch) -> StoreResult<Product> {
        patch.validate()?;

        let request = QueryRequest::update(PRODUCTS, serde_json::to_value(patch)?).eq("id", id);
        let rows: Vec<Product> = self.client.fetch(ResourceTag::Products, request).await?;
        let updated = rows.into_iter().next().ok_or(StoreError::NotFound {
            resource: "product",
            id,
        })?;

        if patch.category.is_some() {
            self.invalidate(&[PRODUCTS, CATEGORIES]);
        } else {
            self.invalidate(&[PRODUCTS]);
        }
        Ok(updated)
    }

    /// Delete product `id`.
    pub async fn delete_product(&self, id: u64) -> StoreResult<()> {
        let request = QueryRequest::delete(PRODUCTS).eq("id", id);
        let rows: Vec<Value> = self.client.fetch(ResourceTag::Products, request).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound {
                resource: "product",
                id,
            });
        }

        self.invalidate(&[PRODUCTS, CATEGORIES]);
        Ok(())
    }
}

fn list_request(query: &ProductListQuery) -> QueryRequest {
    let mut request = QueryRequest::select(PRODUCTS, "*");
    if let Some(category) = &query.category {
        request = request.eq("category", category.as_str());
    }
    if query.featured {
        request = request.eq("featured", true);
    }
    if let Some(search) = &query.search {
        request = request.ilike("name", format!("%{}%", escape_like(search)));
    }
    let (from, to) = query.row_range();
    request
        .order("created_at", false)
        .range(from, to)
        .with_count()
}

/// Make `%`, `_` and `\` match literally inside an `ILIKE` pattern.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use casa_data::Filter;

    use super::*;

    #[test]
    fn test_list_request_filters() {
        let query = ProductListQuery::new()
            .page(2)
            .per_page(10)
            .category("chairs")
            .featured()
            .search("oak");
        let request = list_request(&query);

        assert_eq!(request.filters.len(), 3);
        assert_eq!(
            request.filters[2],
            Filter::Ilike {
                column: "name".to_string(),
                pattern: "%oak%".to_string(),
            }
        );
        assert_eq!(request.range, Some((10, 19)));
        assert!(request.count);
    }

    #[test]
    fn test_search_wildcards_escaped() {
        assert_eq!(escape_like("50%"), r"50\%");
        assert_eq!(escape_like("oak_chair"), r"oak\_chair");
        assert_eq!(escape_like(r"a\b"), r"a\\b");
        assert_eq!(escape_like("walnut"), "walnut");

        let request = list_request(&ProductListQuery::new().search("50%"));
        assert_eq!(
            request.filters[0],
            Filter::Ilike {
                column: "name".to_string(),
                pattern: r"%50\%%".to_string(),
            }
        );
    }

    #[test]
    fn test_list_request_without_filters() {
        let request = list_request(&ProductListQuery::new());
        assert!(request.filters.is_empty());
        assert_eq!(request.range, Some((0, 19)));
    }
}
