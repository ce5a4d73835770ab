//! Product reviews and moderation.

use casa_cache::cache_key;
use casa_data::{Backend, QueryRequest, ResourceTag};
use casa_executor::Degrade;
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::{StoreError, StoreResult};
use crate::model::{NewReview, Review};
use crate::response::ApiResponse;
use crate::storefront::Storefront;

const REVIEWS: &str = "reviews";
const PRODUCTS: &str = "products";

impl<B: Backend> Storefront<B> {
    /// Approved reviews for a product, newest first.
    ///
    /// Cached under `reviews:product:<id>`.
    pub async fn product_reviews(&self, product_id: u64) -> StoreResult<ApiResponse<Vec<Review>>> {
        let key = cache_key!(REVIEWS, "product", product_id);
        self.cached_read(key, &self.policies.reviews, Degrade::Empty, move || async move {
            self.client
                .fetch::<Vec<Review>>(
                    ResourceTag::Reviews,
                    QueryRequest::select(REVIEWS, "*")
                        .eq("product_id", product_id)
                        .eq("approved", true)
                        .order("created_at", false),
                )
                .await
        })
        .await
    }

    /// Store a customer review for moderation.
    ///
    /// The review stays hidden until approved.
    pub async fn submit_review(&self, review: &NewReview) -> StoreResult<Review> {
        review.validate()?;

        let mut row = serde_json::to_value(review)?;
        if let Value::Object(fields) = &mut row {
            fields.insert("approved".to_string(), Value::Bool(false));
            fields.insert("created_at".to_string(), serde_json::to_value(Utc::now())?);
        }

        let rows: Vec<Review> = self
            .client
            .fetch(ResourceTag::Reviews, QueryRequest::insert(REVIEWS, row))
            .await?;
        let created = rows.into_iter().next().ok_or(StoreError::EmptyWrite(REVIEWS))?;

        self.invalidate(&[REVIEWS]);
        Ok(created)
    }

    /// Publish review `id`.
    pub async fn approve_review(&self, id: u64) -> StoreResult<Review> {
        let request = QueryRequest::update(REVIEWS, json!({ "approved": true })).eq("id", id);
        let rows: Vec<Review> = self.client.fetch(ResourceTag::Reviews, request).await?;
        let review = rows.into_iter().next().ok_or(StoreError::NotFound {
            resource: "review",
            id,
        })?;

        // Product pages show ratings.
        self.invalidate(&[REVIEWS, PRODUCTS]);
        Ok(review)
    }

    /// Remove review `id`.
    pub async fn delete_review(&self, id: u64) -> StoreResult<()> {
        let request = QueryRequest::delete(REVIEWS).eq("id", id);
        let rows: Vec<Value> = self.client.fetch(ResourceTag::Reviews, request).await?;
        if rows.is_empty() {
            return Err(StoreError::NotFound {
                resource: "review",
                id,
            });
        }

        self.invalidate(&[REVIEWS, PRODUCTS]);
        Ok(())
    }
}
