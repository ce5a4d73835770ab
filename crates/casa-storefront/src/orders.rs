//! Order history and admin order management.

use std::collections::HashMap;
use std::time::Duration;

use casa_cache::{cache_key, CacheHeaders};
use casa_data::{Backend, QueryError, QueryRequest, ResourceTag};
use casa_executor::{Degrade, FallbackCascade};
use serde_json::json;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::model::{Order, OrderItem, OrderStatus, Page};
use crate::response::ApiResponse;
use crate::storefront::Storefront;

const ORDERS: &str = "orders";
const ORDER_ITEMS: &str = "order_items";

/// Upper bound on one order-history strategy, retries included.
const ORDER_STRATEGY_TIMEOUT: Duration = Duration::from_secs(15);

/// Rows per admin orders page.
pub const ADMIN_ORDERS_PER_PAGE: u32 = 25;

impl<B: Backend> Storefront<B> {
    /// A customer's orders, newest first, with their items.
    ///
    /// Not cached. Loads try, in order: orders with embedded items, orders
    /// then their items in a second query, orders alone. If every strategy
    /// fails the response is an empty, degraded list.
    pub async fn order_history(&self, user_id: &str) -> ApiResponse<Vec<Order>> {
        let outcome = FallbackCascade::<Vec<Order>, QueryError>::new("order_history")
            .with_default_timeout(ORDER_STRATEGY_TIMEOUT)
            .strategy("embedded", move || async move {
                self.client
                    .fetch::<Vec<Order>>(ResourceTag::Orders, user_orders(user_id, "*, order_items(*)"))
                    .await
            })
            .strategy("two-step", move || async move {
                let orders: Vec<Order> = self
                    .client
                    .fetch(ResourceTag::Orders, user_orders(user_id, "*"))
                    .await?;
                if orders.is_empty() {
                    return Ok(orders);
                }

                let ids: Vec<u64> = orders.iter().map(|order| order.id).collect();
                let items: Vec<OrderItem> = self
                    .client
                    .fetch(
                        ResourceTag::OrderItems,
                        QueryRequest::select(ORDER_ITEMS, "*").is_in("order_id", ids),
                    )
                    .await?;
                Ok::<_, QueryError>(attach_items(orders, items))
            })
            .strategy("orders-only", move || async move {
                self.client
                    .fetch::<Vec<Order>>(ResourceTag::Orders, user_orders(user_id, "*"))
                    .await
            })
            .run()
            .await;

        if outcome.degraded {
            self.mark_degraded();
            return ApiResponse::degraded(outcome.value);
        }

        debug!(
            strategy = outcome.winner().unwrap_or_default(),
            orders = outcome.value.len(),
            "order history loaded"
        );
        ApiResponse::new(outcome.value, CacheHeaders::no_store().build())
    }

    /// One page of all orders, newest first, without items.
    ///
    /// Cached under `orders:admin:<page>`. Failures are returned, not
    /// degraded.
    pub async fn admin_orders(&self, page: u32) -> StoreResult<ApiResponse<Page<Order>>> {
        let page = page.max(1);
        let per_page = ADMIN_ORDERS_PER_PAGE;
        let key = cache_key!(ORDERS, "admin", page);

        let from = (page as usize - 1) * per_page as usize;
        let request = QueryRequest::select(ORDERS, "*")
            .order("created_at", false)
            .range(from, from + per_page as usize - 1)
            .with_count();

        self.cached_read(
            key,
            &self.policies.admin_orders,
            Degrade::Propagate,
            move || async move {
                let (items, count): (Vec<Order>, _) = self
                    .client
                    .fetch_with_count(ResourceTag::Orders, request)
                    .await?;
                let total = count.unwrap_or(items.len() as u64);
                Ok::<_, QueryError>(Page::new(items, page, per_page, total))
            },
        )
        .await
    }

    /// Set the status of order `id`.
    pub async fn update_order_status(&self, id: u64, status: OrderStatus) -> StoreResult<Order> {
        let request = QueryRequest::update(ORDERS, json!({ "status": status })).eq("id", id);
        let rows: Vec<Order> = self.client.fetch(ResourceTag::Orders, request).await?;
        let order = rows.into_iter().next().ok_or(StoreError::NotFound {
            resource: "order",
            id,
        })?;

        self.invalidate(&[ORDERS]);
        Ok(order)
    }
}

fn user_orders(user_id: &str, columns: &str) -> QueryRequest {
    QueryRequest::select(ORDERS, columns)
        .eq("user_id", user_id)
        .order("created_at", false)
}

fn attach_items(mut orders: Vec<Order>, items: Vec<OrderItem>) -> Vec<Order> {
    let mut by_order: HashMap<u64, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item);
    }
    for order in &mut orders {
        order.items = by_order.remove(&order.id).unwrap_or_default();
    }
    orders
}
