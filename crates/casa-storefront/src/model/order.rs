//! Order types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Order placed, awaiting processing.
    #[default]
    Pending,
    /// Order being prepared.
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(OrderStatus::Pending),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A line on an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub id: u64,
    pub order_id: u64,
    pub product_id: u64,
    pub quantity: u32,
    /// Price per unit when the order was placed.
    pub unit_price: f64,
}

impl OrderItem {
    pub fn line_total(&self) -> f64 {
        self.unit_price * f64::from(self.quantity)
    }
}

/// A customer order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: u64,
    pub user_id: String,
    #[serde(default)]
    pub status: OrderStatus,
    pub total: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Lines, when loaded.
    #[serde(default, rename = "order_items")]
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Units across all loaded lines.
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("SHIPPED"), Some(OrderStatus::Shipped));
        assert_eq!(OrderStatus::parse("lost"), None);
    }

    #[test]
    fn test_order_decodes_embedded_items() {
        let order: Order = serde_json::from_value(json!({
            "id": 1,
            "user_id": "u-1",
            "status": "shipped",
            "total": 300.0,
            "created_at": "2026-03-01T10:00:00Z",
            "order_items": [
                { "id": 10, "order_id": 1, "product_id": 5, "quantity": 2, "unit_price": 150.0 }
            ]
        }))
        .unwrap();

        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.items[0].line_total(), 300.0);
        assert!(order.created_at.is_some());
    }

    #[test]
    fn test_order_without_items() {
        let order: Order = serde_json::from_value(json!({ "id": 2, "user_id": "u-1", "total": 0 })).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.items.is_empty());
    }
}
