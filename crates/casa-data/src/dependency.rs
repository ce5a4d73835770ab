//! Resource tags for backend queries.

use std::time::Duration;

/// Resource families the storefront queries.
///
/// Each tag carries a default attempt timeout and retry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceTag {
    /// Product listings and detail pages.
    Products,
    /// Category list.
    Categories,
    /// Catalog aggregates.
    Stats,
    /// Orders.
    Orders,
    /// Order line items.
    OrderItems,
    /// Product reviews.
    Reviews,
    /// Session health checks and refresh.
    Session,
    /// Custom resource with name.
    Custom(&'static str),
}

impl ResourceTag {
    /// Default per-attempt timeout.
    pub fn default_timeout(&self) -> Duration {
        match self {
            Self::Products | Self::Reviews => Duration::from_secs(8),
            Self::Categories | Self::Stats | Self::Session => Duration::from_secs(5),
            Self::Orders | Self::OrderItems | Self::Custom(_) => Duration::from_secs(10),
        }
    }

    /// Default retries after the first attempt.
    pub fn default_max_retries(&self) -> u32 {
        match self {
            Self::Session => 0, // keep-alive has its own cadence
            _ => 2,
        }
    }

    /// Get the name of this resource.
    pub fn name(&self) -> &str {
        match self {
            Self::Products => "products",
            Self::Categories => "categories",
            Self::Stats => "stats",
            Self::Orders => "orders",
            Self::OrderItems => "order_items",
            Self::Reviews => "reviews",
            Self::Session => "session",
            Self::Custom(name) => name,
        }
    }
}

impl std::fmt::Display for ResourceTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timeouts_in_range() {
        for tag in [
            ResourceTag::Products,
            ResourceTag::Categories,
            ResourceTag::Stats,
            ResourceTag::Orders,
            ResourceTag::OrderItems,
            ResourceTag::Reviews,
            ResourceTag::Session,
            ResourceTag::Custom("wishlist"),
        ] {
            let timeout = tag.default_timeout();
            assert!(timeout >= Duration::from_secs(5) && timeout <= Duration::from_secs(10), "{tag}");
        }
    }

    #[test]
    fn test_names() {
        assert_eq!(ResourceTag::OrderItems.to_string(), "order_items");
        assert_eq!(ResourceTag::Custom("wishlist").name(), "wishlist");
        assert_eq!(ResourceTag::Session.default_max_retries(), 0);
        assert_eq!(ResourceTag::Orders.default_max_retries(), 2);
    }
}
