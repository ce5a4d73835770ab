//! Review types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A product review.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Review {
    pub id: u64,
    pub product_id: u64,
    pub author: String,
    /// 1 to 5 stars.
    pub rating: u8,
    pub body: String,
    /// Only approved reviews are shown on product pages.
    #[serde(default)]
    pub approved: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A review as submitted by a customer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewReview {
    pub product_id: u64,
    pub author: String,
    pub rating: u8,
    pub body: String,
}

impl NewReview {
    pub fn new(product_id: u64, author: impl Into<String>, rating: u8, body: impl Into<String>) -> Self {
        Self {
            product_id,
            author: author.into(),
            rating,
            body: body.into(),
        }
    }

    /// Ratings run 1 to 5 and the body must not be blank.
    pub fn validate(&self) -> StoreResult<()> {
        if !(1..=5).contains(&self.rating) {
            return Err(StoreError::validation(format!(
                "rating must be between 1 and 5, got {}",
                self.rating
            )));
        }
        if self.body.trim().is_empty() {
            return Err(StoreError::validation("review body is required"));
        }
        if self.author.trim().is_empty() {
            return Err(StoreError::validation("review author is required"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_validation() {
        assert!(NewReview::new(1, "Ana", 5, "Sturdy and comfortable").validate().is_ok());
        assert!(NewReview::new(1, "Ana", 1, "Wobbly").validate().is_ok());

        assert!(NewReview::new(1, "Ana", 0, "Fine").validate().is_err());
        assert!(NewReview::new(1, "Ana", 6, "Fine").validate().is_err());
        assert!(NewReview::new(1, "Ana", 4, "   ").validate().is_err());
        assert!(NewReview::new(1, "", 4, "Fine").validate().is_err());
    }

    #[test]
    fn test_validation_message() {
        let err = NewReview::new(1, "Ana", 9, "Fine").validate().unwrap_err();
        assert_eq!(err.to_string(), "validation error: rating must be between 1 and 5, got 9");
    }
}
