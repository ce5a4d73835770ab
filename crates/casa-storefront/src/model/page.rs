//! Paged results.

use serde::{Deserialize, Serialize};

/// One page of a listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    /// Rows on this page.
    pub items: Vec<T>,
    /// Current page (1-indexed).
    pub page: u32,
    /// Rows per page.
    pub per_page: u32,
    /// Rows across all pages.
    pub total: u64,
    /// Number of pages.
    pub total_pages: u32,
}

impl<T> Page<T> {
    /// Create a page.
    pub fn new(items: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(u64::from(per_page)) as u32
        };
        Self {
            items,
            page,
            per_page,
            total,
            total_pages,
        }
    }

    /// A page with no rows.
    pub fn empty(page: u32, per_page: u32) -> Self {
        Self::new(Vec::new(), page, per_page, 0)
    }

    /// Whether a later page exists.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// Whether an earlier page exists.
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self::empty(1, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_math() {
        let page = Page::new(vec![1, 2], 2, 2, 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next());
        assert!(page.has_prev());

        let last = Page::new(vec![5], 3, 2, 5);
        assert!(!last.has_next());
    }

    #[test]
    fn test_empty_page() {
        let page: Page<u32> = Page::empty(1, 20);
        assert!(page.is_empty());
        assert_eq!(page.total_pages, 0);
        assert!(!page.has_next());
        assert!(!page.has_prev());
    }
}
