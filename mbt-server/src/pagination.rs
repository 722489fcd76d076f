//! Pagination of the artifact catalog

use serde::Serialize;

/// Artifacts per catalog page
pub const PAGE_SIZE: i64 = 50;

/// One page of the catalog, as reported back to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CatalogPage {
    /// 1-based, always within `1..=max(total_pages, 1)`
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl CatalogPage {
    /// Page `requested` of a catalog holding `total` artifacts
    ///
    /// ```
    /// use mbt_server::pagination::CatalogPage;
    ///
    /// let page = CatalogPage::new(120, 2);
    /// assert_eq!((page.total_pages, page.offset()), (3, 50));
    ///
    /// // Past the end lands on the last page
    /// assert_eq!(CatalogPage::new(120, 7).page, 3);
    /// ```
    pub fn new(total: i64, requested: i64) -> Self {
        let total = total.max(0);
        let total_pages = if total == 0 { 0 } else { (total - 1) / PAGE_SIZE + 1 };

        Self {
            page: requested.clamp(1, total_pages.max(1)),
            page_size: PAGE_SIZE,
            total,
            total_pages,
        }
    }

    /// Rows to skip before this page
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_last_page() {
        let page = CatalogPage::new(75, 2);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.offset(), 50);
    }

    #[test]
    fn test_requested_page_clamped() {
        assert_eq!(CatalogPage::new(75, 0).page, 1);
        assert_eq!(CatalogPage::new(75, -4).page, 1);
        assert_eq!(CatalogPage::new(100, 3).page, 2);
        assert_eq!(CatalogPage::new(100, 3).offset(), 50);
    }

    #[test]
    fn test_empty_catalog() {
        let page = CatalogPage::new(0, 3);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
        assert_eq!(page.offset(), 0);
    }
}
