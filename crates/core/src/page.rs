use serde::{Deserialize, Serialize};

/// Page-number pagination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub page_size: u64,
}

impl PageRequest {
    /// Missing or zero values fall back to page 1 / `default_size`; the page
    /// size never exceeds `max_size`
    pub fn new(
        page: Option<u64>,
        page_size: Option<u64>,
        default_size: u64,
        max_size: u64,
    ) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            page_size: page_size
                .filter(|s| *s > 0)
                .unwrap_or(default_size)
                .min(max_size)
                .max(1),
        }
    }

    /// Rows to skip, `None` when the page lies beyond addressable rows
    pub fn offset(&self) -> Option<u64> {
        (self.page - 1).checked_mul(self.page_size)
    }

    /// `(LIMIT, OFFSET)` as SQL bigints, `None` if either does not fit
    pub fn sql_bounds(&self) -> Option<(i64, i64)> {
        let limit = i64::try_from(self.page_size).ok()?;
        let offset = i64::try_from(self.offset()?).ok()?;
        Some((limit, offset))
    }

    /// At least one page, even when empty
    pub fn total_pages(&self, count: u64) -> u64 {
        count.div_ceil(self.page_size).max(1)
    }

    pub fn in_range(&self, count: u64) -> bool {
        self.page <= self.total_pages(count)
    }
}

/// Paginated list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub page: PageInfo,
    pub links: PageLinks,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageInfo {
    pub current_page: u64,
    pub next_page: Option<u64>,
    pub prev_page: Option<u64>,
    pub total_pages: u64,
    pub page_size: u64,
    pub count: u64,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageLinks {
    pub next: Option<String>,
    pub previous: Option<String>,
}

impl<T> Page<T> {
    /// Build a page; `link` renders the URL of a given page number
    pub fn new(
        request: &PageRequest,
        count: u64,
        results: Vec<T>,
        link: impl Fn(u64) -> String,
    ) -> Self {
        let total_pages = request.total_pages(count);
        let next_page = (request.page < total_pages).then(|| request.page + 1);
        let prev_page = (request.page > 1).then(|| request.page - 1);

        Self {
            page: PageInfo {
                current_page: request.page,
                next_page,
                prev_page,
                total_pages,
                page_size: request.page_size,
                count,
                source: "db".to_string(),
            },
            links: PageLinks {
                next: next_page.map(&link),
                previous: prev_page.map(&link),
            },
            results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let request = PageRequest::new(None, Some(0), 10, 100);
        assert_eq!(request, PageRequest { page: 1, page_size: 10 });
        assert_eq!(request.offset(), Some(0));
        assert_eq!(request.total_pages(0), 1);
        assert_eq!(request.total_pages(21), 3);
    }

    #[test]
    fn test_middle_page_links() {
        let request = PageRequest::new(Some(2), Some(5), 10, 100);
        let page = Page::new(&request, 12, vec![1, 2, 3, 4, 5], |n| format!("/c?page={n}"));

        assert_eq!(page.page.total_pages, 3);
        assert_eq!(page.page.next_page, Some(3));
        assert_eq!(page.page.prev_page, Some(1));
        assert_eq!(page.links.next.as_deref(), Some("/c?page=3"));
        assert_eq!(page.links.previous.as_deref(), Some("/c?page=1"));
        assert_eq!(request.offset(), Some(5));
    }

    #[test]
    fn test_out_of_range() {
        let request = PageRequest::new(Some(4), Some(5), 10, 100);
        assert!(!request.in_range(12));
        assert!(PageRequest::new(Some(1), None, 10, 100).in_range(0));
    }

    #[test]
    fn test_page_size_capped() {
        assert_eq!(PageRequest::new(None, Some(5000), 10, 100).page_size, 100);
        assert_eq!(PageRequest::new(None, None, 500, 100).page_size, 100);
    }

    #[test]
    fn test_huge_page_has_no_bounds() {
        let request = PageRequest::new(Some(u64::MAX), Some(2), 10, 100);
        assert_eq!(request.offset(), None);
        assert_eq!(request.sql_bounds(), None);

        // Fits in u64 but not in a bigint
        let request = PageRequest::new(Some(u64::MAX / 4), Some(4), 10, 100);
        assert!(request.offset().is_some());
        assert_eq!(request.sql_bounds(), None);

        let request = PageRequest::new(Some(3), Some(20), 10, 100);
        assert_eq!(request.sql_bounds(), Some((20, 40)));
    }
}
