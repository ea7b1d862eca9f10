//! Pagination primitives shared by every list endpoint.
//!
//! Both repository backends produce pages through [`Page::from_items`] (the
//! in-memory path) or [`Page::new`] (the SQL path), so the metadata math
//! lives in exactly one place.

use serde::{Deserialize, Serialize};

/// Largest accepted page size. Requests above it are clamped, not rejected.
pub const MAX_PAGE_SIZE: u32 = 100;
/// Page size applied when the caller does not supply one.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Validated page/size pair.
///
/// `page` is 1-based and clamped to >= 1; `size` is clamped to
/// `[1, MAX_PAGE_SIZE]`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageParams {
    page: u32,
    size: u32,
}

impl PageParams {
    /// Build params from raw (possibly out-of-range) values.
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page: page.max(1),
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Build params from optional query values, applying defaults.
    pub fn from_query(page: Option<u32>, size: Option<u32>) -> Self {
        Self::new(page.unwrap_or(1), size.unwrap_or(DEFAULT_PAGE_SIZE))
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Zero-based item offset of this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }
}

impl Default for PageParams {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus listing metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Total matching rows across all pages.
    pub total: u64,
    pub page: u32,
    pub size: u32,
    /// `ceil(total / size)`, and 1 when total is 0.
    pub pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    /// Assemble a page from an already-sliced item vector and the total count.
    pub fn new(items: Vec<T>, total: u64, params: PageParams) -> Self {
        let size = u64::from(params.size());
        let pages = if total == 0 {
            1
        } else {
            total.div_ceil(size) as u32
        };
        let page = params.page();
        Self {
            items,
            total,
            page,
            size: params.size(),
            pages,
            has_next: page < pages,
            has_previous: page > 1,
        }
    }

    /// Slice the requested page out of the full (already filtered and sorted)
    /// result set. Used by the in-memory repository.
    pub fn from_items(all: Vec<T>, params: PageParams) -> Self {
        let total = all.len() as u64;
        let start = params.offset().min(total) as usize;
        let end = (params.offset() + u64::from(params.size())).min(total) as usize;
        let items = all.into_iter().skip(start).take(end - start).collect();
        Self::new(items, total, params)
    }

    /// Map item type while keeping the metadata.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
            pages: self.pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_clamping() {
        let p = PageParams::new(0, 0);
        assert_eq!(p.page(), 1);
        assert_eq!(p.size(), 1);

        let p = PageParams::new(3, 500);
        assert_eq!(p.size(), MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 200);
    }

    #[test]
    fn test_empty_result_set_has_one_page() {
        let page: Page<i32> = Page::new(vec![], 0, PageParams::new(1, 10));
        assert_eq!(page.pages, 1);
        assert!(!page.has_next);
        assert!(!page.has_previous);
    }

    #[test]
    fn test_metadata_for_25_rows_page_3_of_10() {
        let all: Vec<i32> = (0..25).collect();
        let page = Page::from_items(all, PageParams::new(3, 10));
        assert_eq!(page.items.len(), 5);
        assert_eq!(page.total, 25);
        assert_eq!(page.pages, 3);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn test_page_beyond_end_is_empty() {
        let all: Vec<i32> = (0..5).collect();
        let page = Page::from_items(all, PageParams::new(7, 10));
        assert!(page.items.is_empty());
        assert_eq!(page.pages, 1);
        assert!(!page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn test_item_count_matches_formula() {
        // items == min(size, max(0, total - (page-1)*size))
        for total in [0u64, 1, 9, 10, 11, 95, 100] {
            for (page, size) in [(1u32, 10u32), (2, 10), (3, 7), (50, 3)] {
                let all: Vec<u64> = (0..total).collect();
                let params = PageParams::new(page, size);
                let result = Page::from_items(all, params);
                let expected = u64::from(size)
                    .min(total.saturating_sub(u64::from(page - 1) * u64::from(size)));
                assert_eq!(result.items.len() as u64, expected, "total={total} page={page} size={size}");
            }
        }
    }
}
