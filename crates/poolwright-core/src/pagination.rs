//! Page slicing for task listings

use serde::{Deserialize, Serialize};

/// Largest accepted page size
pub const MAX_PER_PAGE: usize = 100;

/// Page size used when the caller gives none
pub const DEFAULT_PER_PAGE: usize = 10;

/// One page of items plus where it sits in the whole listing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

/// Position of a page within a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Pagination {
    pub current_page: usize,
    pub per_page: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_prev: bool,
    /// 1-based index of the first item on this page; 0 for an empty listing
    pub start_item: usize,
    /// 1-based index of the last item on this page
    pub end_item: usize,
}

impl Pagination {
    /// Clamp `per_page` into `[1, 100]` and `page` into `[1, total_pages]`
    pub fn new(page: usize, per_page: usize, total_items: usize) -> Self {
        let per_page = per_page.clamp(1, MAX_PER_PAGE);
        let total_pages = total_items.div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;
        let end_item = (current_page * per_page).min(total_items);

        Self {
            current_page,
            per_page,
            total_items,
            total_pages,
            has_next: current_page < total_pages,
            has_prev: current_page > 1,
            start_item: if total_items > 0 { start + 1 } else { 0 },
            end_item,
        }
    }

    fn range(&self) -> std::ops::Range<usize> {
        let start = (self.current_page - 1) * self.per_page;
        start.min(self.total_items)..self.end_item
    }
}

impl<T> Page<T> {
    /// Cut one page out of the full listing
    pub fn paginate(mut items: Vec<T>, page: usize, per_page: usize) -> Self {
        let pagination = Pagination::new(page, per_page, items.len());
        let items = items.drain(pagination.range()).collect();
        Self { items, pagination }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_page_of_twelve() {
        let page = Page::paginate((1..=12).collect::<Vec<_>>(), 2, 5);
        assert_eq!(page.items, vec![6, 7, 8, 9, 10]);
        assert_eq!(page.pagination.total_pages, 3);
        assert!(page.pagination.has_next);
        assert!(page.pagination.has_prev);
        assert_eq!(page.pagination.start_item, 6);
        assert_eq!(page.pagination.end_item, 10);
    }

    #[test]
    fn test_last_page_is_partial() {
        let page = Page::paginate((1..=12).collect::<Vec<_>>(), 3, 5);
        assert_eq!(page.items, vec![11, 12]);
        assert!(!page.pagination.has_next);
        assert_eq!(page.pagination.end_item, 12);
    }

    #[test]
    fn test_clamps() {
        let p = Pagination::new(0, 200, 250);
        assert_eq!(p.per_page, 100);
        assert_eq!(p.current_page, 1);

        let p = Pagination::new(9, 0, 3);
        assert_eq!(p.per_page, 1);
        assert_eq!(p.current_page, 3);
    }

    #[test]
    fn test_empty_listing() {
        let page = Page::<u32>::paginate(Vec::new(), 4, 10);
        assert!(page.items.is_empty());
        assert_eq!(
            page.pagination,
            Pagination {
                current_page: 1,
                per_page: 10,
                total_items: 0,
                total_pages: 1,
                has_next: false,
                has_prev: false,
                start_item: 0,
                end_item: 0,
            }
        );
    }
}
