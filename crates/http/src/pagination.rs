//! Page/limit handling shared by listing endpoints.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: usize = 10;
pub const MAX_PAGE_LIMIT: usize = 100;

/// Raw `?page=&limit=` query parameters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Normalized pagination: `page >= 1`, `1 <= limit <= MAX_PAGE_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
}

impl Pagination {
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        let page = page
            .filter(|p| *p >= 1)
            .map_or(1, |p| usize::try_from(p).unwrap_or(usize::MAX));
        let limit = limit
            .filter(|l| *l >= 1)
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX).min(MAX_PAGE_LIMIT))
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        Self { page, limit }
    }

    pub fn skip(&self) -> usize {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    pub fn total_pages(&self, total: usize) -> usize {
        total.div_ceil(self.limit)
    }
}

impl From<PageParams> for Pagination {
    fn from(params: PageParams) -> Self {
        Self::new(params.page, params.limit)
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRef {
    pub page: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageLinks {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<PageRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prev: Option<PageRef>,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Paginated<T> {
    pub data: Vec<T>,
    /// Items on this page
    pub count: usize,
    pub current_page: usize,
    pub total_pages: usize,
    /// Items across all pages
    pub total: usize,
    pub pagination: PageLinks,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total: usize) -> Self {
        let Pagination { page, limit } = pagination;
        let next = (pagination.skip().saturating_add(limit) < total).then_some(PageRef {
            page: page.saturating_add(1),
            limit,
        });
        let prev = (page > 1).then_some(PageRef {
            page: page - 1,
            limit,
        });

        Self {
            count: data.len(),
            data,
            current_page: page,
            total_pages: pagination.total_pages(total),
            total,
            pagination: PageLinks { next, prev },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            count: self.count,
            current_page: self.current_page,
            total_pages: self.total_pages,
            total: self.total,
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_or_invalid_values() {
        assert_eq!(Pagination::new(None, None), Pagination { page: 1, limit: 10 });
        assert_eq!(Pagination::new(Some(0), Some(-5)), Pagination { page: 1, limit: 10 });
        assert_eq!(Pagination::new(Some(3), Some(500)).limit, MAX_PAGE_LIMIT);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Pagination::new(Some(1), Some(10));
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
    }

    #[test]
    fn links_reflect_position() {
        let middle = Paginated::new(vec![(); 10], Pagination::new(Some(2), Some(10)), 25);
        assert_eq!(middle.pagination.next, Some(PageRef { page: 3, limit: 10 }));
        assert_eq!(middle.pagination.prev, Some(PageRef { page: 1, limit: 10 }));
        assert_eq!(middle.total_pages, 3);

        let last = Paginated::new(vec![(); 5], Pagination::new(Some(3), Some(10)), 25);
        assert!(last.pagination.next.is_none());
        assert_eq!(last.count, 5);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let far = Pagination::new(Some(i64::MAX), Some(10));
        assert_eq!(far.skip(), usize::MAX);

        let page = Paginated::<()>::new(vec![], far, 3);
        assert!(page.pagination.next.is_none());
        assert_eq!(page.pagination.prev.map(|p| p.limit), Some(10));
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn serializes_camel_case() {
        let page = Paginated::new(vec![1, 2], Pagination::default(), 2);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["currentPage"], 1);
        assert_eq!(json["totalPages"], 1);
        assert!(json["pagination"].get("next").is_none());
    }
}
