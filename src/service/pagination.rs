use serde::{Deserialize, Serialize};

/// Page number meaning "there is no such page".
pub const NO_PAGE: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRef {
    pub page: i64,
}

/// One page of results with navigation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination<T> {
    pub total: i64,
    pub is_load_more: bool,
    pub data: Vec<T>,
    pub next: PageRef,
    pub prev: PageRef,
}

/// Row offset of a 1-based page.
pub fn offset(page: i64, limit: i64) -> i64 {
    page.saturating_sub(1).max(0).saturating_mul(limit)
}

/// Wraps a page of rows. `page` is 1-based and validated by the caller.
pub fn to_pagination<T>(data: Vec<T>, page: i64, limit: i64, total: i64) -> Pagination<T> {
    let start = offset(page, limit);
    let end = page.saturating_mul(limit);
    let is_load_more = end < total;

    Pagination {
        total,
        is_load_more,
        data,
        next: PageRef {
            page: if is_load_more { page + 1 } else { NO_PAGE },
        },
        prev: PageRef {
            page: if start > 0 { page - 1 } else { NO_PAGE },
        },
    }
}
