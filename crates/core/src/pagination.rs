//! Offset/limit pagination and the paginated result envelope.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

pub const DEFAULT_LIMIT: u32 = 10;
pub const MAX_LIMIT: u32 = 100;

/// Requested page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    /// Build a window; `limit` must be within `1..=MAX_LIMIT`.
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> DomainResult<Self> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if limit == 0 || limit > MAX_LIMIT {
            return Err(DomainError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(Self {
            limit,
            offset: offset.unwrap_or(0),
        })
    }

    pub fn meta(&self, total_records: u64) -> PaginationMeta {
        PaginationMeta::new(total_records, self.limit, self.offset)
    }

    /// Cut one page out of an already filtered, ordered sequence.
    pub fn apply<T>(&self, items: Vec<T>) -> Paginated<T> {
        let total = items.len() as u64;
        let records = items
            .into_iter()
            .skip(self.offset as usize)
            .take(self.limit as usize)
            .collect();
        Paginated {
            records,
            pagination: self.meta(total),
        }
    }
}

/// Page metadata returned with every list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationMeta {
    pub total_records: u64,
    pub limit: u32,
    pub offset: u32,
    /// 1-based.
    pub current_page: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    pub fn new(total_records: u64, limit: u32, offset: u32) -> Self {
        let limit_u64 = u64::from(limit.max(1));
        Self {
            total_records,
            limit,
            offset,
            current_page: u64::from(offset) / limit_u64 + 1,
            total_pages: total_records.div_ceil(limit_u64),
        }
    }
}

/// `{records, pagination}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub records: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> Paginated<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            records: self.records.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

/// Case-insensitive substring match used by list filters.
///
/// `None` matches everything; a filter on a missing value never matches.
pub fn contains_ci(haystack: Option<&str>, needle: Option<&str>) -> bool {
    match (needle, haystack) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(n), Some(h)) => h.to_lowercase().contains(&n.to_lowercase()),
    }
}
