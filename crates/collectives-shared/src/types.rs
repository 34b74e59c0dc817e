//! Common types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

pub type EntityId = Uuid;

/// Time-ordered identifier, so that ids double as a creation-order tie-breaker.
pub fn new_id() -> EntityId {
    Uuid::now_v7()
}

/// One-indexed page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, size: DEFAULT_PAGE_SIZE }
    }
}

impl Pagination {
    /// Builds a page request, clamping `size` to `[1, MAX_PAGE_SIZE]` and `page` to `>= 1`.
    pub fn new(page: u32, size: u32) -> Self {
        Self {
            page: page.max(1),
            size: size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.size)
    }

    pub fn last_page(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.size)).max(1)
    }
}

/// Listing response body: `{data, last_page, total}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub last_page: u64,
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, pagination: Pagination, total: u64) -> Self {
        Self {
            data,
            last_page: pagination.last_page(total),
            total,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            last_page: self.last_page,
            total: self.total,
        }
    }
}
