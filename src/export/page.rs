//! Paging parameters and the `Page`/`Pager` response shape.

use serde::Serialize;

use crate::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::error::TrackerError;

/// 1-based page window requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    page: u32,
    page_size: u32,
    page_total: bool,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            page_total: false,
        }
    }
}

impl PageParams {
    pub fn new(page: u32, page_size: u32, page_total: bool) -> Result<Self, TrackerError> {
        Self::bounded(page, page_size, page_total, MAX_PAGE_SIZE)
    }

    /// Same as [`PageParams::new`] with a caller-provided page size ceiling.
    pub fn bounded(
        page: u32,
        page_size: u32,
        page_total: bool,
        max_page_size: u32,
    ) -> Result<Self, TrackerError> {
        if page < 1 {
            return Err(TrackerError::bad_request(
                "page must be greater than or equal to 1",
            ));
        }
        if page_size < 1 || page_size > max_page_size {
            return Err(TrackerError::bad_request(format!(
                "pageSize must be between 1 and {max_page_size}"
            )));
        }
        Ok(Self {
            page,
            page_size,
            page_total,
        })
    }

    /// First page holding a single item, used for lookups by UID.
    pub fn single() -> Self {
        Self {
            page: 1,
            page_size: 1,
            page_total: false,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn page_total(&self) -> bool {
        self.page_total
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

/// Pager metadata. Carries `total`/`pageCount` when the total was requested,
/// `isLastPage` otherwise; never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pager {
    page: u32,
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    is_last_page: Option<bool>,
}

impl Pager {
    pub fn with_total(params: &PageParams, total: u64) -> Self {
        let size = u64::from(params.page_size);
        Self {
            page: params.page,
            page_size: params.page_size,
            total: Some(total),
            page_count: Some(total.div_ceil(size)),
            is_last_page: None,
        }
    }

    pub fn with_last_page(params: &PageParams, is_last_page: bool) -> Self {
        Self {
            page: params.page,
            page_size: params.page_size,
            total: None,
            page_count: None,
            is_last_page: Some(is_last_page),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn page_count(&self) -> Option<u64> {
        self.page_count
    }

    pub fn is_last_page(&self) -> Option<bool> {
        self.is_last_page
    }

    /// Whether this pager was produced for a `totalPages=true` request.
    pub fn is_page_total(&self) -> bool {
        self.total.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pager: Pager,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pager: Pager) -> Self {
        Self { items, pager }
    }

    /// Replace the items, keeping the store's pager untouched.
    pub fn with_items<U>(self, items: Vec<U>) -> Page<U> {
        Page {
            items,
            pager: self.pager,
        }
    }
}
