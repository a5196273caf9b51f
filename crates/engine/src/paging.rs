//! Offset pagination for list queries.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 200;

/// Requested page, 1-based.
///
/// Out of range values are normalized instead of rejected: page `0` becomes
/// `1`, page size `0` becomes [`DEFAULT_PAGE_SIZE`] and anything above
/// [`MAX_PAGE_SIZE`] is capped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    page: u64,
    page_size: u64,
}

impl PageRequest {
    #[must_use]
    pub fn new(page: u64, page_size: u64) -> Self {
        let page = page.max(1);
        let page_size = match page_size {
            0 => DEFAULT_PAGE_SIZE,
            size => size.min(MAX_PAGE_SIZE),
        };
        Self { page, page_size }
    }

    pub fn page(&self) -> u64 {
        self.page
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub(crate) fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// One page of results plus the total number of matches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_out_of_range_values() {
        let req = PageRequest::new(0, 0);
        assert_eq!(req.page(), 1);
        assert_eq!(req.page_size(), DEFAULT_PAGE_SIZE);

        let req = PageRequest::new(3, 10_000);
        assert_eq!(req.page_size(), MAX_PAGE_SIZE);
        assert_eq!(req.offset(), 2 * MAX_PAGE_SIZE);
    }

    #[test]
    fn first_page_starts_at_zero() {
        assert_eq!(PageRequest::new(1, 5).offset(), 0);
        assert_eq!(PageRequest::new(2, 5).offset(), 5);
    }
}
