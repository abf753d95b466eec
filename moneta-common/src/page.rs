use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

impl PageRequest {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    pub fn first(limit: usize) -> Self {
        Self { limit, offset: 0 }
    }
}

/// A page of results plus the size of the whole result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Builds a page from the already-sliced items of a query whose full
    /// result set had `total_count` entries.
    pub fn new(items: Vec<T>, total_count: usize, offset: usize) -> Self {
        let has_more = offset + items.len() < total_count;
        Self {
            items,
            total_count,
            has_more,
        }
    }

    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            has_more: false,
        }
    }
}
