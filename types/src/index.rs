//! Secondary index entries and list pagination.

use crate::{Did, Fingerprint, Timestamp};
use serde::{Deserialize, Serialize};

/// Default page size when no limit is given.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: usize = 1000;

/// One indexed review record. Rebuildable from the record set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub multihash: Fingerprint,
    pub author: Did,
    pub subject: Did,
    pub previous_version: Option<Fingerprint>,
    pub verifiable: bool,
    pub inserted_at: Timestamp,
}

/// Offset/limit window over an ordered listing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Page {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit: Some(limit),
        }
    }

    /// Effective page size, clamped to `[1, MAX_PAGE_SIZE]`.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    /// Cut this page out of a full listing.
    pub fn apply<T>(&self, items: Vec<T>) -> ListResult<T> {
        let count = items.len();
        let rows = items
            .into_iter()
            .skip(self.offset)
            .take(self.effective_limit())
            .collect();
        ListResult { rows, count }
    }
}

/// A page of rows plus the total number of rows before paging.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResult<T> {
    pub rows: Vec<T>,
    pub count: usize,
}
