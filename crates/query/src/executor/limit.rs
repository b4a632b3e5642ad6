//! LIMIT: selects a window of rows.

use alloc::vec::Vec;
use core::fmt;

/// A row window: `offset` rows skipped, then at most `count` kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limit {
    offset: usize,
    count: Option<usize>,
}

impl Limit {
    /// Keeps at most `count` rows from `offset` (0-based).
    pub fn new(offset: usize, count: usize) -> Self {
        Self {
            offset,
            count: Some(count),
        }
    }

    /// Keeps the first `count` rows.
    pub fn first(count: usize) -> Self {
        Self::new(0, count)
    }

    /// Skips `offset` rows and keeps the rest.
    pub fn skip(offset: usize) -> Self {
        Self { offset, count: None }
    }

    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[inline]
    pub fn count(&self) -> Option<usize> {
        self.count
    }

    /// Applies the window in place.
    pub fn apply<T>(&self, items: &mut Vec<T>) {
        let len = items.len();
        let start = self.offset.min(len);
        let end = match self.count {
            Some(count) => self.offset.saturating_add(count).min(len),
            None => len,
        };
        // Truncate tail first, then remove the head
        items.truncate(end);
        if start > 0 {
            items.drain(..start);
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.count {
            Some(count) if self.offset > 0 => write!(f, "LIMIT {}, {}", self.offset, count),
            Some(count) => write!(f, "LIMIT {}", count),
            None => write!(f, "LIMIT {}, ALL", self.offset),
        }
    }
}
