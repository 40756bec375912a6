use serde::{Deserialize, Serialize};

/// One `(limit, offset)` window of a server-paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub limit: usize,
    pub offset: usize,
}

impl PageRequest {
    pub fn new(limit: usize, offset: usize) -> Self {
        Self { limit, offset }
    }

    /// The window immediately after this one.
    pub fn next(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + self.limit,
        }
    }

    /// A page shorter than the limit is the last one.
    pub fn is_last(&self, returned: usize) -> bool {
        returned < self.limit
    }

    /// Slice `items` the way a server would for this window.
    pub fn window<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = self.offset.min(items.len());
        let end = self.offset.saturating_add(self.limit).min(items.len());
        &items[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_advances_by_limit() {
        let page = PageRequest::new(100, 0).next().next();
        assert_eq!(page, PageRequest::new(100, 200));
    }

    #[test]
    fn test_window_clamps_to_bounds() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(PageRequest::new(4, 8).window(&items), &[8, 9]);
        assert!(PageRequest::new(4, 12).window(&items).is_empty());
    }
}
