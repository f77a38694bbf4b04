//! Batch pages handed out by [`QueryBuilder::batch`](crate::query::QueryBuilder::batch).

/// One page of a batched traversal.
///
/// # Type Parameters
///
/// * `T` - The type of items contained in this page
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    /// The records on this page, in query order.
    pub items: Vec<T>,
    /// Number of matching records skipped before this page.
    pub skip: i64,
    /// Total number of matching records when the traversal started.
    pub total: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, skip: i64, total: u64) -> Self {
        Self { items, skip, total }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True if no records remain after this page.
    pub fn is_last(&self) -> bool {
        (self.skip.max(0) as u64).saturating_add(self.items.len() as u64) >= self.total
    }
}

impl<T> IntoIterator for Page<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}
