//! Single-source page results.

use super::FeedItem;

/// The result of one fetch from one source.
///
/// `cursor == None` means the source is exhausted for now. `has_more == false`
/// with a cursor is legal and means "pause here, retry the same cursor later";
/// callers must keep such a cursor rather than dropping it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    /// Items in source order.
    pub items: Vec<FeedItem>,
    /// Opaque resumption token for the source.
    pub cursor: Option<String>,
    /// Whether the source expects to yield more after `cursor`.
    pub has_more: bool,
}

impl PageResult {
    /// Creates a page result.
    #[must_use]
    pub const fn new(items: Vec<FeedItem>, cursor: Option<String>, has_more: bool) -> Self {
        Self {
            items,
            cursor,
            has_more,
        }
    }

    /// An empty, finished page that keeps the given cursor.
    #[must_use]
    pub const fn paused(cursor: Option<String>) -> Self {
        Self {
            items: Vec::new(),
            cursor,
            has_more: false,
        }
    }

    /// Returns true if the page carries no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Tolerates a source that claims more data without giving a cursor.
    ///
    /// There is no way to ask for "more" without a cursor, so the claim is
    /// downgraded to `has_more = false`.
    #[must_use]
    pub fn normalized(mut self, source: &str) -> Self {
        if self.has_more && self.cursor.is_none() {
            tracing::warn!(
                source,
                "Source reported has_more without a cursor, treating as finished"
            );
            self.has_more = false;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_downgrades_missing_cursor() {
        let page = PageResult::new(Vec::new(), None, true).normalized("popular");
        assert!(!page.has_more);
        assert!(page.cursor.is_none());
    }

    #[test]
    fn test_normalized_keeps_paused_cursor() {
        let page = PageResult::paused(Some("c1".to_string())).normalized("popular");
        assert!(!page.has_more);
        assert_eq!(page.cursor.as_deref(), Some("c1"));
    }

    #[test]
    fn test_normalized_leaves_consistent_page() {
        let page = PageResult::new(Vec::new(), Some("c2".to_string()), true).normalized("random");
        assert!(page.has_more);
    }
}
