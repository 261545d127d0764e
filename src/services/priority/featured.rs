//! Featured-of-the-day source.
//!
//! Supplies at most one item per calendar day (UTC). The cursor is the day
//! the item was served, so a second fetch on the same day comes back empty
//! and the evaluator marks the source done for that day.

use super::PrioritySource;
use crate::Result;
use crate::models::{FeedItem, PageResult, SourceId};
use crate::storage::{FeaturedState, RemoteStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// The featured item of the day.
pub struct FeaturedSource {
    remote: Arc<dyn RemoteStore>,
    state: Arc<dyn FeaturedState>,
}

impl FeaturedSource {
    /// Creates the source.
    #[must_use]
    pub fn new(remote: Arc<dyn RemoteStore>, state: Arc<dyn FeaturedState>) -> Self {
        Self { remote, state }
    }
}

#[async_trait]
impl PrioritySource for FeaturedSource {
    fn id(&self) -> SourceId {
        SourceId::Featured
    }

    fn epoch(&self, now: DateTime<Utc>) -> String {
        now.date_naive().to_string()
    }

    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.state.last_shown_on() != Some(now.date_naive())
    }

    async fn fetch(
        &self,
        cursor: Option<&str>,
        _limit: usize,
        now: DateTime<Utc>,
    ) -> Result<PageResult> {
        let today = now.date_naive().to_string();
        if cursor == Some(today.as_str()) {
            return Ok(PageResult::paused(Some(today)));
        }

        let items = self
            .remote
            .featured_for(now.date_naive())
            .await?
            .map(|item| FeedItem::new(item, SourceId::Featured))
            .into_iter()
            .collect();
        Ok(PageResult::new(items, Some(today), false))
    }

    fn on_surfaced(&self, now: DateTime<Utc>) {
        self.state.mark_shown(now.date_naive());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentItem;
    use crate::storage::{MemoryFeaturedState, MemoryRemoteStore};
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_one_item_per_day() {
        let now = Utc.with_ymd_and_hms(2024, 10, 31, 9, 0, 0).unwrap();
        let remote = Arc::new(MemoryRemoteStore::new(50));
        remote.insert(ContentItem::new("jotd", "knock knock"));
        remote.set_featured(now.date_naive(), "jotd");
        let state = Arc::new(MemoryFeaturedState::new());
        let source = FeaturedSource::new(remote, state.clone());

        assert!(source.is_active(now));
        let page = source.fetch(None, 20, now).await.unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].data_source, SourceId::Featured);
        assert!(!page.has_more);

        let again = source.fetch(page.cursor.as_deref(), 20, now).await.unwrap();
        assert!(again.items.is_empty());

        source.on_surfaced(now);
        assert!(!source.is_active(now));
        assert!(source.is_active(now + chrono::Duration::days(1)));
        assert_eq!(state.last_shown_on(), Some(now.date_naive()));
    }

    #[tokio::test]
    async fn test_no_featured_item_scheduled() {
        let now = Utc.with_ymd_and_hms(2024, 10, 31, 9, 0, 0).unwrap();
        let source = FeaturedSource::new(
            Arc::new(MemoryRemoteStore::new(50)),
            Arc::new(MemoryFeaturedState::new()),
        );
        let page = source.fetch(None, 20, now).await.unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);
    }
}
