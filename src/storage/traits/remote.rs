//! Remote store traits.

use crate::Result;
use crate::models::{ContentId, ContentItem, ContentQuery, NewInteraction, ShardCursor, ShardPage};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;

/// The cloud-backed paginated content store.
///
/// Transport and authentication live behind implementations; the engine only
/// relies on the paging contract.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Returns the shard following `after`, or the first shard for `None`.
    async fn get_sharded_page(&self, after: Option<&ShardCursor>) -> Result<ShardPage>;

    /// Fetches items by id (missing ids are skipped).
    async fn get_by_ids(&self, ids: &[ContentId]) -> Result<Vec<ContentItem>>;

    /// Runs an ordered keyset query.
    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentItem>>;

    /// Returns the featured item for a calendar day, if one is scheduled.
    async fn featured_for(&self, day: NaiveDate) -> Result<Option<ContentItem>>;
}

#[async_trait]
impl<T: RemoteStore + ?Sized> RemoteStore for Arc<T> {
    async fn get_sharded_page(&self, after: Option<&ShardCursor>) -> Result<ShardPage> {
        (**self).get_sharded_page(after).await
    }

    async fn get_by_ids(&self, ids: &[ContentId]) -> Result<Vec<ContentItem>> {
        (**self).get_by_ids(ids).await
    }

    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentItem>> {
        (**self).query(query).await
    }

    async fn featured_for(&self, day: NaiveDate) -> Result<Option<ContentItem>> {
        (**self).featured_for(day).await
    }
}

/// One page of remotely stored interaction history.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    /// Interactions in remote order.
    pub interactions: Vec<NewInteraction>,
    /// Cursor for the following page.
    pub next_cursor: Option<String>,
    /// Whether more pages follow.
    pub has_more: bool,
}

/// The user's interaction history as stored remotely.
///
/// Only consumed by background reconciliation of an empty local log.
#[async_trait]
pub trait RemoteHistory: Send + Sync {
    /// Returns the page following `cursor`, or the first page for `None`.
    async fn history_page(&self, cursor: Option<&str>) -> Result<HistoryPage>;
}
