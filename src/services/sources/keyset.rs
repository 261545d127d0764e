//! Keyset-paged remote sources without wraparound.

use super::{decode_key, encode_key};
use crate::Result;
use crate::models::{ContentOrder, ContentQuery, FeedItem, PageResult, SourceId};
use crate::services::multiplexer::CompositeSource;
use crate::storage::RemoteStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Pages through the remote store in a fixed order.
///
/// The cursor is the sort key of the last item served. Once a short page is
/// returned the cursor stays parked on the last key with `has_more = false`;
/// later fetches only see content added after it.
pub struct KeysetSource {
    id: SourceId,
    order: ContentOrder,
    remote: Arc<dyn RemoteStore>,
}

impl KeysetSource {
    /// Most popular first.
    #[must_use]
    pub fn popular(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            id: SourceId::Popular,
            order: ContentOrder::PopularityDesc,
            remote,
        }
    }

    /// Oldest first.
    #[must_use]
    pub fn chronological(remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            id: SourceId::Chronological,
            order: ContentOrder::ChronologicalAsc,
            remote,
        }
    }
}

#[async_trait]
impl CompositeSource for KeysetSource {
    fn id(&self) -> SourceId {
        self.id
    }

    #[instrument(skip(self, cursor), fields(source = %self.id))]
    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<PageResult> {
        let after = decode_key(cursor, self.id.as_str());
        let query = ContentQuery::new(self.order, limit).after(after.clone());
        let content = self.remote.query(&query).await?;

        let has_more = content.len() == limit;
        let next = match content.last().map(|item| self.order.sort_key(item)).or(after) {
            Some(key) => Some(encode_key(&key)?),
            None => None,
        };

        let items = content
            .into_iter()
            .map(|item| FeedItem::new(item, self.id))
            .collect();
        Ok(PageResult::new(items, next, has_more))
    }
}
