//! Randomized-with-wraparound source.

use super::{decode_key, encode_key};
use crate::Result;
use crate::models::{ContentOrder, ContentQuery, FeedItem, PageResult, SourceId};
use crate::services::multiplexer::CompositeSource;
use crate::storage::RemoteStore;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::instrument;

/// Remote content in a stable pseudo-random order keyed by an installation
/// seed.
///
/// A short page reports `has_more = false` with the cursor parked at the
/// largest key served. The next fetch finds nothing after that key and
/// restarts from the origin of the key space, so the source never ends.
pub struct RandomizedSource {
    order: ContentOrder,
    remote: Arc<dyn RemoteStore>,
}

impl RandomizedSource {
    /// Creates the source for an installation seed.
    #[must_use]
    pub fn new(seed: u64, remote: Arc<dyn RemoteStore>) -> Self {
        Self {
            order: ContentOrder::Random { seed },
            remote,
        }
    }
}

#[async_trait]
impl CompositeSource for RandomizedSource {
    fn id(&self) -> SourceId {
        SourceId::Randomized
    }

    fn wraps_around(&self) -> bool {
        true
    }

    #[instrument(skip(self, cursor), fields(source = "randomized"))]
    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<PageResult> {
        let after = decode_key(cursor, "randomized");
        let mut content = self
            .remote
            .query(&ContentQuery::new(self.order, limit).after(after.clone()))
            .await?;

        if content.is_empty() && after.is_some() && limit > 0 {
            tracing::debug!("Randomized source wrapped around");
            metrics::counter!("feed_source_wraparounds_total", "source" => "randomized")
                .increment(1);
            content = self
                .remote
                .query(&ContentQuery::new(self.order, limit))
                .await?;
        }

        let has_more = limit > 0 && content.len() == limit;
        let next = match content.last().map(|item| self.order.sort_key(item)).or(after) {
            Some(key) => Some(encode_key(&key)?),
            None => None,
        };

        let items = content
            .into_iter()
            .map(|item| FeedItem::new(item, SourceId::Randomized))
            .collect();
        Ok(PageResult::new(items, next, has_more))
    }
}
