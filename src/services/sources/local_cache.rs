//! Local cache with remote shard fallback.
//!
//! Reads the on-device interaction log first. Once the log runs dry, walks
//! the remote shards in order, skipping content the user already has locally
//! and never serving more than the requested limit. An
//! entirely empty log also kicks off a background reconciliation, but the
//! fetch does not wait for it.

use crate::models::{
    ContentId, ContentItem, FeedItem, Interaction, PageResult, ShardCursor, SourceId,
};
use crate::services::multiplexer::CompositeSource;
use crate::services::reconcile::Reconciler;
use crate::storage::{InteractionLog, RemoteStore};
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Position of the local cache source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum LocalCacheCursor {
    /// Reading the interaction log after `after_index`, up to `ceiling`.
    Local {
        /// Last feed index served.
        after_index: i64,
        /// Last feed index that existed when the log was first read. Rows
        /// appended later were surfaced by this feed and are not replayed.
        ceiling: i64,
    },
    /// Reading the remote shard that follows `shard`, `offset` items in.
    Remote {
        /// Last shard fully served; `None` before the first one drains.
        shard: Option<ShardCursor>,
        /// Items of the following shard already consumed.
        #[serde(default)]
        offset: usize,
    },
}

impl LocalCacheCursor {
    /// Parses an opaque cursor. Unreadable cursors restart at the log.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        let raw = raw?;
        match serde_json::from_str(raw) {
            Ok(cursor) => Some(cursor),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable local cache cursor");
                None
            },
        }
    }

    fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::operation("encode_local_cursor", e))
    }
}

/// The local cache composite source.
pub struct LocalCacheSource {
    log: Arc<dyn InteractionLog>,
    remote: Arc<dyn RemoteStore>,
    reconciler: Option<Arc<Reconciler>>,
}

impl LocalCacheSource {
    /// Creates the source. Without a reconciler an empty log is never
    /// backfilled.
    #[must_use]
    pub fn new(
        log: Arc<dyn InteractionLog>,
        remote: Arc<dyn RemoteStore>,
        reconciler: Option<Arc<Reconciler>>,
    ) -> Self {
        Self {
            log,
            remote,
            reconciler,
        }
    }

    async fn local_page(
        &self,
        after_index: Option<i64>,
        ceiling: Option<i64>,
        limit: usize,
    ) -> Result<PageResult> {
        let ceiling = match ceiling {
            Some(ceiling) => Some(ceiling),
            None => self.log.last_index()?,
        };
        let rows: Vec<Interaction> = match ceiling {
            Some(ceiling) => self
                .log
                .get_page(after_index, limit)?
                .into_iter()
                .take_while(|row| row.feed_index <= ceiling)
                .collect(),
            None => Vec::new(),
        };

        if let (Some(last), Some(ceiling)) = (rows.last(), ceiling) {
            let cursor = LocalCacheCursor::Local {
                after_index: last.feed_index,
                ceiling,
            };
            let items = rows.iter().map(Interaction::to_feed_item).collect();
            // The remote shards always follow the log.
            return Ok(PageResult::new(items, Some(cursor.encode()?), true));
        }

        if self.log.count()? == 0 {
            if let Some(reconciler) = &self.reconciler {
                tracing::info!("Interaction log empty, reconciling in background");
                reconciler.spawn();
            }
        }
        tracing::debug!("Interaction log exhausted, falling back to remote shards");
        self.remote_page(None, 0, limit).await
    }

    /// Serves up to `limit` unseen items starting `offset` items into the
    /// shard that follows `shard`, crossing into later shards as each one
    /// drains.
    async fn remote_page(
        &self,
        mut shard: Option<ShardCursor>,
        mut offset: usize,
        limit: usize,
    ) -> Result<PageResult> {
        let mut items: Vec<FeedItem> = Vec::with_capacity(limit);
        let mut has_more = true;

        while items.len() < limit {
            let page = self.remote.get_sharded_page(shard.as_ref()).await?;
            let available = page.items.len();
            let remaining: Vec<ContentItem> = page.items.into_iter().skip(offset).collect();
            let known = self.known_ids(&remaining)?;

            for item in remaining {
                if items.len() == limit {
                    break;
                }
                offset += 1;
                if !known.contains(&item.id) {
                    items.push(FeedItem::new(item, SourceId::LocalCache));
                }
            }
            if offset < available {
                break;
            }

            tracing::debug!(
                shard = ?page.next_shard_cursor,
                served = items.len(),
                "Remote shard drained"
            );
            shard = page.next_shard_cursor.or(shard);
            offset = 0;
            if !page.has_more {
                has_more = false;
                break;
            }
        }

        let cursor = LocalCacheCursor::Remote { shard, offset };
        Ok(PageResult::new(items, Some(cursor.encode()?), has_more))
    }

    fn known_ids(&self, items: &[ContentItem]) -> Result<HashSet<ContentId>> {
        if items.is_empty() {
            return Ok(HashSet::new());
        }
        let ids: Vec<ContentId> = items.iter().map(|item| item.id.clone()).collect();
        Ok(self
            .log
            .get_by_ids(&ids)?
            .into_iter()
            .map(|row| row.content_id)
            .collect())
    }
}

#[async_trait]
impl CompositeSource for LocalCacheSource {
    fn id(&self) -> SourceId {
        SourceId::LocalCache
    }

    #[instrument(skip(self, cursor), fields(source = "local_cache"))]
    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<PageResult> {
        match LocalCacheCursor::parse(cursor) {
            None => self.local_page(None, None, limit).await,
            Some(LocalCacheCursor::Local {
                after_index,
                ceiling,
            }) => self.local_page(Some(after_index), Some(ceiling), limit).await,
            Some(LocalCacheCursor::Remote { shard, offset }) => {
                self.remote_page(shard, offset, limit).await
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewInteraction;
    use crate::storage::{MemoryInteractionLog, MemoryRemoteHistory, MemoryRemoteStore};
    use std::time::Duration;

    fn remote(n: usize) -> Arc<MemoryRemoteStore> {
        let store = MemoryRemoteStore::new(50);
        for i in 0..n {
            store.insert(ContentItem::new(format!("r{i:03}"), "x"));
        }
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_reads_log_before_remote() {
        let log = Arc::new(MemoryInteractionLog::new());
        for id in ["a", "b", "c"] {
            log.append(NewInteraction::surfaced(ContentItem::new(id, id)))
                .unwrap();
        }
        let source = LocalCacheSource::new(log, remote(60), None);

        let first = source.fetch(None, 2).await.unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(first.has_more);
        assert_eq!(
            LocalCacheCursor::parse(first.cursor.as_deref()),
            Some(LocalCacheCursor::Local {
                after_index: 2,
                ceiling: 3
            })
        );

        let second = source.fetch(first.cursor.as_deref(), 2).await.unwrap();
        assert_eq!(second.items.len(), 1);

        let third = source.fetch(second.cursor.as_deref(), 2).await.unwrap();
        assert_eq!(third.items.len(), 2);
        assert_eq!(
            LocalCacheCursor::parse(third.cursor.as_deref()),
            Some(LocalCacheCursor::Remote {
                shard: None,
                offset: 2
            })
        );
    }

    #[tokio::test]
    async fn test_rows_appended_after_first_read_are_not_replayed() {
        let log = Arc::new(MemoryInteractionLog::new());
        log.append(NewInteraction::surfaced(ContentItem::new("a", "a")))
            .unwrap();
        let source = LocalCacheSource::new(log.clone(), remote(0), None);

        let first = source.fetch(None, 10).await.unwrap();
        assert_eq!(first.items.len(), 1);

        log.append(NewInteraction::surfaced(ContentItem::new("shown", "x")))
            .unwrap();
        let next = source.fetch(first.cursor.as_deref(), 10).await.unwrap();
        assert!(next.items.is_empty());
        assert!(matches!(
            LocalCacheCursor::parse(next.cursor.as_deref()),
            Some(LocalCacheCursor::Remote { shard: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_remote_shards_served_within_limit() {
        let log = Arc::new(MemoryInteractionLog::new());
        let source = LocalCacheSource::new(log.clone(), remote(60), None);
        let cursor = LocalCacheCursor::Remote {
            shard: None,
            offset: 0,
        }
        .encode()
        .unwrap();

        log.append(NewInteraction::surfaced(ContentItem::new("r001", "x")))
            .unwrap();
        let first = source.fetch(Some(&cursor), 20).await.unwrap();
        assert_eq!(first.items.len(), 20);
        assert_eq!(first.items[1].id().as_str(), "r002");
        assert!(first.has_more);
        assert_eq!(
            LocalCacheCursor::parse(first.cursor.as_deref()),
            Some(LocalCacheCursor::Remote {
                shard: None,
                offset: 21
            })
        );

        let second = source.fetch(first.cursor.as_deref(), 20).await.unwrap();
        assert_eq!(second.items.len(), 20);
        assert_eq!(second.items[0].id().as_str(), "r021");

        // Drains shard 1 and continues into shard 2 within one call.
        let third = source.fetch(second.cursor.as_deref(), 20).await.unwrap();
        assert_eq!(third.items.len(), 19);
        assert_eq!(third.items[9].id().as_str(), "r050");
        assert!(!third.has_more);
        assert_eq!(
            LocalCacheCursor::parse(third.cursor.as_deref()),
            Some(LocalCacheCursor::Remote {
                shard: Some(ShardCursor::new("shard-2")),
                offset: 0
            })
        );

        let seen: HashSet<String> = [first, second, third]
            .iter()
            .flat_map(|page| page.items.iter().map(|i| i.id().as_str().to_string()))
            .collect();
        assert_eq!(seen.len(), 59);
        assert!(!seen.contains("r001"));
    }

    #[tokio::test]
    async fn test_empty_log_triggers_reconciliation() {
        let log = Arc::new(MemoryInteractionLog::new());
        let history = Arc::new(MemoryRemoteHistory::new(
            vec![NewInteraction::surfaced(ContentItem::new("old", "x"))],
            10,
        ));
        let reconciler = Arc::new(Reconciler::new(history, log.clone()));
        let source = LocalCacheSource::new(log.clone(), remote(5), Some(reconciler));

        let page = source.fetch(None, 20).await.unwrap();
        assert_eq!(page.items.len(), 5);

        for _ in 0..50 {
            if log.count().unwrap() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(log.count().unwrap(), 1);
    }
}
