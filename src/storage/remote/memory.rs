//! In-memory remote store.
//!
//! Stands in for the cloud store in tests and local tooling. Content is
//! sharded in insertion order; keyset queries order by the requested
//! [`ContentOrder`].

use crate::models::{
    ContentId, ContentItem, ContentQuery, NewInteraction, ShardCursor, ShardPage,
};
use crate::storage::sqlite::acquire_lock;
use crate::storage::traits::{HistoryPage, RemoteHistory, RemoteStore};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default number of items per remote shard.
pub const DEFAULT_SHARD_SIZE: usize = 50;

const SHARD_PREFIX: &str = "shard-";

#[derive(Default)]
struct Inner {
    items: Vec<ContentItem>,
    featured: HashMap<NaiveDate, ContentId>,
    failures_remaining: usize,
}

/// Remote store held in memory.
pub struct MemoryRemoteStore {
    inner: Mutex<Inner>,
    shard_size: usize,
    calls: AtomicUsize,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new(DEFAULT_SHARD_SIZE)
    }
}

impl MemoryRemoteStore {
    /// Creates an empty store with the given shard size (minimum 1).
    #[must_use]
    pub fn new(shard_size: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            shard_size: shard_size.max(1),
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a store pre-filled with `items`.
    #[must_use]
    pub fn with_items(shard_size: usize, items: Vec<ContentItem>) -> Self {
        let store = Self::new(shard_size);
        acquire_lock(&store.inner).items = items;
        store
    }

    /// Appends an item.
    pub fn insert(&self, item: ContentItem) {
        acquire_lock(&self.inner).items.push(item);
    }

    /// Schedules `id` as the featured item of `day`.
    pub fn set_featured(&self, day: NaiveDate, id: impl Into<ContentId>) {
        acquire_lock(&self.inner).featured.insert(day, id.into());
    }

    /// Makes the next `count` calls fail with [`Error::OperationFailed`].
    pub fn fail_next(&self, count: usize) {
        acquire_lock(&self.inner).failures_remaining = count;
    }

    /// Number of calls served (including failed ones).
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the shard size.
    #[must_use]
    pub const fn shard_size(&self) -> usize {
        self.shard_size
    }

    fn begin_call(&self, operation: &str) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut inner = acquire_lock(&self.inner);
        if inner.failures_remaining > 0 {
            inner.failures_remaining -= 1;
            return Err(Error::OperationFailed {
                operation: operation.to_string(),
                cause: "injected remote failure".to_string(),
            });
        }
        Ok(inner)
    }
}

fn shard_number(cursor: &ShardCursor) -> Result<usize> {
    cursor
        .as_str()
        .strip_prefix(SHARD_PREFIX)
        .and_then(|n| n.parse::<usize>().ok())
        .ok_or_else(|| Error::InvalidInput(format!("unknown shard cursor '{cursor}'")))
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get_sharded_page(&self, after: Option<&ShardCursor>) -> Result<ShardPage> {
        let inner = self.begin_call("get_sharded_page")?;
        let shard = match after {
            Some(cursor) => shard_number(cursor)? + 1,
            None => 1,
        };

        let start = (shard - 1).saturating_mul(self.shard_size);
        let end = start.saturating_add(self.shard_size).min(inner.items.len());
        if start >= inner.items.len() {
            return Ok(ShardPage {
                items: Vec::new(),
                next_shard_cursor: after.cloned(),
                has_more: false,
            });
        }

        Ok(ShardPage {
            items: inner.items[start..end].to_vec(),
            next_shard_cursor: Some(ShardCursor::new(format!("{SHARD_PREFIX}{shard}"))),
            has_more: end < inner.items.len(),
        })
    }

    async fn get_by_ids(&self, ids: &[ContentId]) -> Result<Vec<ContentItem>> {
        let inner = self.begin_call("get_by_ids")?;
        Ok(ids
            .iter()
            .filter_map(|id| inner.items.iter().find(|item| &item.id == id))
            .cloned()
            .collect())
    }

    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentItem>> {
        let inner = self.begin_call("query")?;
        let order = query.order;

        let mut matching: Vec<(crate::models::SortKey, &ContentItem)> = inner
            .items
            .iter()
            .filter(|item| query.tag.as_deref().is_none_or(|tag| item.has_tag(tag)))
            .map(|item| (order.sort_key(item), item))
            .filter(|(key, _)| {
                query
                    .start_after
                    .as_ref()
                    .is_none_or(|start| order.is_after(key, start))
            })
            .collect();
        matching.sort_by(|(a, _), (b, _)| order.compare(a, b));

        Ok(matching
            .into_iter()
            .take(query.limit)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn featured_for(&self, day: NaiveDate) -> Result<Option<ContentItem>> {
        let inner = self.begin_call("featured_for")?;
        Ok(inner
            .featured
            .get(&day)
            .and_then(|id| inner.items.iter().find(|item| &item.id == id))
            .cloned())
    }
}

/// Remote interaction history held in memory, paged `page_size` at a time.
pub struct MemoryRemoteHistory {
    interactions: Vec<NewInteraction>,
    page_size: usize,
}

impl MemoryRemoteHistory {
    /// Creates a history.
    #[must_use]
    pub fn new(interactions: Vec<NewInteraction>, page_size: usize) -> Self {
        Self {
            interactions,
            page_size: page_size.max(1),
        }
    }
}

#[async_trait]
impl RemoteHistory for MemoryRemoteHistory {
    async fn history_page(&self, cursor: Option<&str>) -> Result<HistoryPage> {
        let start = match cursor {
            Some(c) => c
                .parse::<usize>()
                .map_err(|e| Error::InvalidInput(format!("bad history cursor '{c}': {e}")))?,
            None => 0,
        };
        let end = start.saturating_add(self.page_size).min(self.interactions.len());
        let interactions = self
            .interactions
            .get(start..end)
            .map(<[NewInteraction]>::to_vec)
            .unwrap_or_default();

        Ok(HistoryPage {
            interactions,
            next_cursor: Some(end.to_string()),
            has_more: end < self.interactions.len(),
        })
    }
}
