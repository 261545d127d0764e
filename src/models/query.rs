//! Ordered remote queries and sharded pages.

use super::{ContentId, ContentItem};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;

/// Position of an item within an ordering: primary value plus id tie-break.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortKey {
    /// Primary ordering value.
    pub primary: i64,
    /// Tie-break on content id (always ascending).
    pub id: ContentId,
}

impl SortKey {
    /// Creates a sort key.
    #[must_use]
    pub fn new(primary: i64, id: impl Into<ContentId>) -> Self {
        Self {
            primary,
            id: id.into(),
        }
    }
}

/// Orderings the remote store can page through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "order", rename_all = "snake_case")]
pub enum ContentOrder {
    /// Most popular first.
    PopularityDesc,
    /// Oldest publish time first.
    ChronologicalAsc,
    /// Stable pseudo-random order keyed by an installation seed.
    Random {
        /// Installation seed.
        seed: u64,
    },
}

impl ContentOrder {
    /// Computes the sort key of an item under this ordering.
    #[must_use]
    pub fn sort_key(&self, item: &ContentItem) -> SortKey {
        let primary = match self {
            Self::PopularityDesc => item.popularity,
            Self::ChronologicalAsc => item.effective_time().timestamp_millis(),
            Self::Random { seed } => random_sort_key(*seed, &item.id),
        };
        SortKey::new(primary, item.id.clone())
    }

    /// Compares two keys in page order (smaller comes first).
    #[must_use]
    pub fn compare(&self, a: &SortKey, b: &SortKey) -> Ordering {
        let primary = match self {
            Self::PopularityDesc => b.primary.cmp(&a.primary),
            Self::ChronologicalAsc | Self::Random { .. } => a.primary.cmp(&b.primary),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// Returns true if `key` comes strictly after `start` in page order.
    #[must_use]
    pub fn is_after(&self, key: &SortKey, start: &SortKey) -> bool {
        self.compare(key, start) == Ordering::Greater
    }
}

/// Derives a stable non-negative ordering key for `id` under `seed`.
#[must_use]
pub fn random_sort_key(seed: u64, id: &ContentId) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_le_bytes());
    hasher.update(id.as_str().as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    // Top bit cleared so the key always fits a non-negative i64.
    i64::from_le_bytes(bytes) & i64::MAX
}

/// A keyset query against the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentQuery {
    /// Ordering to page through.
    pub order: ContentOrder,
    /// Only return items strictly after this key. `None` starts at the origin.
    pub start_after: Option<SortKey>,
    /// Maximum items to return.
    pub limit: usize,
    /// Restrict to items carrying this tag.
    pub tag: Option<String>,
}

impl ContentQuery {
    /// Creates a query from the origin of `order`.
    #[must_use]
    pub const fn new(order: ContentOrder, limit: usize) -> Self {
        Self {
            order,
            start_after: None,
            limit,
            tag: None,
        }
    }

    /// Continues after the given key.
    #[must_use]
    pub fn after(mut self, key: Option<SortKey>) -> Self {
        self.start_after = key;
        self
    }

    /// Restricts to a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

/// Opaque identifier of a remote shard.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardCursor(String);

impl ShardCursor {
    /// Creates a shard cursor.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the cursor as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShardCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One fixed-size shard of the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardPage {
    /// Items of the shard in store order.
    pub items: Vec<ContentItem>,
    /// Cursor naming this shard; passing it back yields the following shard.
    pub next_shard_cursor: Option<ShardCursor>,
    /// Whether shards follow this one.
    pub has_more: bool,
}
