//! Local interaction records.

use super::{ContentId, ContentItem, FeedItem, SourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of user interaction tracked on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    /// The item was displayed.
    Viewed,
    /// The item was saved.
    Saved,
    /// The item was shared.
    Shared,
}

impl InteractionKind {
    /// Returns the column-style name of the interaction.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Viewed => "viewed",
            Self::Saved => "saved",
            Self::Shared => "shared",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the on-device interaction log.
///
/// `feed_index` is assigned once on append and never rewritten; only the
/// interaction timestamps change afterwards. The display fields are a copy
/// taken when the row was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Content identifier (unique within the log).
    pub content_id: ContentId,
    /// Position in the feed, strictly increasing in append order.
    pub feed_index: i64,
    /// Cached content at creation time.
    pub content: ContentItem,
    /// When the item was viewed.
    pub viewed_at: Option<DateTime<Utc>>,
    /// When the item was saved.
    pub saved_at: Option<DateTime<Utc>>,
    /// When the item was shared.
    pub shared_at: Option<DateTime<Utc>>,
}

impl Interaction {
    /// Rebuilds a feed item from the cached display fields.
    #[must_use]
    pub fn to_feed_item(&self) -> FeedItem {
        FeedItem::new(self.content.clone(), SourceId::LocalCache)
    }

    /// Returns the timestamp for the given interaction kind.
    #[must_use]
    pub const fn timestamp(&self, kind: InteractionKind) -> Option<DateTime<Utc>> {
        match kind {
            InteractionKind::Viewed => self.viewed_at,
            InteractionKind::Saved => self.saved_at,
            InteractionKind::Shared => self.shared_at,
        }
    }
}

/// A row to append to the interaction log; the log assigns `feed_index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewInteraction {
    /// Content to cache.
    pub content: ContentItem,
    /// When the item was viewed, if already known.
    pub viewed_at: Option<DateTime<Utc>>,
    /// When the item was saved, if already known.
    pub saved_at: Option<DateTime<Utc>>,
    /// When the item was shared, if already known.
    pub shared_at: Option<DateTime<Utc>>,
}

impl NewInteraction {
    /// A row for an item that has been surfaced but not yet interacted with.
    #[must_use]
    pub const fn surfaced(content: ContentItem) -> Self {
        Self {
            content,
            viewed_at: None,
            saved_at: None,
            shared_at: None,
        }
    }

    /// Sets the viewed timestamp.
    #[must_use]
    pub const fn viewed_at(mut self, at: DateTime<Utc>) -> Self {
        self.viewed_at = Some(at);
        self
    }
}
