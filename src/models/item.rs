//! Content items and their feed-tagged form.

use super::SourceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a piece of content.
///
/// Deduplication and log lookups key on this alone; the producing source
/// never takes part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    /// Creates a new content ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ContentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A content record as served by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    /// Unique identifier.
    pub id: ContentId,
    /// The text body.
    pub body: String,
    /// Full-size media URL. Required for display.
    pub image_url: Option<String>,
    /// Thumbnail media URL. Required for display.
    pub thumbnail_url: Option<String>,
    /// Scheduled publish time. `None` means published immediately.
    pub published_at: Option<DateTime<Utc>>,
    /// Creation time in the remote store.
    pub created_at: DateTime<Utc>,
    /// Popularity score used by the popularity ranking.
    pub popularity: i64,
    /// Free-form tags (seasonal campaigns select on these).
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ContentItem {
    /// Creates an item with the given id and body, created now, with no media.
    #[must_use]
    pub fn new(id: impl Into<ContentId>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            body: body.into(),
            image_url: None,
            thumbnail_url: None,
            published_at: None,
            created_at: Utc::now(),
            popularity: 0,
            tags: Vec::new(),
        }
    }

    /// Sets both media fields.
    #[must_use]
    pub fn with_media(mut self, image_url: impl Into<String>, thumbnail_url: impl Into<String>) -> Self {
        self.image_url = Some(image_url.into());
        self.thumbnail_url = Some(thumbnail_url.into());
        self
    }

    /// Sets the scheduled publish time.
    #[must_use]
    pub const fn with_published_at(mut self, published_at: DateTime<Utc>) -> Self {
        self.published_at = Some(published_at);
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Sets the popularity score.
    #[must_use]
    pub const fn with_popularity(mut self, popularity: i64) -> Self {
        self.popularity = popularity;
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Returns true if the item carries the tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// The instant the item became (or becomes) visible.
    #[must_use]
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.created_at)
    }
}

/// A content record tagged with the source that produced it.
///
/// Equality is structural and includes `data_source`. Deduplication and
/// every other identity check goes through [`FeedItem::id`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    /// The content.
    pub content: ContentItem,
    /// The source that produced this item.
    pub data_source: SourceId,
}

impl FeedItem {
    /// Tags a content item with its source.
    #[must_use]
    pub const fn new(content: ContentItem, data_source: SourceId) -> Self {
        Self {
            content,
            data_source,
        }
    }

    /// Returns the content id.
    #[must_use]
    pub const fn id(&self) -> &ContentId {
        &self.content.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_feed_item_equality_includes_source() {
        let content = ContentItem::new("joke-1", "body");
        let popular = FeedItem::new(content.clone(), SourceId::Popular);
        let random = FeedItem::new(content, SourceId::Randomized);

        assert_ne!(popular, random);
        assert_eq!(popular.id(), random.id());
    }

    #[test]
    fn test_content_id_conversions() {
        let a = ContentId::from("joke-1");
        let b = ContentId::from("joke-1".to_string());
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "joke-1");
        assert_eq!(a.to_string(), "joke-1");
    }

    #[test]
    fn test_effective_time_prefers_published_at() {
        let created = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let published = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let item = ContentItem::new("a", "body").with_created_at(created);
        assert_eq!(item.effective_time(), created);

        let item = item.with_published_at(published);
        assert_eq!(item.effective_time(), published);
    }

    #[test]
    fn test_feed_item_identity_ignores_source() {
        let content = ContentItem::new("a", "body");
        let from_popular = FeedItem::new(content.clone(), SourceId::Popular);
        let from_random = FeedItem::new(content, SourceId::Randomized);
        assert_eq!(from_popular.id(), from_random.id());
    }

    #[test]
    fn test_has_tag() {
        let item = ContentItem::new("a", "body").with_tag("halloween");
        assert!(item.has_tag("halloween"));
        assert!(!item.has_tag("christmas"));
    }
}
