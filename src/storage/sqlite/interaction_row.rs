//! Row conversion for the `interactions` table.

use crate::models::{ContentId, ContentItem, Interaction};
use chrono::{DateTime, TimeZone, Utc};

/// Column list shared by every `SELECT` on the `interactions` table, in
/// [`InteractionRow::from_row`] order.
pub const INTERACTION_COLUMNS: &str = "feed_index, content_id, body, image_url, thumbnail_url, \
     published_at, created_at, popularity, tags, viewed_at, saved_at, shared_at";

/// Raw `interactions` row with primitive column types.
///
/// Timestamps are stored as Unix milliseconds; tags as a JSON array.
#[derive(Debug)]
pub struct InteractionRow {
    /// Feed position.
    pub feed_index: i64,
    /// Content identifier.
    pub content_id: String,
    /// Cached body text.
    pub body: String,
    /// Cached image URL.
    pub image_url: Option<String>,
    /// Cached thumbnail URL.
    pub thumbnail_url: Option<String>,
    /// Scheduled publish time (ms).
    pub published_at: Option<i64>,
    /// Remote creation time (ms).
    pub created_at: i64,
    /// Cached popularity score.
    pub popularity: i64,
    /// Tags as a JSON array.
    pub tags: Option<String>,
    /// View time (ms).
    pub viewed_at: Option<i64>,
    /// Save time (ms).
    pub saved_at: Option<i64>,
    /// Share time (ms).
    pub shared_at: Option<i64>,
}

impl InteractionRow {
    /// Reads a row selected with [`INTERACTION_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            feed_index: row.get(0)?,
            content_id: row.get(1)?,
            body: row.get(2)?,
            image_url: row.get(3)?,
            thumbnail_url: row.get(4)?,
            published_at: row.get(5)?,
            created_at: row.get(6)?,
            popularity: row.get(7)?,
            tags: row.get(8)?,
            viewed_at: row.get(9)?,
            saved_at: row.get(10)?,
            shared_at: row.get(11)?,
        })
    }

    /// Converts the raw row into an [`Interaction`].
    pub fn into_interaction(self) -> Interaction {
        let tags = self
            .tags
            .filter(|t| !t.is_empty())
            .map(|t| {
                serde_json::from_str::<Vec<String>>(&t).unwrap_or_else(|e| {
                    tracing::warn!(id = %self.content_id, error = %e, "Dropping unreadable tags");
                    Vec::new()
                })
            })
            .unwrap_or_default();

        let content = ContentItem {
            id: ContentId::new(self.content_id.clone()),
            body: self.body,
            image_url: self.image_url,
            thumbnail_url: self.thumbnail_url,
            published_at: self.published_at.map(from_millis),
            created_at: from_millis(self.created_at),
            popularity: self.popularity,
            tags,
        };

        Interaction {
            content_id: ContentId::new(self.content_id),
            feed_index: self.feed_index,
            content,
            viewed_at: self.viewed_at.map(from_millis),
            saved_at: self.saved_at.map(from_millis),
            shared_at: self.shared_at.map(from_millis),
        }
    }
}

/// Converts stored milliseconds back to UTC, clamping out-of-range values to the epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or_default()
}
