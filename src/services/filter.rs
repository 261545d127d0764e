//! Filter pipeline.
//!
//! Runs after multiplexing and before the cursor is committed:
//!
//! 1. **Dedupe**: first occurrence of each content id wins
//! 2. **Completeness**: both media fields present and non-empty
//! 3. **Scheduled**: publish time unset or not in the future
//! 4. **Viewed** (optional): one batch lookup of unviewed ids
//!
//! Every stage keeps the relative order of surviving items.

use crate::Result;
use crate::clock::Clock;
use crate::models::{ContentId, FeedItem};
use crate::storage::ViewedStateProvider;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;

/// Keeps the first occurrence of every content id.
#[must_use]
pub fn dedupe(items: Vec<FeedItem>) -> Vec<FeedItem> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.id().clone()))
        .collect()
}

/// Drops items missing either media field. Empty strings count as missing.
#[must_use]
pub fn drop_incomplete(items: Vec<FeedItem>) -> Vec<FeedItem> {
    items.into_iter().filter(is_complete).collect()
}

fn is_complete(item: &FeedItem) -> bool {
    let present = |field: &Option<String>| field.as_deref().is_some_and(|s| !s.is_empty());
    present(&item.content.image_url) && present(&item.content.thumbnail_url)
}

/// Drops items scheduled strictly after `now`.
#[must_use]
pub fn drop_scheduled(items: Vec<FeedItem>, now: DateTime<Utc>) -> Vec<FeedItem> {
    items
        .into_iter()
        .filter(|item| item.content.published_at.is_none_or(|at| at <= now))
        .collect()
}

/// The post-multiplex filter chain.
#[derive(Clone)]
pub struct FilterPipeline {
    clock: Arc<dyn Clock>,
    viewed: Option<Arc<dyn ViewedStateProvider>>,
}

impl FilterPipeline {
    /// Creates a pipeline without the viewed filter.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            viewed: None,
        }
    }

    /// Enables the viewed filter.
    #[must_use]
    pub fn with_viewed_filter(mut self, provider: Arc<dyn ViewedStateProvider>) -> Self {
        self.viewed = Some(provider);
        self
    }

    /// Returns true if the viewed filter is enabled.
    #[must_use]
    pub const fn filters_viewed(&self) -> bool {
        self.viewed.is_some()
    }

    /// Runs all stages.
    ///
    /// # Errors
    ///
    /// Returns an error only if the viewed-state lookup fails.
    #[instrument(skip(self, items), fields(operation = "filter", input = items.len()))]
    pub fn apply(&self, items: Vec<FeedItem>) -> Result<Vec<FeedItem>> {
        let before = items.len();
        let items = dedupe(items);
        record_dropped("dedupe", before, items.len());

        let before = items.len();
        let items = drop_incomplete(items);
        record_dropped("completeness", before, items.len());

        let before = items.len();
        let items = drop_scheduled(items, self.clock.now());
        record_dropped("scheduled", before, items.len());

        let Some(provider) = &self.viewed else {
            return Ok(items);
        };
        if items.is_empty() {
            return Ok(items);
        }

        let before = items.len();
        let ids: Vec<ContentId> = items.iter().map(|item| item.id().clone()).collect();
        let unviewed: HashSet<ContentId> = provider.unviewed_ids(&ids)?.into_iter().collect();
        let items: Vec<FeedItem> = items
            .into_iter()
            .filter(|item| unviewed.contains(item.id()))
            .collect();
        record_dropped("viewed", before, items.len());

        Ok(items)
    }
}

fn record_dropped(filter: &'static str, before: usize, after: usize) {
    let dropped = before.saturating_sub(after);
    if dropped > 0 {
        tracing::debug!(filter, dropped, "Filtered feed items");
        metrics::counter!("feed_items_filtered_total", "filter" => filter)
            .increment(u64::try_from(dropped).unwrap_or(u64::MAX));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::models::{ContentItem, InteractionKind, NewInteraction, SourceId};
    use crate::storage::{InteractionLog, MemoryInteractionLog};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 31, 12, 0, 0).unwrap()
    }

    fn item(id: &str, source: SourceId) -> FeedItem {
        FeedItem::new(
            ContentItem::new(id, id).with_media("img", "thumb"),
            source,
        )
    }

    fn ids(items: &[FeedItem]) -> Vec<&str> {
        items.iter().map(|i| i.id().as_str()).collect()
    }

    fn pipeline() -> FilterPipeline {
        FilterPipeline::new(Arc::new(ManualClock::new(now())))
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence_across_sources() {
        let items = vec![
            item("a", SourceId::Popular),
            item("b", SourceId::Popular),
            item("a", SourceId::LocalCache),
        ];
        let out = dedupe(items);
        assert_eq!(ids(&out), vec!["a", "b"]);
        assert_eq!(out[0].data_source, SourceId::Popular);
    }

    #[test]
    fn test_empty_media_counts_as_missing() {
        let mut no_thumb = item("b", SourceId::Popular);
        no_thumb.content.thumbnail_url = Some(String::new());
        let mut no_image = item("c", SourceId::Popular);
        no_image.content.image_url = None;

        let out = drop_incomplete(vec![item("a", SourceId::Popular), no_thumb, no_image]);
        assert_eq!(ids(&out), vec!["a"]);
    }

    #[test]
    fn test_scheduled_filter_uses_injected_clock() {
        let mut future = item("future", SourceId::Popular);
        future.content.published_at = Some(now() + Duration::seconds(1));
        let mut exact = item("exact", SourceId::Popular);
        exact.content.published_at = Some(now());

        let out = drop_scheduled(
            vec![item("unscheduled", SourceId::Popular), future, exact],
            now(),
        );
        assert_eq!(ids(&out), vec!["unscheduled", "exact"]);
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let mut future = item("future", SourceId::Popular);
        future.content.published_at = Some(now() + Duration::days(1));
        let items = vec![
            item("a", SourceId::Popular),
            item("a", SourceId::Randomized),
            future,
            item("b", SourceId::Randomized),
        ];

        let pipeline = pipeline();
        let once = pipeline.apply(items).unwrap();
        let twice = pipeline.apply(once.clone()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec!["a", "b"]);
    }

    #[test]
    fn test_viewed_filter_keeps_unviewed_only() {
        let log = Arc::new(MemoryInteractionLog::new());
        log.append(NewInteraction::surfaced(ContentItem::new("seen", "seen")))
            .unwrap();
        log.record(&ContentId::new("seen"), InteractionKind::Viewed, now())
            .unwrap();

        let pipeline = pipeline().with_viewed_filter(log);
        assert!(pipeline.filters_viewed());

        let out = pipeline
            .apply(vec![item("seen", SourceId::Popular), item("new", SourceId::Popular)])
            .unwrap();
        assert_eq!(ids(&out), vec!["new"]);
    }
}
