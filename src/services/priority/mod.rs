//! Priority source evaluation.
//!
//! Priority sources are consulted, in a fixed order, before the composite mix.
//! The first source that is active and not done for its current epoch
//! supplies the whole page.
//!
//! # State transitions
//!
//! | Fetch result | New state |
//! |--------------|-----------|
//! | items, `has_more` | `Active { cursor }` |
//! | items, no `has_more` | `Suspended { cursor }` |
//! | no items, `has_more` | `Active { cursor }` (transient empty batch) |
//! | no items, no `has_more` | `Done { epoch }`, next source is tried |
//!
//! `Done` only holds for the epoch it was recorded in (a season, a calendar
//! day). Once the source reports a different epoch it starts over.

mod featured;
mod seasonal;

pub use featured::FeaturedSource;
pub use seasonal::{MonthDay, SeasonWindow, SeasonalSource};

use crate::Result;
use crate::models::{CompositeCursor, FeedItem, PageResult, PriorityState, SourceId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::instrument;

/// A conditionally active source consulted before the composite mix.
#[async_trait]
pub trait PrioritySource: Send + Sync {
    /// The source identifier.
    fn id(&self) -> SourceId;

    /// The period a `Done` mark applies to (season id, calendar day).
    fn epoch(&self, now: DateTime<Utc>) -> String;

    /// Whether the source should be consulted at `now`.
    fn is_active(&self, now: DateTime<Utc>) -> bool;

    /// Fetches up to `limit` items after `cursor`.
    async fn fetch(
        &self,
        cursor: Option<&str>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<PageResult>;

    /// Called once a page containing this source's items has been committed.
    fn on_surfaced(&self, _now: DateTime<Utc>) {}
}

/// A page supplied by a priority source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityPage {
    /// The source that produced the page.
    pub source: SourceId,
    /// Items in source order.
    pub items: Vec<FeedItem>,
}

/// Walks priority sources in order.
#[derive(Clone, Default)]
pub struct PriorityEvaluator {
    sources: Vec<Arc<dyn PrioritySource>>,
}

impl PriorityEvaluator {
    /// Creates an evaluator. Earlier sources win.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn PrioritySource>>) -> Self {
        Self { sources }
    }

    /// Returns the configured source ids in evaluation order.
    #[must_use]
    pub fn source_ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    /// Tries each priority source in order and returns the first page.
    ///
    /// Updates the priority states in `cursor`, including `Done` marks for
    /// sources that finished along the way. Returns `None` when no source
    /// supplied a page and the composite mix should run.
    ///
    /// # Errors
    ///
    /// Returns the first fetch error; `cursor` may already hold `Done` marks
    /// at that point, so callers must discard it.
    #[instrument(skip(self, cursor), fields(operation = "priority_evaluate"))]
    pub async fn evaluate(
        &self,
        cursor: &mut CompositeCursor,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Option<PriorityPage>> {
        for source in &self.sources {
            let id = source.id();
            let epoch = source.epoch(now);
            let state = cursor.priority_state(id);

            if state.is_done_for(&epoch) {
                tracing::trace!(source = %id, epoch, "Priority source done for epoch");
                continue;
            }
            if !source.is_active(now) {
                tracing::trace!(source = %id, "Priority source inactive");
                continue;
            }

            // A Done mark from an earlier epoch restarts the source.
            let previous = state.cursor().map(str::to_string);
            let page = source
                .fetch(previous.as_deref(), limit, now)
                .await?
                .normalized(id.as_str());

            if page.items.is_empty() && !page.has_more {
                tracing::debug!(source = %id, epoch, "Priority source finished");
                metrics::counter!("feed_priority_done_total", "source" => id.as_str())
                    .increment(1);
                cursor.set_priority_state(id, PriorityState::Done { epoch });
                continue;
            }

            let next_cursor = page.cursor.or(previous);
            let next_state = match next_cursor {
                Some(resume) if !page.has_more => PriorityState::Suspended { cursor: resume },
                resume => PriorityState::Active { cursor: resume },
            };
            tracing::debug!(
                source = %id,
                items = page.items.len(),
                has_more = page.has_more,
                "Priority source supplied page"
            );
            cursor.set_priority_state(id, next_state);
            return Ok(Some(PriorityPage {
                source: id,
                items: page.items,
            }));
        }
        Ok(None)
    }

    /// Notifies every source whose items appear in a committed page.
    pub fn notify_surfaced(&self, items: &[FeedItem], now: DateTime<Utc>) {
        for source in &self.sources {
            let id = source.id();
            if items.iter().any(|item| item.data_source == id) {
                source.on_surfaced(now);
            }
        }
    }
}
