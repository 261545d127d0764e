//! Composite source multiplexer.
//!
//! Fans one page request out to every eligible composite source, then
//! interleaves the batches round-robin in boundary-table order. Arrival order
//! never influences the result.

use super::boundary::BoundaryTable;
use crate::Result;
use crate::models::{CompositeCursor, FeedItem, PageResult, SourceId};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::instrument;

/// A source mixed into the general feed.
#[async_trait]
pub trait CompositeSource: Send + Sync {
    /// The source identifier.
    fn id(&self) -> SourceId;

    /// True for logically infinite sources that restart after exhaustion.
    fn wraps_around(&self) -> bool {
        false
    }

    /// Fetches up to `limit` items after `cursor`.
    async fn fetch(&self, cursor: Option<&str>, limit: usize) -> Result<PageResult>;
}

/// Result of one multiplexed fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiplexedPage {
    /// Interleaved, unfiltered items.
    pub items: Vec<FeedItem>,
    /// Cursor with merged sub-source cursors and the advanced counter.
    pub cursor: CompositeCursor,
    /// Whether any source can produce more.
    pub has_more: bool,
}

/// Splits `limit` equally over `sources`; the remainder goes to the first ones.
#[must_use]
pub fn split_shares(limit: usize, sources: usize) -> Vec<usize> {
    if sources == 0 {
        return Vec::new();
    }
    let base = limit / sources;
    let extra = limit % sources;
    (0..sources)
        .map(|i| base + usize::from(i < extra))
        .collect()
}

/// Round-robin interleave preserving each batch's internal order.
#[must_use]
pub fn interleave<T>(batches: Vec<Vec<T>>) -> Vec<T> {
    let total = batches.iter().map(Vec::len).sum();
    let mut out = Vec::with_capacity(total);
    let mut iters: Vec<_> = batches.into_iter().map(Vec::into_iter).collect();
    while out.len() < total {
        for iter in &mut iters {
            if let Some(item) = iter.next() {
                out.push(item);
            }
        }
    }
    out
}

/// Mixes the registered composite sources.
#[derive(Clone)]
pub struct Multiplexer {
    sources: Vec<Arc<dyn CompositeSource>>,
    boundaries: BoundaryTable,
}

impl Multiplexer {
    /// Creates a multiplexer. Sources absent from the boundary table are never
    /// eligible.
    #[must_use]
    pub fn new(sources: Vec<Arc<dyn CompositeSource>>, boundaries: BoundaryTable) -> Self {
        Self {
            sources,
            boundaries,
        }
    }

    /// Returns the boundary table.
    #[must_use]
    pub const fn boundaries(&self) -> &BoundaryTable {
        &self.boundaries
    }

    fn eligible(&self, global_index: u64) -> Vec<Arc<dyn CompositeSource>> {
        self.boundaries
            .eligible_sources(global_index)
            .into_iter()
            .filter_map(|id| self.sources.iter().find(|s| s.id() == id).cloned())
            .collect()
    }

    /// Fetches one page from all eligible sources.
    ///
    /// `cursor` is left untouched; the advanced cursor is returned with the
    /// page so a failed fetch cannot leak partial progress.
    ///
    /// # Errors
    ///
    /// Fails if any single source fails; there are no partial pages.
    #[instrument(
        skip(self, cursor),
        fields(operation = "multiplex", global_index = cursor.total_items_loaded)
    )]
    pub async fn fetch_page(
        &self,
        cursor: &CompositeCursor,
        page_size: usize,
    ) -> Result<MultiplexedPage> {
        let global_index = cursor.total_items_loaded;
        let eligible = self.eligible(global_index);
        let limit = self.boundaries.effective_limit(global_index, page_size);
        let shares = split_shares(limit, eligible.len());

        let active: Vec<(Arc<dyn CompositeSource>, usize)> = eligible
            .into_iter()
            .zip(shares)
            .filter(|(_, share)| *share > 0)
            .collect();

        tracing::debug!(
            global_index,
            limit,
            sources = ?active.iter().map(|(s, n)| (s.id(), *n)).collect::<Vec<_>>(),
            "Multiplexing composite sources"
        );

        let fetches = active.iter().map(|(source, share)| {
            let sub_cursor = cursor.sub_cursor(source.id());
            async move {
                let page = source.fetch(sub_cursor, *share).await?;
                Ok::<_, crate::Error>(page.normalized(source.id().as_str()))
            }
        });
        let pages = try_join_all(fetches).await?;

        let mut next = cursor.clone();
        let mut has_more = false;
        let mut raw = 0usize;
        let mut batches = Vec::with_capacity(pages.len());
        for ((source, _), page) in active.iter().zip(pages) {
            raw += page.items.len();
            has_more |= page.has_more || (source.wraps_around() && page.cursor.is_some());
            next.merge_sub_cursor(source.id(), page.cursor);
            batches.push(page.items);
        }
        next.advance(raw);

        Ok(MultiplexedPage {
            items: interleave(batches),
            cursor: next,
            has_more,
        })
    }
}
