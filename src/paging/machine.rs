//! Generic paging state machine.
//!
//! ```text
//! Idle --load_first_page--> LoadingFirst --ok--> Ready --load_more--> LoadingMore
//!                               |                  ^                      |
//!                               +------err-----> Error <------err---------+
//! ```
//!
//! At most one fetch runs per generation. A failed fetch leaves items,
//! cursor and `has_more` exactly as they were. `reset` starts a new
//! generation; fetches from older generations finish but are discarded.
//! The generation check, the loader's commit hook and publication happen
//! under one lock that `reset` also takes, so a stale page can never
//! persist anything after a reset.

use super::observable::Observable;
use super::state::{FeedPhase, PagingState};
use crate::Result;
use crate::storage::sqlite::acquire_lock;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

/// Default bound on automatic continuations after a page filtered to nothing.
pub const DEFAULT_MAX_EMPTY_CONTINUATIONS: usize = 5;

/// One page produced by a [`PageLoader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T, C> {
    /// Items to show.
    pub items: Vec<T>,
    /// Cursor to continue from.
    pub cursor: Option<C>,
    /// Whether more pages follow.
    pub has_more: bool,
}

/// Supplies pages to a [`PagingController`].
#[async_trait]
pub trait PageLoader<T, C>: Send + Sync
where
    T: Send + Sync + 'static,
    C: Send + Sync + 'static,
{
    /// Loads the page after `cursor` (`None` for the very first page).
    async fn load(&self, cursor: Option<C>) -> Result<Page<T, C>>;

    /// Called before a page is published, under the commit lock and only for
    /// pages of the current generation. Implementations handle their own
    /// failures; the page is published regardless.
    fn on_committed(&self, _page: &Page<T, C>) {}

    /// Called by [`PagingController::reset`] under the commit lock, after the
    /// generation has moved on.
    fn on_reset(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadKind {
    First,
    More,
}

impl LoadKind {
    const fn as_str(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::More => "more",
        }
    }
}

/// Drives a [`PageLoader`] and publishes items plus paging metadata.
pub struct PagingController<T, C> {
    loader: Arc<dyn PageLoader<T, C>>,
    items: Observable<Vec<T>>,
    state: Observable<PagingState<C>>,
    start_cursor: Mutex<Option<C>>,
    in_flight: Mutex<Option<u64>>,
    commit_lock: Mutex<()>,
    generation: AtomicU64,
    fetch_seq: AtomicU64,
    online: AtomicBool,
    max_empty_continuations: usize,
}

impl<T, C> PagingController<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    /// Creates a controller. `start_cursor` is where the first page loads from.
    #[must_use]
    pub fn new(loader: Arc<dyn PageLoader<T, C>>, start_cursor: Option<C>) -> Self {
        Self {
            loader,
            items: Observable::new(Vec::new()),
            state: Observable::new(PagingState::default()),
            start_cursor: Mutex::new(start_cursor),
            in_flight: Mutex::new(None),
            commit_lock: Mutex::new(()),
            generation: AtomicU64::new(0),
            fetch_seq: AtomicU64::new(0),
            online: AtomicBool::new(true),
            max_empty_continuations: DEFAULT_MAX_EMPTY_CONTINUATIONS,
        }
    }

    /// Sets the continuation bound for pages that filter down to nothing.
    #[must_use]
    pub const fn with_max_empty_continuations(mut self, max: usize) -> Self {
        self.max_empty_continuations = max;
        self
    }

    /// Current items.
    #[must_use]
    pub fn items(&self) -> Vec<T> {
        self.items.get()
    }

    /// Number of current items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.items.read(Vec::len)
    }

    /// Subscribes to item list changes.
    #[must_use]
    pub fn subscribe_items(&self) -> watch::Receiver<Vec<T>> {
        self.items.subscribe()
    }

    /// Current paging metadata.
    #[must_use]
    pub fn state(&self) -> PagingState<C> {
        self.state.get()
    }

    /// Subscribes to paging metadata changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<PagingState<C>> {
        self.state.subscribe()
    }

    /// Number of loader calls issued so far.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetch_seq.load(Ordering::SeqCst)
    }

    /// Loads the first page from the start cursor, replacing the items.
    ///
    /// No-op while a fetch of the current generation is running.
    pub async fn load_first_page(&self) {
        let Some(generation) = self.begin() else {
            tracing::debug!("Load already in flight, ignoring first-page request");
            return;
        };
        let start = acquire_lock(&self.start_cursor).clone();
        self.run(generation, start, LoadKind::First).await;
    }

    /// Loads the page after the current cursor, appending the items.
    ///
    /// No-op while loading or once `has_more` is false. Before anything has
    /// been committed this loads the first page instead.
    pub async fn load_more(&self) {
        let Some(generation) = self.begin() else {
            tracing::debug!("Load already in flight, ignoring load-more request");
            return;
        };
        let current = self.state.get();
        if !current.has_more {
            tracing::debug!("No more pages");
            self.settle(generation);
            return;
        }
        match current.cursor {
            Some(cursor) => self.run(generation, Some(cursor), LoadKind::More).await,
            None => {
                let start = acquire_lock(&self.start_cursor).clone();
                self.run(generation, start, LoadKind::First).await;
            },
        }
    }

    /// Drops all items and starts a new generation from `start_cursor`.
    ///
    /// A fetch still running finishes in the background and is discarded.
    /// The loader's reset hook runs before this returns.
    pub fn reset(&self, start_cursor: Option<C>) {
        let _commit = acquire_lock(&self.commit_lock);
        {
            let _in_flight = acquire_lock(&self.in_flight);
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.loader.on_reset();
        *acquire_lock(&self.start_cursor) = start_cursor;
        self.items.set(Vec::new());
        self.state.set(PagingState::default());
        tracing::debug!("Paging state reset");
    }

    /// Reports a connectivity change.
    ///
    /// Coming back online reloads the first page only when nothing is shown;
    /// otherwise the state is left for the next `load_more`.
    pub async fn on_connectivity_changed(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if online && !was_online && self.item_count() == 0 {
            tracing::debug!("Back online with an empty feed, reloading");
            self.load_first_page().await;
        }
    }

    fn begin(&self) -> Option<u64> {
        let mut in_flight = acquire_lock(&self.in_flight);
        let generation = self.generation.load(Ordering::SeqCst);
        if *in_flight == Some(generation) {
            return None;
        }
        *in_flight = Some(generation);
        Some(generation)
    }

    fn settle(&self, generation: u64) {
        let mut in_flight = acquire_lock(&self.in_flight);
        if *in_flight == Some(generation) {
            *in_flight = None;
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    async fn run(&self, generation: u64, cursor: Option<C>, kind: LoadKind) {
        let phase = match kind {
            LoadKind::First => FeedPhase::LoadingFirst,
            LoadKind::More => FeedPhase::LoadingMore,
        };
        self.state.update(|s| s.start(phase));

        match self.fetch_chain(generation, cursor).await {
            Ok(Some(page)) => self.commit(generation, page, kind),
            Ok(None) => tracing::debug!("Discarding page from superseded generation"),
            Err(e) => {
                tracing::warn!(error = %e, kind = kind.as_str(), "Page load failed");
                metrics::counter!("feed_page_errors_total", "kind" => kind.as_str()).increment(1);
                let _commit = acquire_lock(&self.commit_lock);
                if self.is_current(generation) {
                    self.state.update(|s| s.fail(e.to_string()));
                }
            },
        }
        self.settle(generation);
    }

    /// Fetches until a page has items, has no more, or the continuation
    /// bound is hit. Returns `None` if the generation changed meanwhile.
    async fn fetch_chain(&self, generation: u64, cursor: Option<C>) -> Result<Option<Page<T, C>>> {
        let mut cursor = cursor;
        let mut continuations = 0;
        loop {
            let seq = self.fetch_seq.fetch_add(1, Ordering::SeqCst) + 1;
            let page = self.loader.load(cursor.clone()).await?;
            if !self.is_current(generation) || self.fetch_seq.load(Ordering::SeqCst) != seq {
                return Ok(None);
            }

            let continue_empty = page.items.is_empty() && page.has_more && page.cursor.is_some();
            if continue_empty && continuations < self.max_empty_continuations {
                continuations += 1;
                tracing::debug!(seq, continuations, "Page empty after filtering, continuing");
                cursor = page.cursor;
                continue;
            }
            if continue_empty {
                tracing::warn!(
                    continuations,
                    "Giving up on empty pages, committing cursor for the next load"
                );
            }
            return Ok(Some(page));
        }
    }

    fn commit(&self, generation: u64, page: Page<T, C>, kind: LoadKind) {
        let _commit = acquire_lock(&self.commit_lock);
        if !self.is_current(generation) {
            tracing::debug!("Generation changed before commit, discarding page");
            return;
        }
        self.loader.on_committed(&page);

        let Page {
            items,
            cursor,
            has_more,
        } = page;
        let count = items.len();
        match kind {
            LoadKind::First => self.items.set(items),
            LoadKind::More => self.items.update(|list| list.extend(items)),
        }
        self.state.update(|s| {
            if cursor.is_some() {
                s.cursor = cursor;
            }
            s.has_more = has_more;
            s.is_loading = false;
            s.error = None;
            s.phase = FeedPhase::Ready;
        });

        metrics::counter!("feed_pages_loaded_total", "kind" => kind.as_str()).increment(1);
        tracing::debug!(kind = kind.as_str(), count, has_more, "Committed page");
    }
}
