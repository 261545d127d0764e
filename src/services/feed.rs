//! Feed engine.
//!
//! Wires the sources, filter pipeline and cursor persistence into a
//! [`PageLoader`] and exposes the paging controller as the public feed
//! surface.
//!
//! # Page flow
//!
//! 1. Priority sources are tried in order (seasonal, featured)
//! 2. Otherwise the multiplexer mixes the eligible composite sources
//! 3. Raw items run through the [`FilterPipeline`]
//! 4. On commit the cursor is persisted and surfaced items are logged

use super::boundary::BoundaryTable;
use super::cursor_codec::CursorCodec;
use super::filter::FilterPipeline;
use super::multiplexer::{CompositeSource, Multiplexer};
use super::priority::{FeaturedSource, PriorityEvaluator, PrioritySource, SeasonalSource};
use super::reconcile::Reconciler;
use super::sources::{KeysetSource, LocalCacheSource, RandomizedSource};
use crate::clock::{Clock, SystemClock};
use crate::config::FeedConfig;
use crate::models::{
    CompositeCursor, ContentId, FeedItem, InteractionKind, NewInteraction,
};
use crate::paging::{Page, PageLoader, PagingController, PagingState};
use crate::storage::{
    CursorStore, FeaturedState, InteractionLog, MemoryCursorStore, MemoryFeaturedState,
    RemoteHistory, RemoteStore, ResilientRemoteStore, ViewedStateProvider,
    seed_from_installation_id,
};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::instrument;

/// The [`PageLoader`] behind a feed.
pub struct FeedPageLoader {
    priority: PriorityEvaluator,
    multiplexer: Multiplexer,
    filter: FilterPipeline,
    clock: Arc<dyn Clock>,
    log: Arc<dyn InteractionLog>,
    cursor_store: Arc<dyn CursorStore>,
    page_size: usize,
}

impl FeedPageLoader {
    /// Creates a loader.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        priority: PriorityEvaluator,
        multiplexer: Multiplexer,
        filter: FilterPipeline,
        clock: Arc<dyn Clock>,
        log: Arc<dyn InteractionLog>,
        cursor_store: Arc<dyn CursorStore>,
        page_size: usize,
    ) -> Self {
        Self {
            priority,
            multiplexer,
            filter,
            clock,
            log,
            cursor_store,
            page_size,
        }
    }
}

#[async_trait]
impl PageLoader<FeedItem, CompositeCursor> for FeedPageLoader {
    #[instrument(
        skip(self, cursor),
        fields(
            operation = "load_page",
            global_index = cursor.as_ref().map_or(0, |c| c.total_items_loaded)
        )
    )]
    async fn load(
        &self,
        cursor: Option<CompositeCursor>,
    ) -> Result<Page<FeedItem, CompositeCursor>> {
        let mut cursor = cursor.unwrap_or_default();
        let now = self.clock.now();

        let (raw, has_more) = if let Some(page) =
            self.priority.evaluate(&mut cursor, self.page_size, now).await?
        {
            cursor.advance(page.items.len());
            // The composite mix always follows a priority page.
            (page.items, true)
        } else {
            let page = self.multiplexer.fetch_page(&cursor, self.page_size).await?;
            cursor = page.cursor;
            (page.items, page.has_more)
        };

        let raw_count = raw.len();
        let items = self.filter.apply(raw)?;
        tracing::debug!(
            raw = raw_count,
            kept = items.len(),
            has_more,
            total_items_loaded = cursor.total_items_loaded,
            "Loaded feed page"
        );

        Ok(Page {
            items,
            cursor: Some(cursor),
            has_more,
        })
    }

    fn on_committed(&self, page: &Page<FeedItem, CompositeCursor>) {
        if let Some(cursor) = &page.cursor {
            if let Err(e) = self.cursor_store.set(&CursorCodec::encode(cursor)) {
                tracing::warn!(error = %e, "Failed to persist feed cursor");
            }
        }

        for item in &page.items {
            if let Err(e) = self
                .log
                .append(NewInteraction::surfaced(item.content.clone()))
            {
                tracing::warn!(error = %e, id = %item.id(), "Failed to log surfaced item");
                break;
            }
        }

        self.priority.notify_surfaced(&page.items, self.clock.now());
    }

    fn on_reset(&self) {
        if let Err(e) = self.cursor_store.clear() {
            tracing::warn!(error = %e, "Failed to clear persisted feed cursor");
        }
    }
}

/// The composite feed: a reactive item list plus paging controls.
pub struct FeedEngine {
    controller: PagingController<FeedItem, CompositeCursor>,
    log: Arc<dyn InteractionLog>,
    clock: Arc<dyn Clock>,
}

impl FeedEngine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder(config: FeedConfig) -> FeedEngineBuilder {
        FeedEngineBuilder::new(config)
    }

    /// Current items.
    #[must_use]
    pub fn items(&self) -> Vec<FeedItem> {
        self.controller.items()
    }

    /// Subscribes to the item list.
    #[must_use]
    pub fn subscribe_items(&self) -> watch::Receiver<Vec<FeedItem>> {
        self.controller.subscribe_items()
    }

    /// Current paging metadata.
    #[must_use]
    pub fn paging_state(&self) -> PagingState<CompositeCursor> {
        self.controller.state()
    }

    /// Subscribes to paging metadata.
    #[must_use]
    pub fn subscribe_paging_state(&self) -> watch::Receiver<PagingState<CompositeCursor>> {
        self.controller.subscribe_state()
    }

    /// Number of page-loader calls issued so far.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.controller.fetch_count()
    }

    /// Loads the first page. No-op while a load is running.
    pub async fn load_first_page(&self) {
        self.controller.load_first_page().await;
    }

    /// Loads the next page. No-op while loading or when the feed is finished.
    pub async fn load_more(&self) {
        self.controller.load_more().await;
    }

    /// Reports a connectivity change.
    pub async fn on_connectivity_changed(&self, online: bool) {
        self.controller.on_connectivity_changed(online).await;
    }

    /// Clears the persisted cursor and empties the feed.
    ///
    /// The next `load_first_page` starts from a fresh cursor.
    pub fn reset(&self) {
        self.controller.reset(None);
        tracing::info!("Feed reset");
    }

    /// Records a view, save or share on a surfaced item.
    ///
    /// Returns `false` if the item was never surfaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the interaction log fails.
    pub fn record_interaction(&self, id: &ContentId, kind: InteractionKind) -> Result<bool> {
        let recorded = self.log.record(id, kind, self.clock.now())?;
        if recorded {
            metrics::counter!("feed_interactions_total", "kind" => kind.as_str()).increment(1);
        }
        Ok(recorded)
    }
}

/// Builder for [`FeedEngine`].
///
/// The interaction log and remote store are required; everything else has a
/// default.
pub struct FeedEngineBuilder {
    config: FeedConfig,
    clock: Option<Arc<dyn Clock>>,
    log: Option<Arc<dyn InteractionLog>>,
    viewed: Option<Arc<dyn ViewedStateProvider>>,
    remote: Option<Arc<dyn RemoteStore>>,
    history: Option<Arc<dyn RemoteHistory>>,
    cursor_store: Option<Arc<dyn CursorStore>>,
    featured_state: Option<Arc<dyn FeaturedState>>,
    seed: Option<u64>,
}

impl FeedEngineBuilder {
    /// Creates a builder.
    #[must_use]
    pub fn new(config: FeedConfig) -> Self {
        Self {
            config,
            clock: None,
            log: None,
            viewed: None,
            remote: None,
            history: None,
            cursor_store: None,
            featured_state: None,
            seed: None,
        }
    }

    /// Sets the clock (defaults to the system clock).
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Sets the interaction log, which also answers viewed-state lookups.
    #[must_use]
    pub fn interaction_log<L>(mut self, log: Arc<L>) -> Self
    where
        L: InteractionLog + ViewedStateProvider + 'static,
    {
        self.log = Some(log.clone());
        self.viewed = Some(log);
        self
    }

    /// Overrides the viewed-state provider.
    #[must_use]
    pub fn viewed_state(mut self, provider: Arc<dyn ViewedStateProvider>) -> Self {
        self.viewed = Some(provider);
        self
    }

    /// Sets the remote store.
    #[must_use]
    pub fn remote_store(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Sets the remote history used to backfill an empty log.
    #[must_use]
    pub fn remote_history(mut self, history: Arc<dyn RemoteHistory>) -> Self {
        self.history = Some(history);
        self
    }

    /// Sets the persisted cursor slot (defaults to an in-memory slot).
    #[must_use]
    pub fn cursor_store(mut self, store: Arc<dyn CursorStore>) -> Self {
        self.cursor_store = Some(store);
        self
    }

    /// Sets the featured-of-the-day state (defaults to in-memory).
    #[must_use]
    pub fn featured_state(mut self, state: Arc<dyn FeaturedState>) -> Self {
        self.featured_state = Some(state);
        self
    }

    /// Sets the installation seed of the randomized source.
    #[must_use]
    pub const fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Builds the engine and reads the persisted cursor once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a required collaborator is missing
    /// or the configuration is invalid.
    pub fn build(self) -> Result<FeedEngine> {
        let boundaries = self.config.boundary_table()?;
        let log = self
            .log
            .ok_or_else(|| Error::InvalidInput("interaction log is required".to_string()))?;
        let remote = self
            .remote
            .ok_or_else(|| Error::InvalidInput("remote store is required".to_string()))?;
        let remote: Arc<dyn RemoteStore> = Arc::new(ResilientRemoteStore::new(
            remote,
            &self.config.remote_breaker,
            "remote",
        ));
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let cursor_store = self
            .cursor_store
            .unwrap_or_else(|| Arc::new(MemoryCursorStore::new()));
        let featured_state = self
            .featured_state
            .unwrap_or_else(|| Arc::new(MemoryFeaturedState::new()));
        let seed = self.seed.unwrap_or_else(|| {
            seed_from_installation_id(&uuid::Uuid::new_v4().to_string())
        });

        let reconciler = self
            .history
            .map(|history| Arc::new(Reconciler::new(history, log.clone())));
        let multiplexer = composite_mix(&log, &remote, reconciler, seed, boundaries);
        let priority = priority_sources(&self.config, &remote, featured_state);

        let mut filter = FilterPipeline::new(clock.clone());
        if self.config.filter_viewed {
            match self.viewed {
                Some(viewed) => filter = filter.with_viewed_filter(viewed),
                None => {
                    return Err(Error::InvalidInput(
                        "filter_viewed requires a viewed-state provider".to_string(),
                    ));
                },
            }
        }

        let start = read_start_cursor(cursor_store.as_ref());
        let loader = Arc::new(FeedPageLoader::new(
            priority,
            multiplexer,
            filter,
            clock.clone(),
            log.clone(),
            cursor_store,
            self.config.page_size,
        ));
        let controller = PagingController::new(loader, start)
            .with_max_empty_continuations(self.config.max_empty_continuations);

        tracing::info!(
            page_size = self.config.page_size,
            filter_viewed = self.config.filter_viewed,
            seasons = self.config.seasons.len(),
            "Feed engine ready"
        );

        Ok(FeedEngine {
            controller,
            log,
            clock,
        })
    }
}

fn composite_mix(
    log: &Arc<dyn InteractionLog>,
    remote: &Arc<dyn RemoteStore>,
    reconciler: Option<Arc<Reconciler>>,
    seed: u64,
    boundaries: BoundaryTable,
) -> Multiplexer {
    let sources: Vec<Arc<dyn CompositeSource>> = vec![
        Arc::new(LocalCacheSource::new(log.clone(), remote.clone(), reconciler)),
        Arc::new(KeysetSource::popular(remote.clone())),
        Arc::new(RandomizedSource::new(seed, remote.clone())),
        Arc::new(KeysetSource::chronological(remote.clone())),
    ];
    Multiplexer::new(sources, boundaries)
}

fn priority_sources(
    config: &FeedConfig,
    remote: &Arc<dyn RemoteStore>,
    featured_state: Arc<dyn FeaturedState>,
) -> PriorityEvaluator {
    let mut sources: Vec<Arc<dyn PrioritySource>> = Vec::new();
    if !config.seasons.is_empty() {
        sources.push(Arc::new(SeasonalSource::new(
            config.seasons.clone(),
            remote.clone(),
        )));
    }
    if config.featured_enabled {
        sources.push(Arc::new(FeaturedSource::new(remote.clone(), featured_state)));
    }
    PriorityEvaluator::new(sources)
}

fn read_start_cursor(store: &dyn CursorStore) -> Option<CompositeCursor> {
    let token = match store.get() {
        Ok(token) => token,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read persisted cursor, starting fresh");
            return None;
        },
    };
    let cursor = CursorCodec::decode(token.as_deref());
    if token.is_some() && cursor.is_none() {
        tracing::info!("Persisted cursor unreadable, starting fresh");
    }
    cursor
}
