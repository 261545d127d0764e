//! End-to-end tests driving `FeedEngine` against in-memory collaborators.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use feedweave::models::{ContentQuery, NewInteraction, ShardCursor, ShardPage};
use feedweave::services::boundary::BoundaryEntry;
use feedweave::services::priority::{MonthDay, SeasonWindow};
use feedweave::services::sources::RandomizedSource;
use feedweave::services::CompositeSource;
use feedweave::storage::{MemoryCursorStore, MemoryInteractionLog, MemoryRemoteStore};
use feedweave::{
    Clock, ContentId, ContentItem, CursorCodec, CursorStore, FeedConfig, FeedEngine, FeedPhase,
    InteractionLog, ManualClock, RemoteStore, SourceId,
};
use std::sync::Arc;
use tokio::sync::Notify;

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 15, 12, 0, 0).unwrap()
}

fn complete(id: &str) -> ContentItem {
    ContentItem::new(id, format!("body of {id}")).with_media(
        format!("https://img.example/{id}.jpg"),
        format!("https://img.example/{id}_t.jpg"),
    )
}

fn numbered(n: usize) -> Vec<ContentItem> {
    (0..n)
        .map(|i| complete(&format!("c{i:03}")).with_popularity(i64::try_from(i).unwrap()))
        .collect()
}

/// Local cache as the only composite source, paging one shard at a time.
fn local_cache_only() -> FeedConfig {
    FeedConfig::default()
        .with_page_size(50)
        .with_featured(false)
        .with_boundaries(vec![BoundaryEntry::new(SourceId::LocalCache, Some(0), None)])
}

struct Harness {
    log: Arc<MemoryInteractionLog>,
    remote: Arc<MemoryRemoteStore>,
    cursor_store: Arc<MemoryCursorStore>,
    clock: Arc<ManualClock>,
}

impl Harness {
    fn new(items: Vec<ContentItem>) -> Self {
        Self {
            log: Arc::new(MemoryInteractionLog::new()),
            remote: Arc::new(MemoryRemoteStore::with_items(50, items)),
            cursor_store: Arc::new(MemoryCursorStore::new()),
            clock: Arc::new(ManualClock::new(now())),
        }
    }

    fn engine(&self, config: FeedConfig) -> FeedEngine {
        FeedEngine::builder(config)
            .clock(self.clock.clone())
            .interaction_log(self.log.clone())
            .remote_store(self.remote.clone())
            .cursor_store(self.cursor_store.clone())
            .seed(42)
            .build()
            .unwrap()
    }

    fn persisted(&self) -> Option<feedweave::CompositeCursor> {
        CursorCodec::decode(self.cursor_store.get().unwrap().as_deref())
    }
}

#[tokio::test]
async fn test_empty_log_falls_back_to_first_shard() {
    let mut items = numbered(50);
    items[10] = complete("c010").with_published_at(now() + Duration::days(1));
    items[20] = complete("c005");
    let harness = Harness::new(items);
    let feed = harness.engine(local_cache_only());

    feed.load_first_page().await;

    let shown = feed.items();
    assert_eq!(shown.len(), 48);
    assert!(shown.iter().all(|item| item.data_source == SourceId::LocalCache));
    assert!(shown.iter().all(|item| item.id().as_str() != "c010"));
    assert_eq!(
        shown.iter().filter(|item| item.id().as_str() == "c005").count(),
        1
    );

    let cursor = harness.persisted().expect("cursor persisted");
    assert_eq!(cursor.total_items_loaded, 50);
    assert!(
        cursor
            .sub_cursor(SourceId::LocalCache)
            .is_some_and(|c| c.contains("shard-1"))
    );
    assert_eq!(harness.log.count().unwrap(), 48);
}

#[tokio::test]
async fn test_default_boundaries_stop_pages_at_each_transition() {
    let harness = Harness::new(numbered(200));
    let feed = harness.engine(FeedConfig::default().with_featured(false));

    feed.load_first_page().await;
    let mut totals = vec![harness.persisted().unwrap().total_items_loaded];
    for _ in 0..4 {
        feed.load_more().await;
        totals.push(harness.persisted().unwrap().total_items_loaded);
    }
    assert_eq!(totals, vec![20, 30, 50, 60, 80]);

    let items = feed.items();
    let from = |items: &[feedweave::FeedItem], source: SourceId| {
        items.iter().filter(|item| item.data_source == source).count()
    };
    // Indices 0..30 belong to the local cache and the popularity ranking.
    assert_eq!(from(&items[..30], SourceId::Popular), 15);
    assert_eq!(from(&items[..30], SourceId::LocalCache), 15);
    assert_eq!(from(&items[30..], SourceId::Popular), 0);
    assert!(from(&items[30..], SourceId::Randomized) > 0);
    assert_eq!(items[29].data_source, SourceId::Popular);
}

#[tokio::test]
async fn test_seasonal_source_finishes_then_yields_to_mix() {
    let mut items = numbered(40);
    for i in 0..5 {
        items.push(complete(&format!("pumpkin-{i}")).with_tag("halloween"));
    }
    let harness = Harness::new(items);
    let config = FeedConfig::default()
        .with_featured(false)
        .with_season(SeasonWindow {
            id: "halloween".to_string(),
            tag: "halloween".to_string(),
            start: MonthDay::new(10, 1).unwrap(),
            end: MonthDay::new(10, 31).unwrap(),
        });
    let feed = harness.engine(config);

    feed.load_first_page().await;
    let first = feed.items();
    assert_eq!(first.len(), 5);
    assert!(first.iter().all(|item| item.data_source == SourceId::Seasonal));
    assert!(feed.paging_state().has_more);

    feed.load_more().await;
    let state = feed.paging_state();
    let cursor = state.cursor.expect("cursor after second page");
    assert!(cursor.priority_state(SourceId::Seasonal).is_done());
    let second = &feed.items()[5..];
    assert!(!second.is_empty());
    assert!(second.iter().all(|item| item.data_source != SourceId::Seasonal));

    feed.load_more().await;
    let third_cursor = feed.paging_state().cursor.expect("cursor after third page");
    assert!(third_cursor.priority_state(SourceId::Seasonal).is_done());
    assert!(
        feed.items()
            .iter()
            .skip(5)
            .all(|item| item.data_source != SourceId::Seasonal)
    );
}

#[tokio::test]
async fn test_randomized_source_wraps_after_exhaustion() {
    let remote: Arc<dyn RemoteStore> = Arc::new(MemoryRemoteStore::with_items(50, numbered(10)));
    let source = RandomizedSource::new(7, remote);

    let first = source.fetch(None, 4).await.unwrap();
    let second = source.fetch(first.cursor.as_deref(), 4).await.unwrap();
    let last = source.fetch(second.cursor.as_deref(), 4).await.unwrap();
    assert_eq!(last.items.len(), 2);
    assert!(!last.has_more);
    assert!(last.cursor.is_some());

    let wrapped = source.fetch(last.cursor.as_deref(), 4).await.unwrap();
    assert!(wrapped.has_more);
    assert_eq!(wrapped.items, first.items);
}

/// Remote store whose shard reads wait for a signal.
struct GatedRemote {
    inner: MemoryRemoteStore,
    gate: Arc<Notify>,
}

#[async_trait]
impl RemoteStore for GatedRemote {
    async fn get_sharded_page(
        &self,
        after: Option<&ShardCursor>,
    ) -> feedweave::Result<ShardPage> {
        self.gate.notified().await;
        self.inner.get_sharded_page(after).await
    }

    async fn get_by_ids(&self, ids: &[ContentId]) -> feedweave::Result<Vec<ContentItem>> {
        self.inner.get_by_ids(ids).await
    }

    async fn query(&self, query: &ContentQuery) -> feedweave::Result<Vec<ContentItem>> {
        self.inner.query(query).await
    }

    async fn featured_for(&self, day: NaiveDate) -> feedweave::Result<Option<ContentItem>> {
        self.inner.featured_for(day).await
    }
}

#[tokio::test]
async fn test_concurrent_first_loads_fetch_once() {
    let gate = Arc::new(Notify::new());
    let remote = Arc::new(GatedRemote {
        inner: MemoryRemoteStore::with_items(50, numbered(60)),
        gate: gate.clone(),
    });
    let feed = FeedEngine::builder(local_cache_only())
        .clock(Arc::new(ManualClock::new(now())))
        .interaction_log(Arc::new(MemoryInteractionLog::new()))
        .remote_store(remote)
        .seed(1)
        .build()
        .unwrap();

    tokio::join!(feed.load_first_page(), feed.load_first_page(), async {
        tokio::task::yield_now().await;
        gate.notify_one();
    });

    assert_eq!(feed.fetch_count(), 1);
    assert_eq!(feed.items().len(), 50);
    assert!(!feed.paging_state().is_loading);
}

#[tokio::test]
async fn test_reset_during_load_persists_nothing_from_stale_page() {
    let gate = Arc::new(Notify::new());
    let remote = Arc::new(GatedRemote {
        inner: MemoryRemoteStore::with_items(50, numbered(60)),
        gate: gate.clone(),
    });
    let log = Arc::new(MemoryInteractionLog::new());
    let cursor_store = Arc::new(MemoryCursorStore::new());
    let feed = Arc::new(
        FeedEngine::builder(local_cache_only())
            .clock(Arc::new(ManualClock::new(now())))
            .interaction_log(log.clone())
            .remote_store(remote)
            .cursor_store(cursor_store.clone())
            .seed(1)
            .build()
            .unwrap(),
    );

    let loading = tokio::spawn({
        let feed = feed.clone();
        async move { feed.load_first_page().await }
    });
    tokio::task::yield_now().await;
    feed.reset();
    gate.notify_one();
    loading.await.unwrap();

    assert!(feed.items().is_empty());
    assert_eq!(feed.paging_state().phase, FeedPhase::Idle);
    assert!(cursor_store.get().unwrap().is_none());
    assert_eq!(log.count().unwrap(), 0);
}

#[tokio::test]
async fn test_failed_page_preserves_progress() {
    let harness = Harness::new(numbered(120));
    let feed = harness.engine(FeedConfig::default().with_featured(false));

    feed.load_first_page().await;
    let items_before = feed.items();
    let state_before = feed.paging_state();
    assert!(!items_before.is_empty());

    harness.remote.fail_next(1);
    feed.load_more().await;

    let failed = feed.paging_state();
    assert_eq!(failed.phase, FeedPhase::Error);
    assert!(failed.error.is_some());
    assert!(!failed.is_loading);
    assert_eq!(failed.cursor, state_before.cursor);
    assert_eq!(failed.has_more, state_before.has_more);
    assert_eq!(feed.items(), items_before);

    feed.load_more().await;
    let recovered = feed.paging_state();
    assert!(recovered.error.is_none());
    assert_eq!(recovered.phase, FeedPhase::Ready);
    assert!(feed.items().len() > items_before.len());
}

#[tokio::test]
async fn test_new_engine_resumes_from_persisted_cursor() {
    let harness = Harness::new(numbered(120));
    harness.engine(local_cache_only()).load_first_page().await;

    let resumed = harness.engine(local_cache_only());
    resumed.load_first_page().await;

    let items = resumed.items();
    assert_eq!(items.len(), 50);
    assert_eq!(items[0].id().as_str(), "c050");
}

#[tokio::test]
async fn test_unreadable_persisted_cursor_starts_fresh() {
    let harness = Harness::new(numbered(60));
    harness.cursor_store.set("definitely not a cursor").unwrap();

    let feed = harness.engine(local_cache_only());
    feed.load_first_page().await;

    assert_eq!(feed.items()[0].id().as_str(), "c000");
    assert_eq!(harness.persisted().unwrap().total_items_loaded, 50);
}

#[tokio::test]
async fn test_reset_clears_cursor_and_replays_log() {
    let harness = Harness::new(numbered(60));
    let feed = harness.engine(local_cache_only());
    feed.load_first_page().await;
    assert!(harness.persisted().is_some());

    feed.reset();
    assert!(feed.items().is_empty());
    assert!(harness.cursor_store.get().unwrap().is_none());
    assert_eq!(feed.paging_state().phase, FeedPhase::Idle);

    feed.load_first_page().await;
    let items = feed.items();
    assert_eq!(items.len(), 50);
    assert_eq!(items[0].id().as_str(), "c000");
    assert!(items.iter().all(|item| item.data_source == SourceId::LocalCache));
}

#[tokio::test]
async fn test_viewed_items_filtered_when_enabled() {
    let harness = Harness::new(Vec::new());
    harness
        .log
        .append(NewInteraction::surfaced(complete("seen")).viewed_at(now()))
        .unwrap();
    harness
        .log
        .append(NewInteraction::surfaced(complete("fresh")))
        .unwrap();

    let feed = harness.engine(local_cache_only().with_filter_viewed(true));
    feed.load_first_page().await;

    let ids: Vec<String> = feed
        .items()
        .iter()
        .map(|item| item.id().as_str().to_string())
        .collect();
    assert_eq!(ids, vec!["fresh".to_string()]);
}

#[tokio::test]
async fn test_featured_item_shown_once_per_day() {
    let harness = Harness::new(numbered(60));
    harness
        .remote
        .set_featured(now().date_naive(), "c030");
    let feed = harness.engine(FeedConfig::default());

    feed.load_first_page().await;
    let first = feed.items();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].data_source, SourceId::Featured);
    assert_eq!(first[0].id().as_str(), "c030");

    feed.load_more().await;
    assert!(
        feed.items()
            .iter()
            .skip(1)
            .all(|item| item.data_source != SourceId::Featured)
    );

    harness.clock.advance(Duration::days(1));
    harness
        .remote
        .set_featured(harness.clock.now().date_naive(), "c031");
    feed.reset();
    feed.load_first_page().await;
    assert_eq!(feed.items()[0].id().as_str(), "c031");
}

#[tokio::test]
async fn test_reconnect_reloads_only_empty_feed() {
    let harness = Harness::new(numbered(60));
    let feed = harness.engine(local_cache_only());

    feed.on_connectivity_changed(false).await;
    feed.on_connectivity_changed(true).await;
    assert_eq!(feed.items().len(), 50);
    let fetches = feed.fetch_count();

    feed.on_connectivity_changed(false).await;
    feed.on_connectivity_changed(true).await;
    assert_eq!(feed.fetch_count(), fetches);
}

#[tokio::test]
async fn test_record_interaction_updates_log() {
    let harness = Harness::new(numbered(10));
    let feed = harness.engine(local_cache_only());
    feed.load_first_page().await;

    let id = ContentId::new("c003");
    assert!(
        feed.record_interaction(&id, feedweave::InteractionKind::Viewed)
            .unwrap()
    );
    let row = harness.log.get_by_ids(&[id]).unwrap();
    assert_eq!(row[0].viewed_at, Some(now()));
}
