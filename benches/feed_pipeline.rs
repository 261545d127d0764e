//! Benchmarks for the synchronous parts of page assembly.
//!
//! Everything between the source fetches and the published page is pure
//! computation: interleaving, filtering and cursor encoding. These run on
//! every page, so they should stay well under a millisecond for a page of
//! a few hundred raw items.

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]

use chrono::{Duration, TimeZone, Utc};
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use feedweave::models::PriorityState;
use feedweave::services::multiplexer::interleave;
use feedweave::{
    CompositeCursor, ContentItem, CursorCodec, FeedItem, FilterPipeline, ManualClock, SourceId,
};
use std::hint::black_box;
use std::sync::Arc;

const COMPOSITE: [SourceId; 4] = [
    SourceId::LocalCache,
    SourceId::Popular,
    SourceId::Randomized,
    SourceId::Chronological,
];

/// Four source batches with overlapping ids, some incomplete and some
/// scheduled in the future.
fn raw_batches(per_source: usize) -> Vec<Vec<FeedItem>> {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().unwrap_or_default();
    COMPOSITE
        .iter()
        .enumerate()
        .map(|(s, source)| {
            (0..per_source)
                .map(|i| {
                    let mut item = ContentItem::new(format!("c{}", i * (s + 1) % (per_source * 2)), "x");
                    if i % 7 != 0 {
                        item = item.with_media("img", "thumb");
                    }
                    if i % 11 == 0 {
                        item = item.with_published_at(now + Duration::days(1));
                    }
                    FeedItem::new(item, *source)
                })
                .collect()
        })
        .collect()
}

fn bench_interleave(c: &mut Criterion) {
    let mut group = c.benchmark_group("interleave");
    for per_source in [5, 25, 100] {
        let batches = raw_batches(per_source);
        group.throughput(Throughput::Elements((per_source * COMPOSITE.len()) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(per_source),
            &batches,
            |b, batches| b.iter(|| interleave(black_box(batches.clone()))),
        );
    }
    group.finish();
}

fn bench_filter_pipeline(c: &mut Criterion) {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).single().unwrap_or_default(),
    ));
    let pipeline = FilterPipeline::new(clock);

    let mut group = c.benchmark_group("filter_pipeline");
    for per_source in [5, 25, 100] {
        let raw = interleave(raw_batches(per_source));
        group.throughput(Throughput::Elements(raw.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(per_source), &raw, |b, raw| {
            b.iter(|| pipeline.apply(black_box(raw.clone())));
        });
    }
    group.finish();
}

fn bench_cursor_codec(c: &mut Criterion) {
    let mut cursor = CompositeCursor::new();
    cursor.advance(1_250);
    for source in COMPOSITE {
        cursor.merge_sub_cursor(source, Some(format!("{{\"primary\":42,\"id\":\"{source}-9999\"}}")));
    }
    cursor.set_priority_state(
        SourceId::Seasonal,
        PriorityState::Done {
            epoch: "halloween-2024".to_string(),
        },
    );
    let token = CursorCodec::encode(&cursor);

    let mut group = c.benchmark_group("cursor_codec");
    group.bench_function("encode", |b| b.iter(|| CursorCodec::encode(black_box(&cursor))));
    group.bench_function("decode", |b| {
        b.iter(|| CursorCodec::decode(black_box(Some(token.as_str()))));
    });
    group.finish();
}

criterion_group!(benches, bench_interleave, bench_filter_pipeline, bench_cursor_codec);
criterion_main!(benches);
