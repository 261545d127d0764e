//! Data models for feedweave.
//!
//! This module contains the core data structures shared by the sources, the
//! multiplexer and the paging state machine.

mod cursor;
mod interaction;
mod item;
mod page;
mod query;
mod source;

pub use cursor::{CompositeCursor, PriorityState};
pub use interaction::{Interaction, InteractionKind, NewInteraction};
pub use item::{ContentId, ContentItem, FeedItem};
pub use page::PageResult;
pub use query::{
    ContentOrder, ContentQuery, ShardCursor, ShardPage, SortKey, random_sort_key,
};
pub use source::SourceId;
