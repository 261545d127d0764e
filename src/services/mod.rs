//! Feed services.
//!
//! Services sit between the storage backends and the paging controller:
//! sources produce raw pages, the multiplexer and priority evaluator decide
//! which sources speak, the filter pipeline cleans the result and the
//! [`FeedEngine`] ties it all together.

pub mod boundary;
mod cursor_codec;
mod feed;
pub mod filter;
pub mod multiplexer;
pub mod priority;
pub mod reconcile;
pub mod sources;

pub use boundary::{BoundaryEntry, BoundaryTable};
pub use cursor_codec::CursorCodec;
pub use feed::{FeedEngine, FeedEngineBuilder, FeedPageLoader};
pub use filter::FilterPipeline;
pub use multiplexer::{CompositeSource, MultiplexedPage, Multiplexer};
pub use priority::{PriorityEvaluator, PriorityPage, PrioritySource};
pub use reconcile::{ReconcileReport, Reconciler};
