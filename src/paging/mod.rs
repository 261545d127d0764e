//! Generic paging state machine.
//!
//! [`PagingController`] owns loading, error, cursor and has-more state for
//! any [`PageLoader`], and publishes two reactive values: the item list and
//! the [`PagingState`] metadata.

mod machine;
mod observable;
mod state;

pub use machine::{DEFAULT_MAX_EMPTY_CONTINUATIONS, Page, PageLoader, PagingController};
pub use observable::Observable;
pub use state::{FeedPhase, PagingState};
