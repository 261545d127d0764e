//! # Feedweave
//!
//! A composite feed paging engine.
//!
//! Feedweave turns several independent, differently ordered paginated sources
//! (an on-device interaction log, a sharded remote store, popularity and
//! chronological rankings, a randomized rotation, seasonal and featured
//! inserts) into one resumable, deduplicated, infinite-scroll feed.
//!
//! ## Layers
//!
//! - **Models**: feed items, page results, the composite resumption cursor
//! - **Services**: cursor codec, boundary table, filter pipeline, priority
//!   evaluator, source multiplexer and the [`FeedEngine`] that wires them
//! - **Paging**: the generic paging state machine published to the UI layer
//! - **Storage**: interaction log, remote store, cursor store backends
//!
//! ## Example
//!
//! ```rust,ignore
//! use feedweave::{FeedConfig, FeedEngine};
//!
//! let engine = FeedEngine::builder(FeedConfig::default())
//!     .interaction_log(log)
//!     .remote_store(remote)
//!     .cursor_store(cursor_store)
//!     .build()?;
//!
//! engine.load_first_page().await;
//! let items = engine.items();
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod clock;
pub mod config;
pub mod models;
pub mod observability;
pub mod paging;
pub mod services;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::FeedConfig;
pub use models::{
    CompositeCursor, ContentId, ContentItem, FeedItem, Interaction, InteractionKind, PageResult,
    PriorityState, SourceId,
};
pub use paging::{FeedPhase, Observable, Page, PageLoader, PagingController, PagingState};
pub use services::{BoundaryTable, CursorCodec, FeedEngine, FilterPipeline};
pub use storage::{CursorStore, InteractionLog, RemoteStore, ViewedStateProvider};

/// Error type for feed operations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Malformed configuration values, bad CLI arguments |
/// | `OperationFailed` | Database queries fail, remote store requests fail |
/// | `Unavailable` | A backend's circuit breaker is open |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` reads or writes on the interaction log fail
    /// - The remote store returns an error for a shard or query
    /// - Configuration files cannot be read or parsed
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A backend is temporarily refusing calls.
    #[error("backend '{backend}' unavailable")]
    Unavailable {
        /// Backend name.
        backend: String,
    },
}

impl Error {
    /// Builds an [`Error::OperationFailed`] from an operation label and any displayable cause.
    pub fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for feed operations.
pub type Result<T> = std::result::Result<T, Error>;
