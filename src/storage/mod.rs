//! Storage layer.
//!
//! The engine talks to four external collaborators, each behind a trait in
//! [`traits`]:
//! - **Interaction log**: append-only on-device record of surfaced content
//!   (`SQLite`, in-memory)
//! - **Remote store**: sharded and ordered content pages (in-memory, plus a
//!   circuit-breaking wrapper for real transports)
//! - **Cursor store**: the single persisted resumption slot (`SQLite`, in-memory)
//! - **Viewed state**: batch unviewed lookup (served by the interaction log)

// Allow significant_drop_tightening - guards are held for one statement at most.
#![allow(clippy::significant_drop_tightening)]

pub mod cursor;
pub mod featured;
pub mod interaction;
pub mod remote;
pub mod resilience;
pub mod sqlite;
pub mod traits;

pub use cursor::{MemoryCursorStore, SqliteCursorStore};
pub use featured::MemoryFeaturedState;
pub use interaction::{MemoryInteractionLog, SqliteInteractionLog, seed_from_installation_id};
pub use remote::{MemoryRemoteHistory, MemoryRemoteStore};
pub use resilience::{CircuitBreaker, RemoteResilienceConfig, ResilientRemoteStore};
pub use traits::{
    CursorStore, FeaturedState, HistoryPage, InteractionLog, RemoteHistory, RemoteStore,
    ViewedStateProvider,
};
