//! Interaction log backends.

mod memory;
mod sqlite;

pub use memory::MemoryInteractionLog;
pub use sqlite::{SqliteInteractionLog, seed_from_installation_id};
