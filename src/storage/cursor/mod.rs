//! Persisted cursor slot backends.

mod memory;
mod sqlite;

pub use memory::MemoryCursorStore;
pub use sqlite::{DEFAULT_SLOT, SqliteCursorStore};
