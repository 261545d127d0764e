//! Remote store backends.

mod memory;

pub use memory::{DEFAULT_SHARD_SIZE, MemoryRemoteHistory, MemoryRemoteStore};
