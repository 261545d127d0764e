//! Persisted cursor slot trait.

use crate::Result;

/// A single string slot holding the encoded feed cursor across restarts.
pub trait CursorStore: Send + Sync {
    /// Reads the slot.
    fn get(&self) -> Result<Option<String>>;

    /// Overwrites the slot.
    fn set(&self, value: &str) -> Result<()>;

    /// Empties the slot.
    fn clear(&self) -> Result<()>;
}
