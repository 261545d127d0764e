//! In-memory cursor slot.

use crate::Result;
use crate::storage::sqlite::acquire_lock;
use crate::storage::traits::CursorStore;
use std::sync::Mutex;

/// Cursor slot kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryCursorStore {
    value: Mutex<Option<String>>,
}

impl MemoryCursorStore {
    /// Creates an empty slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a slot pre-filled with `value`.
    #[must_use]
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: Mutex::new(Some(value.into())),
        }
    }
}

impl CursorStore for MemoryCursorStore {
    fn get(&self) -> Result<Option<String>> {
        Ok(acquire_lock(&self.value).clone())
    }

    fn set(&self, value: &str) -> Result<()> {
        *acquire_lock(&self.value) = Some(value.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *acquire_lock(&self.value) = None;
        Ok(())
    }
}
