//! In-memory featured-of-the-day state.

use crate::storage::sqlite::acquire_lock;
use crate::storage::traits::FeaturedState;
use chrono::NaiveDate;
use std::sync::Mutex;

/// Featured state kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryFeaturedState {
    last_shown: Mutex<Option<NaiveDate>>,
}

impl MemoryFeaturedState {
    /// Creates a state where the featured item was never shown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeaturedState for MemoryFeaturedState {
    fn last_shown_on(&self) -> Option<NaiveDate> {
        *acquire_lock(&self.last_shown)
    }

    fn mark_shown(&self, day: NaiveDate) {
        *acquire_lock(&self.last_shown) = Some(day);
    }
}
