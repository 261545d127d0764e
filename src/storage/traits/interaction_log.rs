//! Interaction log trait.

use crate::Result;
use crate::models::{ContentId, Interaction, InteractionKind, NewInteraction};
use chrono::{DateTime, Utc};

/// The on-device, append-only interaction log.
///
/// Rows are ordered by `feed_index`, assigned on append and never rewritten.
/// Only the viewed/saved/shared timestamps of an existing row may change.
pub trait InteractionLog: Send + Sync {
    /// Returns up to `limit` rows with `feed_index` strictly greater than
    /// `after_index`, in feed order. `None` starts at the beginning.
    fn get_page(&self, after_index: Option<i64>, limit: usize) -> Result<Vec<Interaction>>;

    /// Returns the total number of rows.
    fn count(&self) -> Result<usize>;

    /// Returns the highest assigned feed index, or `None` for an empty log.
    fn last_index(&self) -> Result<Option<i64>>;

    /// Returns the rows for the given content ids (missing ids are skipped),
    /// in the order the ids were given.
    fn get_by_ids(&self, ids: &[ContentId]) -> Result<Vec<Interaction>>;

    /// Appends a row at the next feed position.
    ///
    /// If the content id already has a row, that row is returned unchanged.
    fn append(&self, row: NewInteraction) -> Result<Interaction>;

    /// Sets one interaction timestamp on an existing row.
    ///
    /// Returns `false` if the content id has no row.
    fn record(&self, id: &ContentId, kind: InteractionKind, at: DateTime<Utc>) -> Result<bool>;

    /// Returns true if the log holds no rows.
    fn is_empty(&self) -> Result<bool> {
        Ok(self.count()? == 0)
    }
}
