//! Viewed-state provider trait.

use crate::Result;
use crate::models::ContentId;

/// Answers which content ids the user has not viewed yet.
pub trait ViewedStateProvider: Send + Sync {
    /// Returns the subset of `ids` that are unviewed, preserving input order.
    ///
    /// Implementations must answer with a single batch lookup.
    fn unviewed_ids(&self, ids: &[ContentId]) -> Result<Vec<ContentId>>;
}
