//! The composite resumption cursor.

use super::SourceId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-source state of a priority source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PriorityState {
    /// The source may be fetched. `cursor` is `None` before the first fetch.
    Active {
        /// Opaque source cursor.
        cursor: Option<String>,
    },
    /// The source returned its last items; retry the same cursor later.
    Suspended {
        /// Opaque source cursor to resume from.
        cursor: String,
    },
    /// The source finished for `epoch` and is not retried until its epoch changes.
    Done {
        /// Season id or calendar day the source finished in.
        epoch: String,
    },
}

impl Default for PriorityState {
    fn default() -> Self {
        Self::Active { cursor: None }
    }
}

impl PriorityState {
    /// Returns the resumption cursor, if any.
    #[must_use]
    pub fn cursor(&self) -> Option<&str> {
        match self {
            Self::Active { cursor } => cursor.as_deref(),
            Self::Suspended { cursor } => Some(cursor),
            Self::Done { .. } => None,
        }
    }

    /// Returns true if the source is done for the given epoch.
    #[must_use]
    pub fn is_done_for(&self, current_epoch: &str) -> bool {
        matches!(self, Self::Done { epoch } if epoch == current_epoch)
    }

    /// Returns true if the source is done for any epoch.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// The single persisted resumption token for a whole feed.
///
/// A pure value: the codec round-trips all three fields exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeCursor {
    /// Raw items consumed so far. Drives boundary eligibility only; it is not
    /// an offset into any source.
    pub total_items_loaded: u64,
    /// Opaque cursor per composite sub-source.
    #[serde(default)]
    pub sub_source_cursors: BTreeMap<SourceId, String>,
    /// State per priority source.
    #[serde(default)]
    pub priority_source_cursors: BTreeMap<SourceId, PriorityState>,
}

impl CompositeCursor {
    /// Creates an empty cursor for a first-ever load.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the stored cursor of a composite sub-source.
    #[must_use]
    pub fn sub_cursor(&self, source: SourceId) -> Option<&str> {
        self.sub_source_cursors.get(&source).map(String::as_str)
    }

    /// Stores a sub-source cursor. A `None` cursor keeps the previous one.
    pub fn merge_sub_cursor(&mut self, source: SourceId, cursor: Option<String>) {
        if let Some(cursor) = cursor {
            self.sub_source_cursors.insert(source, cursor);
        }
    }

    /// Returns the state of a priority source (defaults to active with no cursor).
    #[must_use]
    pub fn priority_state(&self, source: SourceId) -> PriorityState {
        self.priority_source_cursors
            .get(&source)
            .cloned()
            .unwrap_or_default()
    }

    /// Replaces the state of a priority source.
    pub fn set_priority_state(&mut self, source: SourceId, state: PriorityState) {
        self.priority_source_cursors.insert(source, state);
    }

    /// Advances the global consumption counter.
    pub fn advance(&mut self, raw_items: usize) {
        self.total_items_loaded = self
            .total_items_loaded
            .saturating_add(u64::try_from(raw_items).unwrap_or(u64::MAX));
    }
}
