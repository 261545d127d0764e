//! Boundary table.
//!
//! Maps the global "items loaded" counter to the set of composite sources that
//! are eligible at that point of the feed.
//!
//! | Source | Default range |
//! |--------|---------------|
//! | `local_cache` | `[0, ∞)` |
//! | `popular` | `[0, 29]` |
//! | `randomized` | `[30, ∞)` |
//! | `chronological` | `[60, ∞)` |

use crate::models::SourceId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Eligibility range of one source. `None` leaves that side unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundaryEntry {
    /// The gated source.
    pub source: SourceId,
    /// First eligible global index (inclusive).
    #[serde(default)]
    pub min_index: Option<u64>,
    /// Last eligible global index (inclusive).
    #[serde(default)]
    pub max_index: Option<u64>,
}

impl BoundaryEntry {
    /// Creates an entry.
    #[must_use]
    pub const fn new(source: SourceId, min_index: Option<u64>, max_index: Option<u64>) -> Self {
        Self {
            source,
            min_index,
            max_index,
        }
    }

    /// Returns true if the source is eligible at `index`.
    #[must_use]
    pub fn contains(&self, index: u64) -> bool {
        self.min_index.is_none_or(|min| index >= min)
            && self.max_index.is_none_or(|max| index <= max)
    }

    /// Global indexes at which eligibility of this source flips.
    fn transitions(&self) -> impl Iterator<Item = u64> {
        self.min_index
            .into_iter()
            .chain(self.max_index.map(|max| max.saturating_add(1)))
    }
}

/// Static eligibility table, fixed at startup.
///
/// Entries are kept in configuration order, which is also the multiplexer's
/// interleave order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryTable {
    entries: Vec<BoundaryEntry>,
}

impl Default for BoundaryTable {
    fn default() -> Self {
        Self {
            entries: default_entries(),
        }
    }
}

/// The default boundary entries.
#[must_use]
pub fn default_entries() -> Vec<BoundaryEntry> {
    vec![
        BoundaryEntry::new(SourceId::LocalCache, Some(0), None),
        BoundaryEntry::new(SourceId::Popular, Some(0), Some(29)),
        BoundaryEntry::new(SourceId::Randomized, Some(30), None),
        BoundaryEntry::new(SourceId::Chronological, Some(60), None),
    ]
}

impl BoundaryTable {
    /// Builds a table, rejecting inverted ranges and duplicate sources.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if an entry has `min_index > max_index`
    /// or a source appears twice.
    pub fn new(entries: Vec<BoundaryEntry>) -> Result<Self> {
        for (i, entry) in entries.iter().enumerate() {
            if let (Some(min), Some(max)) = (entry.min_index, entry.max_index) {
                if min > max {
                    return Err(Error::InvalidInput(format!(
                        "boundary for '{}' has min_index {min} > max_index {max}",
                        entry.source
                    )));
                }
            }
            if entries[..i].iter().any(|e| e.source == entry.source) {
                return Err(Error::InvalidInput(format!(
                    "duplicate boundary for '{}'",
                    entry.source
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Returns the entries in table order.
    #[must_use]
    pub fn entries(&self) -> &[BoundaryEntry] {
        &self.entries
    }

    /// Sources eligible at `global_index`, in table order.
    #[must_use]
    pub fn eligible_sources(&self, global_index: u64) -> Vec<SourceId> {
        self.entries
            .iter()
            .filter(|entry| entry.contains(global_index))
            .map(|entry| entry.source)
            .collect()
    }

    /// Shrinks `requested` so that a page starting at `global_index` stops
    /// exactly at the next eligibility change.
    ///
    /// A transition at `t` shrinks the limit when
    /// `global_index < t < global_index + requested`.
    #[must_use]
    pub fn effective_limit(&self, global_index: u64, requested: usize) -> usize {
        let end = global_index.saturating_add(u64::try_from(requested).unwrap_or(u64::MAX));
        self.entries
            .iter()
            .flat_map(BoundaryEntry::transitions)
            .filter(|&t| t > global_index && t < end)
            .min()
            .and_then(|t| usize::try_from(t - global_index).ok())
            .unwrap_or(requested)
    }
}
