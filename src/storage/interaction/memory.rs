//! In-memory interaction log.

use crate::Result;
use crate::models::{ContentId, Interaction, InteractionKind, NewInteraction};
use crate::storage::sqlite::acquire_lock;
use crate::storage::traits::{InteractionLog, ViewedStateProvider};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    rows: BTreeMap<i64, Interaction>,
    index_of: HashMap<ContentId, i64>,
    next_index: i64,
}

/// Interaction log kept in process memory.
///
/// Same contract as the `SQLite` log; used by tests and by hosts that keep
/// their own persistence.
#[derive(Default)]
pub struct MemoryInteractionLog {
    inner: Mutex<Inner>,
}

impl MemoryInteractionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl InteractionLog for MemoryInteractionLog {
    fn get_page(&self, after_index: Option<i64>, limit: usize) -> Result<Vec<Interaction>> {
        let inner = acquire_lock(&self.inner);
        let rows = match after_index {
            Some(after) => inner
                .rows
                .range(after.saturating_add(1)..)
                .take(limit)
                .map(|(_, row)| row.clone())
                .collect(),
            None => inner.rows.values().take(limit).cloned().collect(),
        };
        Ok(rows)
    }

    fn count(&self) -> Result<usize> {
        Ok(acquire_lock(&self.inner).rows.len())
    }

    fn last_index(&self) -> Result<Option<i64>> {
        Ok(acquire_lock(&self.inner).rows.keys().next_back().copied())
    }

    fn get_by_ids(&self, ids: &[ContentId]) -> Result<Vec<Interaction>> {
        let inner = acquire_lock(&self.inner);
        Ok(ids
            .iter()
            .filter_map(|id| inner.index_of.get(id))
            .filter_map(|index| inner.rows.get(index))
            .cloned()
            .collect())
    }

    fn append(&self, row: NewInteraction) -> Result<Interaction> {
        let mut inner = acquire_lock(&self.inner);
        if let Some(existing) = inner
            .index_of
            .get(&row.content.id)
            .and_then(|index| inner.rows.get(index))
        {
            return Ok(existing.clone());
        }

        inner.next_index += 1;
        let feed_index = inner.next_index;
        let interaction = Interaction {
            content_id: row.content.id.clone(),
            feed_index,
            content: row.content,
            viewed_at: row.viewed_at,
            saved_at: row.saved_at,
            shared_at: row.shared_at,
        };
        inner
            .index_of
            .insert(interaction.content_id.clone(), feed_index);
        inner.rows.insert(feed_index, interaction.clone());
        Ok(interaction)
    }

    fn record(&self, id: &ContentId, kind: InteractionKind, at: DateTime<Utc>) -> Result<bool> {
        let mut inner = acquire_lock(&self.inner);
        let Some(index) = inner.index_of.get(id).copied() else {
            return Ok(false);
        };
        let Some(row) = inner.rows.get_mut(&index) else {
            return Ok(false);
        };
        match kind {
            InteractionKind::Viewed => row.viewed_at = Some(at),
            InteractionKind::Saved => row.saved_at = Some(at),
            InteractionKind::Shared => row.shared_at = Some(at),
        }
        Ok(true)
    }
}

impl ViewedStateProvider for MemoryInteractionLog {
    fn unviewed_ids(&self, ids: &[ContentId]) -> Result<Vec<ContentId>> {
        let inner = acquire_lock(&self.inner);
        Ok(ids
            .iter()
            .filter(|id| {
                inner
                    .index_of
                    .get(*id)
                    .and_then(|index| inner.rows.get(index))
                    .is_none_or(|row| row.viewed_at.is_none())
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentItem;

    #[test]
    fn test_paging_matches_append_order() {
        let log = MemoryInteractionLog::new();
        for id in ["a", "b", "c"] {
            log.append(NewInteraction::surfaced(ContentItem::new(id, id)))
                .unwrap();
        }
        let first = log.get_page(None, 2).unwrap();
        assert_eq!(first.len(), 2);
        let rest = log.get_page(Some(first[1].feed_index), 2).unwrap();
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].content_id.as_str(), "c");
        assert_eq!(log.last_index().unwrap(), Some(rest[0].feed_index));
    }

    #[test]
    fn test_append_is_idempotent_per_id() {
        let log = MemoryInteractionLog::new();
        let a = log
            .append(NewInteraction::surfaced(ContentItem::new("a", "a")))
            .unwrap();
        let again = log
            .append(NewInteraction::surfaced(ContentItem::new("a", "changed")))
            .unwrap();
        assert_eq!(a, again);
        assert_eq!(log.count().unwrap(), 1);
    }

    #[test]
    fn test_unviewed_after_record() {
        let log = MemoryInteractionLog::new();
        log.append(NewInteraction::surfaced(ContentItem::new("a", "a")))
            .unwrap();
        let id = ContentId::new("a");
        assert_eq!(log.unviewed_ids(&[id.clone()]).unwrap(), vec![id.clone()]);

        log.record(&id, InteractionKind::Viewed, Utc::now()).unwrap();
        assert!(log.unviewed_ids(&[id]).unwrap().is_empty());
    }
}
