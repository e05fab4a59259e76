//! Merge of per-scope fetch results into one ordered item list.
//!
//! Each fan-out worker produces a [`ScopedBatch`]. Merging decodes every
//! record, drops the ones that fail, tags survivors with the scope they came
//! from and orders the result by creation timestamp.

use itemsync_types::{Item, Record, RecordId, Scope, SyncError};
use std::cmp::Ordering;

/// Records returned by one query, with the scope they were read from.
#[derive(Debug, Clone)]
pub struct ScopedBatch {
    /// Scope the records were read from.
    pub scope: Scope,
    /// Records returned by the query.
    pub records: Vec<Record>,
}

impl ScopedBatch {
    /// Create a batch.
    pub fn new(scope: Scope, records: Vec<Record>) -> Self {
        Self { scope, records }
    }
}

/// A record that could not be turned into an item.
#[derive(Debug)]
pub struct DroppedRecord {
    /// The record's id.
    pub id: RecordId,
    /// Why it was dropped.
    pub error: SyncError,
}

/// Result of a merge.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Decoded items, ordered by timestamp.
    pub items: Vec<Item>,
    /// Records dropped during decoding.
    pub dropped: Vec<DroppedRecord>,
}

/// Decode and merge batches into a creation-ordered list.
///
/// The order is independent of batch order and of record order within a
/// batch.
pub fn merge_batches(batches: impl IntoIterator<Item = ScopedBatch>) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();

    for batch in batches {
        for record in &batch.records {
            match Item::from_record(record, batch.scope) {
                Ok(item) => outcome.items.push(item),
                Err(error) => outcome.dropped.push(DroppedRecord {
                    id: record.id.clone(),
                    error,
                }),
            }
        }
    }

    sort_items(&mut outcome.items);
    outcome
}

/// Sort items by ascending timestamp.
///
/// Ties are broken by title, then by scope, so equal timestamps still give a
/// stable order.
pub fn sort_items(items: &mut [Item]) {
    items.sort_by(compare_items);
}

pub(crate) fn compare_items(a: &Item, b: &Item) -> Ordering {
    a.timestamp()
        .total_cmp(&b.timestamp())
        .then_with(|| a.title.cmp(&b.title))
        .then_with(|| a.scope.cmp(&b.scope))
}
