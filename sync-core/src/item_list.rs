//! Local item list published to the presentation layer.
//!
//! Mirrors the last known remote state and applies local mutations in
//! place, so observers do not need a full refetch after every change.

use itemsync_types::Item;

use crate::merge::{compare_items, sort_items};

/// Creation-ordered list of items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemList {
    items: Vec<Item>,
}

impl ItemList {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole list (after a fetch).
    pub fn replace_all(&mut self, mut items: Vec<Item>) {
        sort_items(&mut items);
        self.items = items;
    }

    /// Insert an item, keeping timestamp order.
    pub fn insert(&mut self, item: Item) {
        let at = self
            .items
            .partition_point(|existing| compare_items(existing, &item).is_le());
        self.items.insert(at, item);
    }

    /// Replace the entry for `item`.
    ///
    /// Returns false when no entry matches.
    pub fn update(&mut self, item: Item) -> bool {
        match self.position(&item) {
            Some(index) => {
                self.items[index] = item;
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `item`.
    pub fn remove(&mut self, item: &Item) -> Option<Item> {
        let index = self.position(item)?;
        Some(self.items.remove(index))
    }

    /// Index of the entry for `item`: by remote id when it has one,
    /// otherwise by timestamp.
    pub fn position(&self, item: &Item) -> Option<usize> {
        match &item.remote_id {
            Some(id) => self
                .items
                .iter()
                .position(|existing| existing.remote_id.as_ref() == Some(id)),
            None => self
                .items
                .iter()
                .position(|existing| existing.timestamp() == item.timestamp()),
        }
    }

    /// Items in order.
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
