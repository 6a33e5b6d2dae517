// src/store/history.rs
use std::sync::{PoisonError, RwLock};

use crate::domain::models::StateChange;
use crate::store::Listeners;

/// Append-only log that announces every new entry as a `Create` change.
///
/// Subscribers run on the appending thread after the entry is stored, so a
/// callback may read the log but must not append to it.
pub struct ObservableLog<T> {
    items: RwLock<Vec<T>>,
    item_stream: Listeners<StateChange<T>>,
}

impl<T: Clone> ObservableLog<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
            item_stream: Listeners::new(),
        }
    }

    pub fn item_stream(&self) -> &Listeners<StateChange<T>> {
        &self.item_stream
    }

    pub fn push(&self, item: T) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(item.clone());
        self.item_stream.emit(&StateChange::create(item));
    }

    /// Entries oldest first
    pub fn to_vec(&self) -> Vec<T> {
        self.items.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Swap in a whole history, e.g. from a saved session. Fires nothing.
    pub fn replace(&self, items: Vec<T>) {
        *self.items.write().unwrap_or_else(PoisonError::into_inner) = items;
    }
}

impl<T: Clone> Default for ObservableLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ObservableLog<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let len = self.items.read().unwrap_or_else(PoisonError::into_inner).len();
        f.debug_struct("ObservableLog").field("len", &len).finish()
    }
}
