// src/store/mod.rs
// Reactive keyed store backing the account graph

pub mod history;
pub mod listeners;

pub use history::ObservableLog;
pub use listeners::{Listeners, Subscription};

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;

use crate::domain::models::{Action, StateChange};

/// Collection-level change message: the action plus a handle to the live
/// collection it happened on.
#[derive(Debug, Clone)]
pub struct CollectionChange<K: Eq + Hash, V> {
    pub action: Action,
    pub items: Arc<DashMap<K, V>>,
}

/// Concurrent map that announces every mutation.
///
/// Each mutation fires the item stream first and then the collection stream,
/// synchronously on the mutating thread. Subscribers must not block, and must
/// not mutate the same map from inside a callback.
pub struct ObservableMap<K: Eq + Hash, V> {
    items: Arc<DashMap<K, V>>,
    item_stream: Listeners<StateChange<V>>,
    items_stream: Listeners<CollectionChange<K, V>>,
}

impl<K, V> ObservableMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            items: Arc::new(DashMap::new()),
            item_stream: Listeners::new(),
            items_stream: Listeners::new(),
        }
    }

    /// Per-key change notifications
    pub fn item_stream(&self) -> &Listeners<StateChange<V>> {
        &self.item_stream
    }

    /// Whole-collection change notifications
    pub fn items_stream(&self) -> &Listeners<CollectionChange<K, V>> {
        &self.items_stream
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.items.get(key).map(|entry| entry.value().clone())
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn keys(&self) -> Vec<K> {
        self.items.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn values(&self) -> Vec<V> {
        self.items.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Point-in-time copy of all entries, in no particular order
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.items
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Insert or overwrite. Fires `Create` for a new key, `Update` otherwise.
    pub fn set(&self, key: K, value: V) {
        let previous = self.items.insert(key, value.clone());
        let action = match previous {
            Some(_) => Action::Update,
            None => Action::Create,
        };

        self.send_item_message(Some(value), previous, action);
        self.send_items_message(action);
    }

    /// Atomically replace the value under `key` with whatever `f` returns.
    ///
    /// `f` runs while the key's shard is locked; returning `None` leaves the
    /// entry untouched and fires nothing. Returns true if the value changed.
    pub fn update<F>(&self, key: &K, f: F) -> bool
    where
        F: FnOnce(&V) -> Option<V>,
    {
        let change = match self.items.get_mut(key) {
            Some(mut entry) => match f(entry.value()) {
                Some(next) => {
                    let previous = std::mem::replace(entry.value_mut(), next.clone());
                    Some((previous, next))
                }
                None => None,
            },
            None => None,
        };

        match change {
            Some((previous, next)) => {
                self.send_item_message(Some(next), Some(previous), Action::Update);
                self.send_items_message(Action::Update);
                true
            }
            None => false,
        }
    }

    /// Delete a key. Absent keys are a silent no-op returning false.
    pub fn remove(&self, key: &K) -> bool {
        match self.items.remove(key) {
            Some((_, previous)) => {
                self.send_item_message(None, Some(previous), Action::Delete);
                self.send_items_message(Action::Delete);
                true
            }
            None => false,
        }
    }

    /// Delete a key and hand back the removed value
    pub fn take(&self, key: &K) -> Option<V> {
        let (_, previous) = self.items.remove(key)?;
        self.send_item_message(None, Some(previous.clone()), Action::Delete);
        self.send_items_message(Action::Delete);
        Some(previous)
    }

    /// Drop every entry. Fires a single item event and a single collection
    /// event rather than one per removed key.
    pub fn clear(&self) {
        self.items.clear();
        self.send_item_message(None, None, Action::Delete);
        self.send_items_message(Action::Delete);
    }

    fn send_item_message(&self, next: Option<V>, previous: Option<V>, action: Action) {
        self.item_stream.emit(&StateChange {
            action,
            previous,
            next,
        });
    }

    fn send_items_message(&self, action: Action) {
        self.items_stream.emit(&CollectionChange {
            action,
            items: self.items.clone(),
        });
    }
}

impl<K, V> Default for ObservableMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for ObservableMap<K, V>
where
    K: Eq + Hash + std::fmt::Debug,
    V: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableMap")
            .field("items", &self.items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorded(map: &ObservableMap<String, i32>) -> Log {
        let log: Log = Arc::new(Mutex::new(Vec::new()));

        let items = log.clone();
        map.item_stream().subscribe(move |change| {
            items.lock().unwrap().push(format!(
                "item {:?} {:?} -> {:?}",
                change.action, change.previous, change.next
            ));
        });

        let collection = log.clone();
        map.items_stream().subscribe(move |change| {
            collection
                .lock()
                .unwrap()
                .push(format!("items {:?} len={}", change.action, change.items.len()));
        });

        log
    }

    #[test]
    fn set_on_new_key_creates_then_updates() {
        let map = ObservableMap::new();
        let log = recorded(&map);

        map.set("a".to_string(), 1);
        map.set("a".to_string(), 2);

        assert_eq!(map.get(&"a".to_string()), Some(2));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "item Create None -> Some(1)",
                "items Create len=1",
                "item Update Some(1) -> Some(2)",
                "items Update len=1",
            ]
        );
    }

    #[test]
    fn remove_absent_key_is_silent() {
        let map = ObservableMap::new();
        let log = recorded(&map);

        assert!(!map.remove(&"missing".to_string()));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn remove_present_key_reports_previous_value() {
        let map = ObservableMap::new();
        map.set("a".to_string(), 5);
        let log = recorded(&map);

        assert!(map.remove(&"a".to_string()));
        assert!(map.is_empty());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["item Delete Some(5) -> None", "items Delete len=0"]
        );
    }

    #[test]
    fn clear_fires_one_event_per_stream() {
        let map = ObservableMap::new();
        for (i, key) in ["a", "b", "c"].iter().enumerate() {
            map.set(key.to_string(), i as i32);
        }
        let log = recorded(&map);

        map.clear();

        assert_eq!(
            *log.lock().unwrap(),
            vec!["item Delete None -> None", "items Delete len=0"]
        );
    }

    #[test]
    fn update_only_fires_when_value_changes() {
        let map = ObservableMap::new();
        map.set("a".to_string(), 1);
        let log = recorded(&map);

        assert!(!map.update(&"a".to_string(), |_| None));
        assert!(!map.update(&"missing".to_string(), |v| Some(v + 1)));
        assert!(map.update(&"a".to_string(), |v| Some(v + 10)));

        assert_eq!(map.get(&"a".to_string()), Some(11));
        assert_eq!(
            *log.lock().unwrap(),
            vec!["item Update Some(1) -> Some(11)", "items Update len=1"]
        );
    }

    #[test]
    fn take_returns_removed_value() {
        let map = ObservableMap::new();
        map.set("a".to_string(), 3);

        assert_eq!(map.take(&"a".to_string()), Some(3));
        assert_eq!(map.take(&"a".to_string()), None);
    }

    #[test]
    fn concurrent_writers_do_not_lose_keys() {
        let map = Arc::new(ObservableMap::<String, usize>::new());
        let creates = Arc::new(Mutex::new(0usize));

        let counter = creates.clone();
        map.item_stream().subscribe(move |change| {
            if change.action == Action::Create {
                *counter.lock().unwrap() += 1;
            }
        });

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let map = map.clone();
                std::thread::spawn(move || {
                    for i in 0..250 {
                        map.set(format!("{}-{}", t, i), i);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.len(), 1000);
        assert_eq!(*creates.lock().unwrap(), 1000);
    }
}
