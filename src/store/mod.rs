//! # Local Object Store
//!
//! A small observable key/value container. The composition engine mirrors
//! the shapes of the main canvas into a [`LocalMap`] so that other parts of
//! an application (layer lists, inspectors) can react to additions and
//! removals without holding a reference to the scene graph.
//!
//! ```
//! use kvgen::store::LocalMap;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! let mut map: LocalMap<String, u32> = LocalMap::new();
//! let hits = Arc::new(AtomicUsize::new(0));
//! let seen = hits.clone();
//! map.subscribe(move |_| { seen.fetch_add(1, Ordering::SeqCst); });
//!
//! map.set("a".to_string(), 1);
//! map.delete(&"missing".to_string());
//! assert_eq!(hits.load(Ordering::SeqCst), 1);
//! ```

mod listeners;

pub use listeners::{Listeners, SubscriptionId};

use std::collections::HashMap;
use std::hash::Hash;

/// Change notification published by a [`LocalMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MapChange<K> {
    /// A key was inserted or overwritten.
    Set(K),
    /// A key was removed.
    Deleted(K),
    /// Every key was removed.
    Cleared,
}

/// Observable map standing in for a collaborative shared map.
///
/// Iteration order follows insertion order so layer lists stay stable.
pub struct LocalMap<K, V> {
    entries: HashMap<K, V>,
    order: Vec<K>,
    listeners: Listeners<MapChange<K>>,
}

impl<K, V> Default for LocalMap<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> LocalMap<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            listeners: Listeners::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    /// Insert or overwrite `key`, notifying subscribers.
    pub fn set(&mut self, key: K, value: V) -> &mut Self {
        if self.entries.insert(key.clone(), value).is_none() {
            self.order.push(key.clone());
        }
        self.listeners.emit(&MapChange::Set(key));
        self
    }

    /// Remove `key`. Subscribers are only notified when something was removed.
    pub fn delete(&mut self, key: &K) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.order.retain(|k| k != key);
            self.listeners.emit(&MapChange::Deleted(key.clone()));
        }
        removed
    }

    pub fn has(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.listeners.emit(&MapChange::Cleared);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.order.iter().filter_map(|k| self.entries.get(k))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order
            .iter()
            .filter_map(|k| self.entries.get(k).map(|v| (k, v)))
    }

    /// Register a change listener. Returns a handle for [`LocalMap::unsubscribe`].
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&MapChange<K>) + Send + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }
}
