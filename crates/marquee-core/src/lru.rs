//! Bounded least-recently-used map shared by the result and transport caches.
//!
//! Not synchronized; callers wrap it in their own lock.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

#[derive(Debug)]
struct Slot<V> {
    value: V,
    tick: u64,
}

#[derive(Debug)]
pub(crate) struct LruMap<K, V> {
    capacity: usize,
    entries: HashMap<K, Slot<V>>,
    // tick -> key, oldest first
    recency: BTreeMap<u64, K>,
    tick: u64,
}

impl<K, V> LruMap<K, V>
where
    K: Hash + Eq + Clone,
{
    /// `capacity` is validated by the owning cache and is always non-zero.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity.min(1024)),
            recency: BTreeMap::new(),
            tick: 0,
        }
    }

    /// Looks up `key` and marks it most recently used.
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.next_tick();
        let slot = self.entries.get_mut(key)?;
        self.recency.remove(&slot.tick);
        slot.tick = tick;
        self.recency.insert(tick, key.clone());
        Some(&slot.value)
    }

    /// Inserts or replaces `key`, returning the entry evicted to stay within capacity.
    pub(crate) fn insert(&mut self, key: K, value: V) -> Option<(K, V)> {
        let tick = self.next_tick();
        if let Some(slot) = self.entries.get_mut(&key) {
            self.recency.remove(&slot.tick);
            slot.tick = tick;
            slot.value = value;
            self.recency.insert(tick, key);
            return None;
        }

        self.recency.insert(tick, key.clone());
        self.entries.insert(key, Slot { value, tick });

        if self.entries.len() > self.capacity {
            self.pop_oldest()
        } else {
            None
        }
    }

    pub(crate) fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.recency.remove(&slot.tick);
        Some(slot.value)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }

    fn pop_oldest(&mut self) -> Option<(K, V)> {
        let (_, key) = self.recency.pop_first()?;
        let slot = self.entries.remove(&key)?;
        Some((key, slot.value))
    }

    fn next_tick(&mut self) -> u64 {
        self.tick = self.tick.wrapping_add(1);
        self.tick
    }
}
