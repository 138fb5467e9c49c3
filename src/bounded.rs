//! Bounded, age-ordered collection with drop-oldest eviction.
//!
//! Shared by the approval registry (capacity eviction of the oldest pending
//! request) and the batch queue (stale-message discard and overflow). Entries
//! keep insertion order; age is measured against the instant supplied at
//! insert time, so callers stay on whichever clock their scheduler provides.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::{Duration, Instant};

struct Slot<V> {
    value: V,
    inserted_at: Instant,
    seq: u64,
}

/// Insertion-ordered map bounded by `capacity`.
///
/// `insert` into a full map evicts and returns the oldest entry, so `len()`
/// never exceeds `capacity`.
pub struct AgedMap<K, V> {
    entries: HashMap<K, Slot<V>>,
    order: BTreeMap<u64, K>,
    next_seq: u64,
    capacity: usize,
}

impl<K, V> AgedMap<K, V>
where
    K: Eq + Hash + Clone,
{
    /// `capacity` is clamped to at least 1.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Insert `value` as the newest entry.
    ///
    /// Re-inserting an existing key replaces it and moves it to the back.
    /// Returns the entry evicted to stay within capacity, if any.
    pub fn insert(&mut self, key: K, value: V, at: Instant) -> Option<(K, V)> {
        self.remove(&key);
        let evicted = if self.is_full() {
            self.pop_oldest()
        } else {
            None
        };

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(
            key,
            Slot {
                value,
                inserted_at: at,
                seq,
            },
        );
        evicted
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key).map(|slot| &slot.value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.entries.get_mut(key).map(|slot| &mut slot.value)
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let slot = self.entries.remove(key)?;
        self.order.remove(&slot.seq);
        Some(slot.value)
    }

    /// The oldest entry and its insertion instant.
    pub fn oldest(&self) -> Option<(&K, &V, Instant)> {
        let key = self.order.values().next()?;
        let slot = self.entries.get(key)?;
        Some((key, &slot.value, slot.inserted_at))
    }

    pub fn pop_oldest(&mut self) -> Option<(K, V)> {
        let (_, key) = self.order.pop_first()?;
        let slot = self.entries.remove(&key)?;
        Some((key, slot.value))
    }

    /// Remove every entry whose age at `now` is at least `max_age`,
    /// oldest first.
    pub fn drain_aged(&mut self, now: Instant, max_age: Duration) -> Vec<(K, V)> {
        let mut aged = Vec::new();
        loop {
            let expired = match self.oldest() {
                Some((_, _, inserted_at)) => now.saturating_duration_since(inserted_at) >= max_age,
                None => false,
            };
            if !expired {
                break;
            }
            match self.pop_oldest() {
                Some(entry) => aged.push(entry),
                None => break,
            }
        }
        aged
    }

    /// Remove every entry, oldest first.
    pub fn drain_ordered(&mut self) -> Vec<(K, V)> {
        let mut drained = Vec::with_capacity(self.entries.len());
        while let Some(entry) = self.pop_oldest() {
            drained.push(entry);
        }
        drained
    }

    /// Iterate oldest first.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> + '_ {
        self.order
            .values()
            .filter_map(move |key| self.entries.get(key).map(|slot| (key, &slot.value)))
    }
}
