//! Validity-bounded cache slots.

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// A cached value and the instant up to which it may be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry<V> {
    value: V,
    valid_until: Option<DateTime<Utc>>,
}

impl<V> CacheEntry<V> {
    /// Creates an entry valid up to and including `valid_until`, or forever
    /// if `None`.
    #[must_use]
    pub const fn new(value: V, valid_until: Option<DateTime<Utc>>) -> Self {
        Self { value, valid_until }
    }

    /// Creates an entry that never expires on its own.
    #[must_use]
    pub const fn never_expiring(value: V) -> Self {
        Self::new(value, None)
    }

    /// Returns the cached value.
    #[must_use]
    pub const fn value(&self) -> &V {
        &self.value
    }

    /// Returns the validity bound.
    #[must_use]
    pub const fn valid_until(&self) -> Option<DateTime<Utc>> {
        self.valid_until
    }

    /// Returns whether the entry may be used at `now`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_until.map_or(true, |until| now <= until)
    }

    /// Consumes the entry and returns its value.
    pub fn into_value(self) -> V {
        self.value
    }
}

/// Concurrent cache with one replaceable slot per key.
///
/// Slots are swapped as a whole, never mutated in place, so a reader always
/// sees a consistent `(value, valid_until)` pair. Concurrent recomputations
/// of the same key race benignly: the last writer wins.
///
/// Invalidation bumps a generation counter. A value computed by
/// [`ValidityCache::get_or_try_insert_with`] is returned to its caller but
/// not stored if any invalidation happened while it was being computed, so
/// no read after an invalidation can observe material derived from the
/// state before it.
pub struct ValidityCache<K, V> {
    slots: DashMap<K, Arc<CacheEntry<V>>>,
    generation: AtomicU64,
}

impl<K, V> ValidityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            generation: AtomicU64::new(0),
        }
    }

    /// Returns the slot for `key` if it is valid at `now`.
    pub fn get<Q>(&self, key: &Q, now: DateTime<Utc>) -> Option<Arc<CacheEntry<V>>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let slot = self.slots.get(key).map(|s| Arc::clone(s.value()))?;
        slot.is_valid_at(now).then_some(slot)
    }

    /// Returns a clone of the value for `key` if it is valid at `now`.
    pub fn get_valid<Q>(&self, key: &Q, now: DateTime<Utc>) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.get(key, now).map(|slot| slot.value().clone())
    }

    /// Stores `entry` for `key`, replacing any existing slot.
    pub fn insert(&self, key: K, entry: CacheEntry<V>) {
        self.slots.insert(key, Arc::new(entry));
    }

    /// Returns the valid value for `key`, computing and storing it on a miss.
    ///
    /// `compute` runs without any internal lock held, so it may perform
    /// slow lookups or even invalidate entries of this cache.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `compute`; nothing is stored then.
    pub fn get_or_try_insert_with<E, F>(&self, key: &K, now: DateTime<Utc>, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<CacheEntry<V>, E>,
    {
        if let Some(value) = self.get_valid(key, now) {
            return Ok(value);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        tracing::debug!(?key, "cache miss, recomputing");
        let entry = compute()?;
        let value = entry.value().clone();

        // Checked under the shard lock: an invalidation bumps the generation
        // before it removes, so it either sees this slot or makes us skip it.
        match self.slots.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if self.generation.load(Ordering::SeqCst) == generation {
                    occupied.insert(Arc::new(entry));
                }
            }
            Entry::Vacant(vacant) => {
                if self.generation.load(Ordering::SeqCst) == generation {
                    vacant.insert(Arc::new(entry));
                } else {
                    tracing::debug!(?key, "invalidated during recomputation, not caching");
                }
            }
        }

        Ok(value)
    }

    /// Removes the slot for `key` unconditionally.
    ///
    /// Returns whether a slot was present.
    pub fn invalidate<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + fmt::Debug + ?Sized,
    {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let removed = self.slots.remove(key).is_some();
        tracing::debug!(?key, removed, "cache slot invalidated");
        removed
    }

    /// Removes every slot.
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.slots.clear();
    }

    /// Drops slots that are no longer valid at `now`.
    pub fn purge_expired(&self, now: DateTime<Utc>) {
        self.slots.retain(|_, slot| slot.is_valid_at(now));
    }

    /// Returns the number of slots, valid or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns whether the cache holds no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl<K, V> Default for ValidityCache<K, V>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for ValidityCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidityCache")
            .field("slots", &self.slots.len())
            .field("generation", &self.generation.load(Ordering::Relaxed))
            .finish()
    }
}
