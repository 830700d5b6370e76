// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Item-sized LRU cache with batched shrinking.
//!
//! Readers, writers and eviction share one lock. A large downward resize is
//! therefore applied in steps of at most `shrink_step` units, releasing the
//! lock between steps so concurrent accessors are never starved for the whole
//! shrink. Growth never evicts and is applied in a single step.
//!
//! # Example
//!
//! ```
//! use cache_allotment::cache::{DynamicCache, LruCache};
//!
//! let cache: LruCache<String, u64> = LruCache::new("LastEventNumber", 1_000)
//!     .with_shrink_step(100);
//! for i in 0..1_000u64 {
//!     cache.put(format!("stream-{i}"), i);
//! }
//!
//! cache.set_capacity(250);
//! assert_eq!(cache.size(), 250);
//! assert_eq!(cache.freed_size(), 750);
//! assert_eq!(cache.shrink_passes(), 8);
//! ```

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use super::traits::DynamicCache;

/// Default number of units a single shrink step may evict.
pub const DEFAULT_SHRINK_STEP: u64 = 100_000;

type ItemSizer<K, V> = Box<dyn Fn(&K, &V) -> u64 + Send + Sync>;

struct Inner<K, V> {
    entries: ::lru::LruCache<K, V>,
    size: u64,
    capacity: u64,
}

/// LRU cache bounded by a total item size rather than an entry count.
pub struct LruCache<K, V> {
    name: String,
    inner: Mutex<Inner<K, V>>,
    item_size: ItemSizer<K, V>,
    shrink_step: u64,

    // Mirrors of the locked values so stats never contend with writers
    size: AtomicU64,
    capacity: AtomicU64,

    freed: AtomicU64,
    shrink_passes: AtomicU64,
    largest_shrink_pass: AtomicU64,
}

impl<K: Hash + Eq, V> LruCache<K, V> {
    /// Entry-counted cache: every item has size 1.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: u64) -> Self {
        Self::with_sizer(name, capacity, |_, _| 1)
    }

    /// Cache whose items are measured by `item_size` (typically bytes).
    #[must_use]
    pub fn with_sizer(
        name: impl Into<String>,
        capacity: u64,
        item_size: impl Fn(&K, &V) -> u64 + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                entries: ::lru::LruCache::unbounded(),
                size: 0,
                capacity,
            }),
            item_size: Box::new(item_size),
            shrink_step: DEFAULT_SHRINK_STEP,
            size: AtomicU64::new(0),
            capacity: AtomicU64::new(capacity),
            freed: AtomicU64::new(0),
            shrink_passes: AtomicU64::new(0),
            largest_shrink_pass: AtomicU64::new(0),
        }
    }

    /// Bound the amount a single eviction pass may remove. Zero is treated as one.
    #[must_use]
    pub fn with_shrink_step(mut self, step: u64) -> Self {
        self.shrink_step = step.max(1);
        self
    }

    /// Approximate resident size of one item: the node's inline footprint plus
    /// whatever the key and value reference on the heap.
    #[must_use]
    pub fn approximate_item_size(key_heap_bytes: u64, value_heap_bytes: u64) -> u64 {
        let inline = std::mem::size_of::<K>() + std::mem::size_of::<V>() + 2 * std::mem::size_of::<usize>();
        inline as u64 + key_heap_bytes + value_heap_bytes
    }

    /// Insert or replace `key`, returning the replaced value.
    ///
    /// Least recently used items are evicted while the cache is over capacity,
    /// which may include the item just inserted if it alone exceeds capacity.
    pub fn put(&self, key: K, value: V) -> Option<V> {
        let added = (self.item_size)(&key, &value);
        let mut inner = self.inner.lock();
        let replaced = inner
            .entries
            .peek(&key)
            .map(|old| (self.item_size)(&key, old))
            .unwrap_or(0);
        let old = inner.entries.put(key, value);
        inner.size = inner.size.saturating_sub(replaced).saturating_add(added);
        self.evict_over_capacity(&mut inner);
        self.size.store(inner.size, Ordering::Release);
        old
    }

    /// Fetch a clone of `key`'s value, marking it most recently used.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.inner.lock().entries.get(key).cloned()
    }

    /// Whether `key` is present (does not affect recency).
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains(key)
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let value = inner.entries.pop(key)?;
        let removed = (self.item_size)(key, &value);
        inner.size = inner.size.saturating_sub(removed);
        self.size.store(inner.size, Ordering::Release);
        Some(value)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of eviction passes run by downward resizes so far.
    #[must_use]
    pub fn shrink_passes(&self) -> u64 {
        self.shrink_passes.load(Ordering::Acquire)
    }

    /// Most units a single downward-resize pass has evicted.
    ///
    /// Whole items are evicted, so a pass may exceed the shrink step by less
    /// than one item's size.
    #[must_use]
    pub fn largest_shrink_pass(&self) -> u64 {
        self.largest_shrink_pass.load(Ordering::Acquire)
    }

    /// Evict least recently used items until size fits capacity.
    /// Returns the units evicted.
    fn evict_over_capacity(&self, inner: &mut Inner<K, V>) -> u64 {
        let mut evicted = 0u64;
        while inner.size > inner.capacity {
            let Some((key, value)) = inner.entries.pop_lru() else {
                inner.size = 0;
                break;
            };
            let item = (self.item_size)(&key, &value);
            inner.size = inner.size.saturating_sub(item);
            evicted = evicted.saturating_add(item);
        }
        evicted
    }
}

impl<K, V> DynamicCache for LruCache<K, V>
where
    K: Hash + Eq + Send,
    V: Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> u64 {
        self.capacity.load(Ordering::Acquire)
    }

    fn size(&self) -> u64 {
        self.size.load(Ordering::Acquire)
    }

    fn set_capacity(&self, capacity: u64) {
        {
            let mut inner = self.inner.lock();
            if capacity >= inner.size {
                inner.capacity = capacity;
                self.capacity.store(capacity, Ordering::Release);
                return;
            }
        }

        loop {
            let mut inner = self.inner.lock();
            let next = inner.size.saturating_sub(self.shrink_step).max(capacity);
            inner.capacity = next;
            let evicted = self.evict_over_capacity(&mut inner);

            self.capacity.store(next, Ordering::Release);
            self.size.store(inner.size, Ordering::Release);
            self.freed.fetch_add(evicted, Ordering::AcqRel);
            self.shrink_passes.fetch_add(1, Ordering::AcqRel);
            self.largest_shrink_pass.fetch_max(evicted, Ordering::AcqRel);

            if next == capacity {
                break;
            }
        }
    }

    fn freed_size(&self) -> u64 {
        self.freed.load(Ordering::Acquire)
    }

    fn reset_freed_size(&self) {
        self.freed.store(0, Ordering::Release);
    }
}

impl<K, V> std::fmt::Debug for LruCache<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("name", &self.name)
            .field("size", &self.size.load(Ordering::Acquire))
            .field("capacity", &self.capacity.load(Ordering::Acquire))
            .field("shrink_step", &self.shrink_step)
            .finish()
    }
}
