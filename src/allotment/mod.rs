// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Capacity-allocation tree.
//!
//! An [`Allotment`] is one node of the tree that divides a shared budget
//! across caches:
//!
//! - **Static**: fixed capacity, weight 0, reserves exactly its capacity.
//! - **Dynamic**: `clamp(pool * weight / total_weight, min, max)`, reserves nothing.
//! - **Composite**: named children sharing one [`Unit`]; reserves the sum of
//!   its children's reservations and republishes their combined size.
//!
//! Reservations propagate upward: each parent excludes its children's
//! reservations from the pool it splits by weight, and each composite adds
//! its own reservation back before taking its proportional share.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use cache_allotment::{Allotment, Unit};
//! use cache_allotment::cache::{DynamicCache, EmptyDynamicCache};
//!
//! let a = Arc::new(EmptyDynamicCache::new("A"));
//! let b = Arc::new(EmptyDynamicCache::new("B"));
//! let c = Arc::new(EmptyDynamicCache::new("C"));
//!
//! let mut tree = Allotment::composite("cache", 100, vec![
//!     Allotment::fixed("A", Unit::Bytes, 100, a.clone()),
//!     Allotment::dynamic("B", Unit::Bytes, 1, 0, b.clone()).unwrap(),
//!     Allotment::dynamic("C", Unit::Bytes, 1, 0, c.clone()).unwrap(),
//! ]).unwrap();
//!
//! tree.calc_capacity(200, 100);
//! assert_eq!((a.capacity(), b.capacity(), c.capacity()), (100, 100, 100));
//! ```

mod composite;
mod leaf;
pub mod stats;

pub use composite::CompositeAllotment;
pub use leaf::{DynamicAllotment, StaticAllotment};
pub use stats::{CacheStats, KEY_SEPARATOR};

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::DynamicCache;
use crate::error::AllotmentError;

/// Unit in which a node's capacity and size are measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Bytes,
    Entries,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes => write!(f, "bytes"),
            Self::Entries => write!(f, "entries"),
        }
    }
}

/// `value * numerator / denominator` without overflow. Zero when `denominator` is zero.
#[must_use]
pub fn scale(value: u64, numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let scaled = u128::from(value) * u128::from(numerator) / u128::from(denominator);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// A node of the capacity-allocation tree.
#[derive(Debug)]
pub enum Allotment {
    Static(StaticAllotment),
    Dynamic(DynamicAllotment),
    Composite(CompositeAllotment),
}

impl Allotment {
    /// Static node holding `cache` at exactly `capacity`.
    #[must_use]
    pub fn fixed(
        name: impl Into<String>,
        unit: Unit,
        capacity: u64,
        cache: Arc<dyn DynamicCache>,
    ) -> Self {
        Self::Static(StaticAllotment::new(name, unit, capacity, cache))
    }

    /// Dynamic node with a floor and no ceiling.
    pub fn dynamic(
        name: impl Into<String>,
        unit: Unit,
        weight: u64,
        min_capacity: u64,
        cache: Arc<dyn DynamicCache>,
    ) -> Result<Self, AllotmentError> {
        Self::dynamic_bounded(name, unit, weight, min_capacity, u64::MAX, cache)
    }

    /// Dynamic node clamped to `[min_capacity, max_capacity]`.
    pub fn dynamic_bounded(
        name: impl Into<String>,
        unit: Unit,
        weight: u64,
        min_capacity: u64,
        max_capacity: u64,
        cache: Arc<dyn DynamicCache>,
    ) -> Result<Self, AllotmentError> {
        DynamicAllotment::new(name, unit, weight, min_capacity, max_capacity, cache).map(Self::Dynamic)
    }

    /// Composite node over `children`, which must share one unit.
    pub fn composite(
        name: impl Into<String>,
        weight: u64,
        children: Vec<Allotment>,
    ) -> Result<Self, AllotmentError> {
        CompositeAllotment::new(name, weight, children).map(Self::Composite)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Static(node) => node.name(),
            Self::Dynamic(node) => node.name(),
            Self::Composite(node) => node.name(),
        }
    }

    #[must_use]
    pub fn unit(&self) -> Unit {
        match self {
            Self::Static(node) => node.unit(),
            Self::Dynamic(node) => node.unit(),
            Self::Composite(node) => node.unit(),
        }
    }

    /// Weight against siblings. Zero for static nodes.
    #[must_use]
    pub fn weight(&self) -> u64 {
        match self {
            Self::Static(_) => 0,
            Self::Dynamic(node) => node.weight(),
            Self::Composite(node) => node.weight(),
        }
    }

    /// Capacity guaranteed to this node before its siblings are weighted.
    #[must_use]
    pub fn reserved_capacity(&self) -> u64 {
        match self {
            Self::Static(node) => node.fixed_capacity(),
            Self::Dynamic(_) => 0,
            Self::Composite(node) => node.reserved_capacity(),
        }
    }

    /// Currently assigned capacity.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        match self {
            Self::Static(node) => node.capacity(),
            Self::Dynamic(node) => node.capacity(),
            Self::Composite(node) => node.capacity(),
        }
    }

    /// Current usage. Composites sum their children on every call.
    #[must_use]
    pub fn size(&self) -> u64 {
        match self {
            Self::Static(node) => node.size(),
            Self::Dynamic(node) => node.size(),
            Self::Composite(node) => node.size(),
        }
    }

    /// Recompute this node's capacity from the pool its parent could not
    /// reserve and the total weight of this node and its siblings.
    pub fn calc_capacity(&mut self, unreserved_pool: u64, total_weight: u64) {
        match self {
            Self::Static(node) => node.calc_capacity(),
            Self::Dynamic(node) => node.calc_capacity(unreserved_pool, total_weight),
            Self::Composite(node) => node.calc_capacity(unreserved_pool, total_weight),
        }
    }

    /// Recompute the tree rooted here so that the root is granted `total`.
    pub fn calc_capacity_top_level(&mut self, total: u64) {
        let pool = total.saturating_sub(self.reserved_capacity());
        let weight = self.weight();
        self.calc_capacity(pool, weight);
    }

    /// Flatten this subtree into pre-order stats records.
    #[must_use]
    pub fn stats(&self, parent_key: &str) -> Vec<CacheStats> {
        let mut out = Vec::new();
        self.collect_stats(parent_key, &mut out);
        out
    }

    pub(crate) fn collect_stats(&self, parent_key: &str, out: &mut Vec<CacheStats>) {
        let key = stats::child_key(parent_key, self.name());
        out.push(CacheStats::new(key.clone(), self.name(), self.capacity(), self.size()));
        if let Self::Composite(node) = self {
            for child in node.children() {
                child.collect_stats(&key, out);
            }
        }
    }

    /// Cache handles of every leaf in this subtree.
    #[must_use]
    pub fn leaf_caches(&self) -> Vec<Arc<dyn DynamicCache>> {
        match self {
            Self::Static(node) => vec![Arc::clone(node.cache())],
            Self::Dynamic(node) => vec![Arc::clone(node.cache())],
            Self::Composite(node) => node.children().iter().flat_map(Self::leaf_caches).collect(),
        }
    }

    /// Leaf handles under each node, in the same pre-order as [`Self::stats`].
    ///
    /// The tree's shape never changes, so the result can be kept to read
    /// sizes later without walking the tree or taking its lock.
    #[must_use]
    pub fn size_sources(&self) -> Vec<Vec<Arc<dyn DynamicCache>>> {
        let mut out = vec![self.leaf_caches()];
        if let Self::Composite(node) = self {
            for child in node.children() {
                out.extend(child.size_sources());
            }
        }
        out
    }

    /// Read and reset every leaf's freed counter, keyed like [`Self::stats`].
    /// Only leaves that freed something are reported.
    pub fn drain_freed(&self, parent_key: &str, out: &mut Vec<(String, u64)>) {
        let key = stats::child_key(parent_key, self.name());
        let cache = match self {
            Self::Static(node) => node.cache(),
            Self::Dynamic(node) => node.cache(),
            Self::Composite(node) => {
                for child in node.children() {
                    child.drain_freed(&key, out);
                }
                return;
            }
        };
        let freed = cache.freed_size();
        cache.reset_freed_size();
        if freed > 0 {
            out.push((key, freed));
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;

    use crate::cache::DynamicCache;

    /// Cache stub with a settable size that records every capacity it is given.
    #[derive(Debug, Default)]
    pub struct StubCache {
        pub name: String,
        pub size: AtomicU64,
        pub capacity: AtomicU64,
        pub freed: AtomicU64,
        pub set_calls: AtomicU64,
    }

    pub fn stub(name: &str, size: u64) -> Arc<StubCache> {
        Arc::new(StubCache {
            name: name.to_string(),
            size: AtomicU64::new(size),
            ..Default::default()
        })
    }

    impl DynamicCache for StubCache {
        fn name(&self) -> &str {
            &self.name
        }
        fn capacity(&self) -> u64 {
            self.capacity.load(Ordering::SeqCst)
        }
        fn size(&self) -> u64 {
            self.size.load(Ordering::SeqCst)
        }
        fn set_capacity(&self, capacity: u64) {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            self.capacity.store(capacity, Ordering::SeqCst);
            let size = self.size.load(Ordering::SeqCst);
            if capacity < size {
                self.freed.fetch_add(size - capacity, Ordering::SeqCst);
                self.size.store(capacity, Ordering::SeqCst);
            }
        }
        fn freed_size(&self) -> u64 {
            self.freed.load(Ordering::SeqCst)
        }
        fn reset_freed_size(&self) {
            self.freed.store(0, Ordering::SeqCst);
        }
    }
}
