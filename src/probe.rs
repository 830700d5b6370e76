// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Memory introspection used by the [`CacheManager`](crate::CacheManager).
//!
//! The manager never reads OS or allocator state directly; it goes through a
//! [`MemoryProbe`]. Hosts with their own accounting (or tests) use
//! [`FnProbe`]; everyone else can use [`SystemProbe`].

use parking_lot::Mutex;
use sysinfo::System;

/// Source of the memory figures the manager feeds into each resize.
pub trait MemoryProbe: Send + Sync {
    /// Total physical memory in bytes.
    fn total_memory(&self) -> u64;

    /// Bytes the OS reports as free or available.
    fn free_memory(&self) -> u64;

    /// Bytes held by the process heap that are unused but not yet returned
    /// to the OS.
    fn reclaimable_heap(&self) -> u64 {
        0
    }

    /// Number of full collections (or allocator purges) completed so far.
    fn full_collections(&self) -> u64;
}

type Reading = Box<dyn Fn() -> u64 + Send + Sync>;

/// Probe assembled from closures.
///
/// # Example
///
/// ```
/// use cache_allotment::probe::{FnProbe, MemoryProbe};
///
/// let probe = FnProbe::new(16 << 30, || 4 << 30)
///     .with_reclaimable_heap(|| 512 << 20);
/// assert_eq!(probe.free_memory(), 4 << 30);
/// assert_eq!(probe.full_collections(), 0);
/// ```
pub struct FnProbe {
    total: u64,
    free: Reading,
    reclaimable: Reading,
    collections: Reading,
}

impl FnProbe {
    pub fn new(total_memory: u64, free_memory: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            total: total_memory,
            free: Box::new(free_memory),
            reclaimable: Box::new(|| 0),
            collections: Box::new(|| 0),
        }
    }

    #[must_use]
    pub fn with_reclaimable_heap(mut self, reclaimable: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.reclaimable = Box::new(reclaimable);
        self
    }

    #[must_use]
    pub fn with_full_collections(mut self, collections: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.collections = Box::new(collections);
        self
    }
}

impl MemoryProbe for FnProbe {
    fn total_memory(&self) -> u64 {
        self.total
    }

    fn free_memory(&self) -> u64 {
        (self.free)()
    }

    fn reclaimable_heap(&self) -> u64 {
        (self.reclaimable)()
    }

    fn full_collections(&self) -> u64 {
        (self.collections)()
    }
}

impl std::fmt::Debug for FnProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnProbe").field("total", &self.total).finish()
    }
}

/// Default rise in available memory that counts as a completed reclaim.
pub const DEFAULT_RECLAIM_THRESHOLD: u64 = 64 << 20;

/// Turns successive available-memory readings into a collection count.
///
/// The count advances when available memory climbs at least `threshold`
/// bytes above the lowest reading seen since the previous advance. A shrink
/// whose freed pages stay inside the allocator never moves it.
#[derive(Debug)]
struct ReclaimTracker {
    threshold: u64,
    low_water: Option<u64>,
    collections: u64,
}

impl ReclaimTracker {
    fn new(threshold: u64) -> Self {
        Self {
            threshold,
            low_water: None,
            collections: 0,
        }
    }

    fn observe(&mut self, available: u64) {
        match self.low_water {
            Some(low) if available >= low.saturating_add(self.threshold) && available > low => {
                self.collections += 1;
                self.low_water = Some(available);
            }
            Some(low) => self.low_water = Some(low.min(available)),
            None => self.low_water = Some(available),
        }
    }

    fn record(&mut self) {
        self.collections += 1;
        self.low_water = None;
    }
}

/// Probe backed by `sysinfo`.
///
/// Rust has no collector to ask, so a "full collection" is inferred from OS
/// available memory: the count advances only when available memory rises
/// by [`DEFAULT_RECLAIM_THRESHOLD`] (or the configured threshold) above its
/// recent low. Hosts that purge their allocator explicitly should call
/// [`SystemProbe::record_collection`] afterwards.
///
/// # Example
///
/// ```
/// use cache_allotment::probe::{MemoryProbe, SystemProbe};
///
/// let probe = SystemProbe::new();
/// let before = probe.full_collections();
/// assert_eq!(probe.full_collections(), before);
///
/// probe.record_collection();
/// assert_eq!(probe.full_collections(), before + 1);
/// ```
pub struct SystemProbe {
    system: Mutex<System>,
    reclaim: Mutex<ReclaimTracker>,
}

impl SystemProbe {
    #[must_use]
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_memory();
        Self {
            system: Mutex::new(system),
            reclaim: Mutex::new(ReclaimTracker::new(DEFAULT_RECLAIM_THRESHOLD)),
        }
    }

    /// Rise in available memory, in bytes, that counts as a reclaim.
    #[must_use]
    pub fn with_reclaim_threshold(self, threshold: u64) -> Self {
        self.reclaim.lock().threshold = threshold;
        self
    }

    /// Report that the host has just returned memory to the OS.
    pub fn record_collection(&self) {
        self.reclaim.lock().record();
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemProbe {
    fn total_memory(&self) -> u64 {
        self.system.lock().total_memory()
    }

    fn free_memory(&self) -> u64 {
        let available = {
            let mut system = self.system.lock();
            system.refresh_memory();
            system.available_memory()
        };
        self.reclaim.lock().observe(available);
        available
    }

    fn full_collections(&self) -> u64 {
        self.reclaim.lock().collections
    }
}

impl std::fmt::Debug for SystemProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemProbe")
            .field("reclaim", &*self.reclaim.lock())
            .finish()
    }
}
