// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

/// Capacity-control contract every resizable cache must satisfy.
///
/// Sizes and capacities are expressed in the unit declared by the allotment
/// node wrapping the cache (bytes or entries); the cache itself is unit-agnostic.
///
/// All methods take `&self`: caches are shared with request-handling threads
/// and must use interior mutability.
pub trait DynamicCache: Send + Sync {
    /// Cache name, used for registry lookups and logging.
    fn name(&self) -> &str;

    /// Current capacity bound.
    fn capacity(&self) -> u64;

    /// Current resident bytes/entries.
    fn size(&self) -> u64;

    /// Accept a new capacity bound.
    ///
    /// If `capacity < size()` the cache evicts down to it, otherwise nothing is
    /// evicted. Must not block indefinitely and must not fail.
    fn set_capacity(&self, capacity: u64);

    /// Bytes/entries evicted due to capacity reduction since the last reset.
    fn freed_size(&self) -> u64;

    /// Reset the freed counter (once per manager tick).
    fn reset_freed_size(&self);
}
