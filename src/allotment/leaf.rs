// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;

use crate::cache::DynamicCache;
use crate::error::AllotmentError;

use super::{scale, Unit};

/// Leaf with a fixed capacity, independent of any pool.
///
/// Used for hard floors and for "keep this much free" sentinels.
pub struct StaticAllotment {
    name: String,
    unit: Unit,
    capacity: u64,
    cache: Arc<dyn DynamicCache>,
}

impl StaticAllotment {
    pub fn new(name: impl Into<String>, unit: Unit, capacity: u64, cache: Arc<dyn DynamicCache>) -> Self {
        Self {
            name: name.into(),
            unit,
            capacity,
            cache,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn fixed_capacity(&self) -> u64 {
        self.capacity
    }

    pub fn capacity(&self) -> u64 {
        self.cache.capacity()
    }

    pub fn size(&self) -> u64 {
        self.cache.size()
    }

    pub fn cache(&self) -> &Arc<dyn DynamicCache> {
        &self.cache
    }

    pub(super) fn calc_capacity(&mut self) {
        self.cache.set_capacity(self.capacity);
    }
}

impl std::fmt::Debug for StaticAllotment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticAllotment")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// Leaf taking a weighted share of its parent's unreserved pool.
///
/// The minimum is best-effort: it is honored even when that overcommits the
/// pool, but it is not reserved from the parent's accounting.
pub struct DynamicAllotment {
    name: String,
    unit: Unit,
    weight: u64,
    min_capacity: u64,
    max_capacity: u64,
    cache: Arc<dyn DynamicCache>,
}

impl DynamicAllotment {
    pub fn new(
        name: impl Into<String>,
        unit: Unit,
        weight: u64,
        min_capacity: u64,
        max_capacity: u64,
        cache: Arc<dyn DynamicCache>,
    ) -> Result<Self, AllotmentError> {
        let name = name.into();
        if weight == 0 {
            return Err(AllotmentError::ZeroWeight { name });
        }
        if min_capacity > max_capacity {
            return Err(AllotmentError::InvalidRange {
                name,
                min: min_capacity,
                max: max_capacity,
            });
        }
        Ok(Self {
            name,
            unit,
            weight,
            min_capacity,
            max_capacity,
            cache,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> Unit {
        self.unit
    }

    pub fn weight(&self) -> u64 {
        self.weight
    }

    pub fn min_capacity(&self) -> u64 {
        self.min_capacity
    }

    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }

    pub fn capacity(&self) -> u64 {
        self.cache.capacity()
    }

    pub fn size(&self) -> u64 {
        self.cache.size()
    }

    pub fn cache(&self) -> &Arc<dyn DynamicCache> {
        &self.cache
    }

    pub(super) fn calc_capacity(&mut self, pool: u64, total_weight: u64) {
        let share = scale(pool, self.weight, total_weight);
        self.cache.set_capacity(share.clamp(self.min_capacity, self.max_capacity));
    }
}

impl std::fmt::Debug for DynamicAllotment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicAllotment")
            .field("name", &self.name)
            .field("unit", &self.unit)
            .field("weight", &self.weight)
            .field("min_capacity", &self.min_capacity)
            .field("max_capacity", &self.max_capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::stub;
    use super::super::Allotment;
    use super::*;

    #[test]
    fn test_static_ignores_pool_and_weight() {
        let cache = stub("floor", 0);
        let mut node = Allotment::fixed("floor", Unit::Bytes, 4096, cache.clone());
        assert_eq!(node.weight(), 0);
        assert_eq!(node.reserved_capacity(), 4096);

        for (pool, weight) in [(0, 0), (0, 10), (1_000_000, 3), (u64::MAX, 1)] {
            node.calc_capacity(pool, weight);
            assert_eq!(cache.capacity(), 4096);
        }
    }

    #[test]
    fn test_dynamic_takes_weighted_share() {
        let cache = stub("chunks", 0);
        let mut node = Allotment::dynamic("chunks", Unit::Bytes, 60, 0, cache.clone()).unwrap();
        assert_eq!(node.reserved_capacity(), 0);

        node.calc_capacity(1_000, 100);
        assert_eq!(cache.capacity(), 600);

        node.calc_capacity(0, 100);
        assert_eq!(cache.capacity(), 0);
    }

    #[test]
    fn test_dynamic_floor_wins_when_starved() {
        let cache = stub("index", 0);
        let mut node = Allotment::dynamic("index", Unit::Bytes, 1, 250, cache.clone()).unwrap();
        node.calc_capacity(100, 2);
        assert_eq!(cache.capacity(), 250);
    }

    #[test]
    fn test_dynamic_ceiling_caps_share() {
        let cache = stub("metadata", 0);
        let mut node = Allotment::dynamic_bounded("metadata", Unit::Bytes, 1, 10, 500, cache.clone()).unwrap();
        node.calc_capacity(10_000, 1);
        assert_eq!(cache.capacity(), 500);
    }

    #[test]
    fn test_dynamic_rejects_zero_weight() {
        let err = Allotment::dynamic("bad", Unit::Bytes, 0, 0, stub("bad", 0)).unwrap_err();
        assert_eq!(err, AllotmentError::ZeroWeight { name: "bad".into() });
    }

    #[test]
    fn test_dynamic_rejects_inverted_range() {
        let err = Allotment::dynamic_bounded("bad", Unit::Bytes, 1, 10, 5, stub("bad", 0)).unwrap_err();
        assert!(matches!(err, AllotmentError::InvalidRange { min: 10, max: 5, .. }));
    }
}
