// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::collections::HashSet;

use crate::error::AllotmentError;

use super::{scale, Allotment, Unit};

/// Node aggregating named children. Stores no data of its own.
///
/// Shape is fixed at construction, so the reservation and weight totals of
/// the children are computed once.
#[derive(Debug)]
pub struct CompositeAllotment {
    name: String,
    unit: Unit,
    weight: u64,
    capacity: u64,
    reserved: u64,
    children_weight: u64,
    children: Vec<Allotment>,
}

impl CompositeAllotment {
    pub fn new(name: impl Into<String>, weight: u64, children: Vec<Allotment>) -> Result<Self, AllotmentError> {
        let name = name.into();
        if weight == 0 {
            return Err(AllotmentError::ZeroWeight { name });
        }
        let Some(first) = children.first() else {
            return Err(AllotmentError::EmptyComposite { name });
        };

        let unit = first.unit();
        let mut seen = HashSet::with_capacity(children.len());
        for child in &children {
            if child.unit() != unit {
                return Err(AllotmentError::MixedUnits {
                    composite: name,
                    child: child.name().to_string(),
                    expected: unit,
                    found: child.unit(),
                });
            }
            if !seen.insert(child.name()) {
                return Err(AllotmentError::DuplicateChild {
                    composite: name,
                    child: child.name().to_string(),
                });
            }
        }

        let reserved = children
            .iter()
            .fold(0u64, |acc, child| acc.saturating_add(child.reserved_capacity()));
        let children_weight = children
            .iter()
            .fold(0u64, |acc, child| acc.saturating_add(child.weight()));

        Ok(Self {
            name,
            unit,
            weight,
            capacity: 0,
            reserved,
            children_weight,
            children,
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

    /// Sum of the children's reservations.
    pub fn reserved_capacity(&self) -> u64 {
        self.reserved
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Sum of the children's sizes, read fresh on every call.
    pub fn size(&self) -> u64 {
        self.children
            .iter()
            .fold(0u64, |acc, child| acc.saturating_add(child.size()))
    }

    pub fn children(&self) -> &[Allotment] {
        &self.children
    }

    /// Restore this node's own reservation to the pool, take the weighted
    /// share, and hand the rest down.
    pub(super) fn calc_capacity(&mut self, pool: u64, total_weight: u64) {
        let own = scale(pool.saturating_add(self.reserved), self.weight, total_weight);
        self.set_capacity(own);
    }

    /// Assign `capacity` to this node and split what the children did not
    /// reserve among them by weight.
    pub fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
        let child_pool = capacity.saturating_sub(self.reserved);
        for child in &mut self.children {
            child.calc_capacity(child_pool, self.children_weight);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::super::testing::stub;
    use crate::cache::DynamicCache;
    use super::*;

    fn scenario() -> (Allotment, [std::sync::Arc<super::super::testing::StubCache>; 3]) {
        let a = stub("A", 0);
        let b = stub("B", 0);
        let c = stub("C", 0);
        let tree = Allotment::composite(
            "cache",
            100,
            vec![
                Allotment::fixed("A", Unit::Bytes, 100, a.clone()),
                Allotment::dynamic("B", Unit::Bytes, 1, 0, b.clone()).unwrap(),
                Allotment::dynamic("C", Unit::Bytes, 1, 0, c.clone()).unwrap(),
            ],
        )
        .unwrap();
        (tree, [a, b, c])
    }

    #[test]
    fn test_restores_reservation_before_splitting() {
        let (mut tree, [a, b, c]) = scenario();
        assert_eq!(tree.reserved_capacity(), 100);
        assert_eq!(tree.weight(), 100);

        tree.calc_capacity(200, 100);
        assert_eq!(tree.capacity(), 300);
        assert_eq!(a.capacity(), 100);
        assert_eq!(b.capacity(), 100);
        assert_eq!(c.capacity(), 100);
    }

    #[test]
    fn test_zero_pool_keeps_static_reservation() {
        let (mut tree, [a, b, c]) = scenario();
        tree.calc_capacity(0, 100);
        assert_eq!(a.capacity(), 100);
        assert_eq!(b.capacity(), 0);
        assert_eq!(c.capacity(), 0);
    }

    #[test]
    fn test_composite_shares_pool_with_siblings() {
        let inner_static = stub("inner-static", 0);
        let inner_dynamic = stub("inner-dynamic", 0);
        let sibling = stub("sibling", 0);

        let inner = Allotment::composite(
            "inner",
            3,
            vec![
                Allotment::fixed("inner-static", Unit::Bytes, 50, inner_static.clone()),
                Allotment::dynamic("inner-dynamic", Unit::Bytes, 1, 0, inner_dynamic.clone()).unwrap(),
            ],
        )
        .unwrap();
        let mut root = Allotment::composite(
            "root",
            1,
            vec![
                inner,
                Allotment::dynamic("sibling", Unit::Bytes, 1, 0, sibling.clone()).unwrap(),
            ],
        )
        .unwrap();
        // the deep reservation is visible at the top
        assert_eq!(root.reserved_capacity(), 50);

        root.calc_capacity_top_level(450);
        // root splits 400 by 3:1; inner weighs (400 + 50) and keeps 50 of it
        assert_eq!(root.capacity(), 450);
        assert_eq!(sibling.capacity(), 100);
        assert_eq!(inner_static.capacity(), 50);
        assert_eq!(inner_dynamic.capacity(), 287);
    }

    #[test]
    fn test_size_sums_direct_children_at_read_time() {
        let (tree, [a, b, c]) = scenario();
        assert_eq!(tree.size(), 0);

        a.size.store(10, Ordering::SeqCst);
        b.size.store(20, Ordering::SeqCst);
        c.size.store(30, Ordering::SeqCst);
        assert_eq!(tree.size(), 60);

        b.size.store(0, Ordering::SeqCst);
        assert_eq!(tree.size(), 40);
    }

    #[test]
    fn test_rejects_mixed_units() {
        let err = Allotment::composite(
            "StreamInfo",
            100,
            vec![
                Allotment::fixed("LastEventNumber", Unit::Entries, 10, stub("a", 0)),
                Allotment::fixed("Metadata", Unit::Bytes, 10, stub("b", 0)),
            ],
        )
        .unwrap_err();
        assert_eq!(
            err,
            AllotmentError::MixedUnits {
                composite: "StreamInfo".into(),
                child: "Metadata".into(),
                expected: Unit::Entries,
                found: Unit::Bytes,
            }
        );
    }

    #[test]
    fn test_rejects_empty_zero_weight_and_duplicates() {
        assert!(matches!(
            Allotment::composite("empty", 1, vec![]),
            Err(AllotmentError::EmptyComposite { .. })
        ));
        assert!(matches!(
            Allotment::composite("weightless", 0, vec![Allotment::fixed("a", Unit::Bytes, 1, stub("a", 0))]),
            Err(AllotmentError::ZeroWeight { .. })
        ));
        assert!(matches!(
            Allotment::composite(
                "twins",
                1,
                vec![
                    Allotment::fixed("a", Unit::Bytes, 1, stub("a", 0)),
                    Allotment::fixed("a", Unit::Bytes, 2, stub("a", 0)),
                ]
            ),
            Err(AllotmentError::DuplicateChild { .. })
        ));
    }

    #[test]
    fn test_unit_is_inherited_from_children() {
        let tree = Allotment::composite(
            "entries",
            1,
            vec![Allotment::fixed("a", Unit::Entries, 1, stub("a", 0))],
        )
        .unwrap();
        assert_eq!(tree.unit(), Unit::Entries);
    }
}
