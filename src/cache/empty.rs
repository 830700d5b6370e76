// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::atomic::{AtomicU64, Ordering};

use super::traits::DynamicCache;

/// A cache that stores nothing.
///
/// Used for pool slices that reserve quota without holding data, such as the
/// manager's "keep for OS" and "keep free" siblings.
#[derive(Debug)]
pub struct EmptyDynamicCache {
    name: String,
    capacity: AtomicU64,
}

impl EmptyDynamicCache {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: AtomicU64::new(0),
        }
    }
}

impl DynamicCache for EmptyDynamicCache {
    fn name(&self) -> &str {
        &self.name
    }

    fn capacity(&self) -> u64 {
        self.capacity.load(Ordering::Acquire)
    }

    fn size(&self) -> u64 {
        0
    }

    fn set_capacity(&self, capacity: u64) {
        self.capacity.store(capacity, Ordering::Release);
    }

    fn freed_size(&self) -> u64 {
        0
    }

    fn reset_freed_size(&self) {}
}
