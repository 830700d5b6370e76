// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Collection-synchronized downsizing hysteresis.
//!
//! Shrinking a cache's logical capacity does not return memory until the
//! allocator or collector actually reclaims it. Shrinking again before that
//! would observe no improvement and shrink further without bound, so a
//! smaller pool is only applied once a full collection has happened since
//! the last resize. Growth is always applied immediately.

use tracing::debug;

use super::{Decision, ResizePolicy};

#[derive(Debug, Clone, Copy)]
struct Applied {
    pool: u64,
    collections: u64,
}

/// Defers shrinks until the full-collection counter moves.
pub struct GcHysteresis {
    collections: Box<dyn Fn() -> u64 + Send + Sync>,
    last: Option<Applied>,
    observed_collections: u64,
}

impl GcHysteresis {
    /// `collections` reports how many full collections have completed so far.
    pub fn new(collections: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            collections: Box::new(collections),
            last: None,
            observed_collections: 0,
        }
    }

    /// Pool of the last applied resize, if any.
    #[must_use]
    pub fn last_pool(&self) -> Option<u64> {
        self.last.map(|applied| applied.pool)
    }
}

impl ResizePolicy for GcHysteresis {
    fn name(&self) -> &'static str {
        "gc_hysteresis"
    }

    fn adjust(&mut self, pool: u64) -> Decision {
        let collections = (self.collections)();
        self.observed_collections = collections;

        match self.last {
            None => Decision::Apply(pool),
            Some(last) if pool > last.pool => Decision::Apply(pool),
            Some(last) if collections != last.collections => Decision::Apply(pool),
            Some(last) => {
                debug!(
                    pool,
                    last_pool = last.pool,
                    collections,
                    "Deferring shrink until a full collection has run"
                );
                Decision::Skip
            }
        }
    }

    fn commit(&mut self, applied: u64) {
        self.last = Some(Applied {
            pool: applied,
            collections: self.observed_collections,
        });
    }

    fn rebase(&mut self) {
        self.last = None;
    }
}

impl std::fmt::Debug for GcHysteresis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GcHysteresis")
            .field("last_pool", &self.last_pool())
            .field("observed_collections", &self.observed_collections)
            .finish()
    }
}
