// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use super::{Decision, ResizePolicy};

/// Shared handle to the last raw pool seen by a [`PoolRecorder`].
#[derive(Debug, Clone, Default)]
pub struct PoolGauge(Arc<Mutex<Option<u64>>>);

impl PoolGauge {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last recorded raw pool, `None` until the first resize attempt.
    #[must_use]
    pub fn get(&self) -> Option<u64> {
        *self.0.lock()
    }

    fn set(&self, pool: u64) {
        *self.0.lock() = Some(pool);
    }
}

/// Pass-through stage recording the pool before any adjustment.
#[derive(Debug, Clone)]
pub struct PoolRecorder {
    gauge: PoolGauge,
}

impl PoolRecorder {
    #[must_use]
    pub fn new(gauge: PoolGauge) -> Self {
        Self { gauge }
    }
}

impl ResizePolicy for PoolRecorder {
    fn name(&self) -> &'static str {
        "pool_recorder"
    }

    fn adjust(&mut self, pool: u64) -> Decision {
        trace!(pool, "Raw pool before resize policies");
        self.gauge.set(pool);
        Decision::Apply(pool)
    }
}
