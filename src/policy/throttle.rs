// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Upward-growth throttling.
//!
//! Shrinks always pass straight through. Growth is either refused until the
//! baseline is explicitly rebased ([`ThrottleMode::Freeze`]) or applied as a
//! fraction of the requested increase per resize ([`ThrottleMode::Relax`]),
//! so that several processes on one host converge on newly freed memory
//! instead of the first one to tick taking all of it.
//!
//! A relaxed step is `ceil((requested - last) * factor)`, never more than the
//! full increase. Rounding up departs from a plain `last + factor * delta`
//! (1000 toward 1001 applies 1001, not 1000) so that small increases still
//! converge instead of stalling one unit short.
//!
//! # Example
//!
//! ```
//! use cache_allotment::policy::{Decision, GrowthThrottle, ResizePolicy, ThrottleMode};
//!
//! let mut throttle = GrowthThrottle::new(ThrottleMode::Relax { factor: 0.5 });
//! throttle.commit(1_000);
//! assert_eq!(throttle.adjust(2_000), Decision::Apply(1_500));
//! ```

use serde::Deserialize;
use tracing::debug;

use crate::error::AllotmentError;

use super::{Decision, ResizePolicy};

/// Default share of the requested growth applied per resize.
pub const DEFAULT_RELAX_FACTOR: f64 = 0.5;

/// How upward resizes are throttled.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThrottleMode {
    /// Growth is applied as requested.
    Unthrottled,
    /// Shrink instantly, never grow until rebased.
    Freeze,
    /// Grow by `factor` of the requested increase per resize.
    Relax { factor: f64 },
}

impl Default for ThrottleMode {
    fn default() -> Self {
        Self::Relax {
            factor: DEFAULT_RELAX_FACTOR,
        }
    }
}

impl ThrottleMode {
    pub fn validate(&self) -> Result<(), AllotmentError> {
        match self {
            Self::Relax { factor } if !(*factor > 0.0 && *factor <= 1.0) => Err(AllotmentError::InvalidConfig(
                format!("relax factor must be in (0, 1], got {factor}"),
            )),
            _ => Ok(()),
        }
    }
}

/// Throttles pool increases relative to the last applied pool.
#[derive(Debug, Clone)]
pub struct GrowthThrottle {
    mode: ThrottleMode,
    last: Option<u64>,
}

impl GrowthThrottle {
    #[must_use]
    pub fn new(mode: ThrottleMode) -> Self {
        Self { mode, last: None }
    }

    #[must_use]
    pub fn mode(&self) -> ThrottleMode {
        self.mode
    }
}

impl ResizePolicy for GrowthThrottle {
    fn name(&self) -> &'static str {
        "growth_throttle"
    }

    fn adjust(&mut self, pool: u64) -> Decision {
        let last = match self.last {
            Some(last) if pool > last => last,
            _ => return Decision::Apply(pool),
        };

        match self.mode {
            ThrottleMode::Unthrottled => Decision::Apply(pool),
            ThrottleMode::Freeze => {
                debug!(pool, last, "Growth frozen until rebase");
                Decision::Skip
            }
            ThrottleMode::Relax { factor } => {
                let delta = pool - last;
                // round up so the pool keeps converging when delta is small
                let step = ((delta as f64) * factor).ceil() as u64;
                Decision::Apply(last + step.min(delta))
            }
        }
    }

    fn commit(&mut self, applied: u64) {
        self.last = Some(applied);
    }

    fn rebase(&mut self) {
        self.last = None;
    }
}
