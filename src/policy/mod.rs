//! Resize-policy pipeline.
//!
//! Policies sit between the manager's estimate of available memory and the
//! root of the allotment tree. Each stage may adjust the pool or veto the
//! resize; stages only update their state once a resize has actually been
//! applied, so a veto further down never desynchronizes earlier stages.
//!
//! ```text
//! available ─► PoolRecorder ─► GcHysteresis ─► GrowthThrottle ─► root.calc_capacity_top_level
//!              (raw value)     (no shrink       (freeze or relax
//!                               before a GC)     upward growth)
//! ```

pub mod diagnostic;
pub mod hysteresis;
pub mod pipeline;
pub mod throttle;

pub use diagnostic::{PoolGauge, PoolRecorder};
pub use hysteresis::GcHysteresis;
pub use pipeline::{ResizeOutcome, ResizePipeline};
pub use throttle::{GrowthThrottle, ThrottleMode, DEFAULT_RELAX_FACTOR};

/// What a stage wants done with the pool it was handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Continue with this (possibly adjusted) pool.
    Apply(u64),
    /// Leave every capacity as it is this time.
    Skip,
}

/// One stage of the [`ResizePipeline`].
pub trait ResizePolicy: Send {
    fn name(&self) -> &'static str;

    /// Inspect, adjust or veto the pool.
    fn adjust(&mut self, pool: u64) -> Decision;

    /// Called with the pool the tree was finally resized to.
    fn commit(&mut self, _applied: u64) {}

    /// Forget learned baselines so the next resize is treated as the first.
    fn rebase(&mut self) {}
}
