// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache manager.
//!
//! The [`CacheManager`] owns the allotment tree and periodically resizes it
//! to the memory currently available to the process:
//!
//! ```text
//!                   root (weight 100)
//!        ┌──────────────┼─────────────────┐
//!   <caller tree>   keep-for-os        keep-free
//!                   (dynamic, w=40)    (static, max(floor, total·%))
//! ```
//!
//! Each tick reads reclaimable heap, OS free memory and the tree's own size,
//! runs the sum through the [`ResizePipeline`], and publishes an immutable
//! [`AllotmentSnapshot`] of the resulting capacities. Stats queries combine
//! those capacities with sizes read live from the caches, without locking
//! the tree.
//! Entry-counted trees skip the wrapping and the probe entirely; they are
//! sized once at [`CacheManager::start`].
//!
//! # Lifecycle
//!
//! ```text
//! Created → Started → Running → Stopped
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use cache_allotment::{Allotment, AllotmentConfig, CacheManager, ManagerState, Unit};
//! use cache_allotment::cache::{DynamicCache, EmptyDynamicCache};
//! use cache_allotment::probe::FnProbe;
//!
//! let chunks = Arc::new(EmptyDynamicCache::new("Chunks"));
//! let tree = Allotment::dynamic("Chunks", Unit::Bytes, 60, 0, chunks.clone()).unwrap();
//! let config = AllotmentConfig {
//!     total_memory_bytes: Some(16 << 30),
//!     ..Default::default()
//! };
//! let manager = CacheManager::new(&config, tree, Arc::new(FnProbe::new(16 << 30, || 8 << 30))).unwrap();
//!
//! manager.start().unwrap();
//! assert_eq!(manager.state(), ManagerState::Started);
//! assert!(chunks.capacity() > 0);
//! ```

mod lifecycle;
mod types;

pub use types::{AllotmentSnapshot, ManagerState, StatsReport, StatsRow};

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::allotment::{Allotment, CacheStats, Unit};
use crate::cache::{DynamicCache, EmptyDynamicCache};
use crate::config::{AllotmentConfig, CacheRegistry};
use crate::error::ManagerError;
use crate::metrics;
use crate::policy::{GcHysteresis, GrowthThrottle, PoolGauge, PoolRecorder, ResizeOutcome, ResizePipeline};
use crate::probe::MemoryProbe;

/// Name of the composite wrapping a byte-counted tree.
pub const ROOT_NAME: &str = "root";
/// Weight of the wrapping composite.
pub const ROOT_WEIGHT: u64 = 100;
/// Dynamic sibling leaving a share of the pool to the OS page cache.
pub const KEEP_FOR_OS: &str = "keep-for-os";
/// Static sibling reserving guaranteed-free memory.
pub const KEEP_FREE: &str = "keep-free";

struct ResizeState {
    root: Allotment,
    pipeline: ResizePipeline,
}

struct ManagerInner {
    unit: Unit,
    resize: Mutex<ResizeState>,
    // Leaf caches under each node, aligned with the snapshot's stats
    size_sources: Vec<Vec<Arc<dyn DynamicCache>>>,
    probe: Arc<dyn MemoryProbe>,
    snapshot: ArcSwap<AllotmentSnapshot>,
    raw_pool: PoolGauge,
    ticks: AtomicU64,
}

/// Periodically divides available memory across a tree of caches.
pub struct CacheManager {
    inner: Arc<ManagerInner>,
    interval: Duration,
    started: AtomicBool,
    state: watch::Sender<ManagerState>,
    shutdown: watch::Sender<bool>,
}

impl CacheManager {
    /// Build a manager for `tree`.
    ///
    /// Byte-counted trees are wrapped with the keep-for-OS and keep-free
    /// siblings and resized through
    /// `PoolRecorder → GcHysteresis → GrowthThrottle`.
    pub fn new(
        config: &AllotmentConfig,
        tree: Allotment,
        probe: Arc<dyn MemoryProbe>,
    ) -> Result<Self, ManagerError> {
        config.validate()?;
        let unit = tree.unit();
        let raw_pool = PoolGauge::new();

        let (root, pipeline) = match unit {
            Unit::Bytes => {
                let total = config.total_memory_bytes.unwrap_or_else(|| probe.total_memory());
                let keep_free = config.keep_free_for(total);
                info!(total, keep_free, keep_for_os_weight = config.keep_for_os_weight, "Reserving memory outside the caches");

                let root = Allotment::composite(
                    ROOT_NAME,
                    ROOT_WEIGHT,
                    vec![
                        tree,
                        Allotment::dynamic(
                            KEEP_FOR_OS,
                            Unit::Bytes,
                            config.keep_for_os_weight,
                            0,
                            Arc::new(EmptyDynamicCache::new(KEEP_FOR_OS)),
                        )?,
                        Allotment::fixed(
                            KEEP_FREE,
                            Unit::Bytes,
                            keep_free,
                            Arc::new(EmptyDynamicCache::new(KEEP_FREE)),
                        ),
                    ],
                )?;

                let collections = Arc::clone(&probe);
                let pipeline = ResizePipeline::new()
                    .with_stage(PoolRecorder::new(raw_pool.clone()))
                    .with_stage(GcHysteresis::new(move || collections.full_collections()))
                    .with_stage(GrowthThrottle::new(config.growth_throttle));
                (root, pipeline)
            }
            Unit::Entries => (tree, ResizePipeline::new()),
        };

        let size_sources = root.size_sources();
        let snapshot = AllotmentSnapshot {
            stats: root.stats(""),
            ..Default::default()
        };
        let (state, _) = watch::channel(ManagerState::Created);
        let (shutdown, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(ManagerInner {
                unit,
                resize: Mutex::new(ResizeState { root, pipeline }),
                size_sources,
                probe,
                snapshot: ArcSwap::from_pointee(snapshot),
                raw_pool,
                ticks: AtomicU64::new(0),
            }),
            interval: config.monitoring_interval(),
            started: AtomicBool::new(false),
            state,
            shutdown,
        })
    }

    /// Build the configured tree from `registry` and manage it.
    pub fn from_config(
        config: &AllotmentConfig,
        registry: &CacheRegistry,
        probe: Arc<dyn MemoryProbe>,
    ) -> Result<Self, ManagerError> {
        let tree = config.build_tree(registry)?;
        Self::new(config, tree, probe)
    }

    #[must_use]
    pub fn unit(&self) -> Unit {
        self.inner.unit
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    #[must_use]
    pub fn state(&self) -> ManagerState {
        *self.state.borrow()
    }

    pub fn state_receiver(&self) -> watch::Receiver<ManagerState> {
        self.state.subscribe()
    }

    /// Number of resize passes run so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.inner.ticks.load(Ordering::Acquire)
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<AllotmentSnapshot> {
        self.inner.snapshot.load_full()
    }

    /// Per-node stats.
    ///
    /// Capacities and `raw_pool` come from the last resize pass. Sizes are
    /// read from the caches at the time of the call.
    #[must_use]
    pub fn stats(&self) -> StatsReport {
        let snapshot = self.inner.snapshot.load();
        let rows = snapshot
            .stats
            .iter()
            .zip(&self.inner.size_sources)
            .map(|(node, leaves)| {
                let size = leaves.iter().fold(0u64, |acc, cache| acc.saturating_add(cache.size()));
                StatsRow::from(&CacheStats { size, ..node.clone() })
            })
            .collect();
        StatsReport {
            tick: snapshot.tick,
            raw_pool: snapshot.available_memory,
            rows,
        }
    }

    /// Run one resize pass on the calling thread.
    ///
    /// Entry-counted trees are recalculated as at startup.
    pub fn resize_now(&self) -> ResizeOutcome {
        let tick = self.inner.next_tick();
        self.inner.resize(tick)
    }

    /// Forget the growth baseline so the next resize applies in full.
    pub fn rebase_growth(&self) {
        self.inner.resize.lock().pipeline.rebase();
        info!("Resize baseline cleared");
    }

    fn set_state(&self, state: ManagerState) {
        self.state.send_replace(state);
        metrics::set_manager_state(&state.to_string());
    }
}

impl ManagerInner {
    fn next_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn resize(&self, tick: u64) -> ResizeOutcome {
        let _timer = metrics::TickTimer::new();
        let mut guard = self.resize.lock();
        let ResizeState { root, pipeline } = &mut *guard;

        let (outcome, available_memory) = match self.unit {
            Unit::Bytes => {
                let available = self
                    .probe
                    .reclaimable_heap()
                    .saturating_add(self.probe.free_memory())
                    .saturating_add(root.size());
                metrics::set_available_memory(available);
                (pipeline.resize(root, available), Some(available))
            }
            Unit::Entries => {
                root.calc_capacity_top_level(0);
                (ResizeOutcome::Unmanaged, None)
            }
        };
        metrics::record_resize(outcome.label());

        let mut freed = Vec::new();
        root.drain_freed("", &mut freed);
        for (key, amount) in &freed {
            metrics::record_freed(key, *amount);
        }

        let stats = root.stats("");
        drop(guard);

        for node in &stats {
            metrics::set_node_capacity(&node.key, node.capacity);
            metrics::set_node_size(&node.key, node.size);
        }
        debug!(tick, outcome = outcome.label(), ?available_memory, "Resize pass complete");

        self.snapshot.store(Arc::new(AllotmentSnapshot {
            tick,
            available_memory,
            outcome: Some(outcome),
            stats,
        }));
        outcome
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("unit", &self.inner.unit)
            .field("interval", &self.interval)
            .field("state", &self.state())
            .field("ticks", &self.ticks())
            .finish()
    }
}
