//! # Cache Allotment
//!
//! Adaptive cache-capacity controller: divides the memory available to a
//! process across many caches, and keeps re-dividing it as conditions change.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CacheManager                          │
//! │  • Ticks every monitoring interval (background task)       │
//! │  • available = reclaimable heap + OS free + cached bytes   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ResizePipeline                         │
//! │  • PoolRecorder: raw pool for diagnostics                  │
//! │  • GcHysteresis: no shrink until a full collection         │
//! │  • GrowthThrottle: freeze or relax upward growth           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Allotment tree                         │
//! │  • Static: fixed capacity, reserved before any split       │
//! │  • Dynamic: weighted share, clamped to [min, max]          │
//! │  • Composite: splits its share across its children         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                   (set_capacity on every leaf)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  DynamicCache leaves                        │
//! │  • LruCache: evicts in bounded steps when shrunk           │
//! │  • EmptyDynamicCache: holds quota, stores nothing          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cache_allotment::{AllotmentConfig, CacheManager, CacheRegistry};
//! use cache_allotment::cache::LruCache;
//! use cache_allotment::probe::SystemProbe;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AllotmentConfig::from_json(r#"{
//!         "root": { "kind": "dynamic", "name": "Chunks", "unit": "bytes", "weight": 60 }
//!     }"#).expect("invalid config");
//!
//!     let chunks: Arc<LruCache<u64, Vec<u8>>> =
//!         Arc::new(config.sized_lru::<u64, Vec<u8>>("Chunks", |_, page| page.len() as u64));
//!     let registry = CacheRegistry::new().with(chunks.clone());
//!
//!     let manager = Arc::new(
//!         CacheManager::from_config(&config, &registry, Arc::new(SystemProbe::new()))
//!             .expect("invalid cache tree"),
//!     );
//!     manager.start().expect("already started");
//!     let handle = manager.spawn();
//!
//!     chunks.put(1, vec![0; 4096]);
//!     println!("{:?}", manager.stats());
//!
//!     manager.shutdown();
//!     handle.await.expect("resize loop panicked");
//! }
//! ```
//!
//! ## Modules
//!
//! - [`allotment`]: The capacity-allocation tree
//! - [`cache`]: Leaf cache contract and reference caches
//! - [`policy`]: Resize policy stages and pipeline
//! - [`manager`]: The [`CacheManager`] orchestrator
//! - [`probe`]: Memory introspection
//! - [`presets`]: Ready-made stream-info trees
//! - [`config`]: Configuration and tree building

pub mod allotment;
pub mod cache;
pub mod config;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod policy;
pub mod presets;
pub mod probe;

pub use allotment::{scale, Allotment, CacheStats, Unit};
pub use cache::{DynamicCache, EmptyDynamicCache, LruCache};
pub use config::{AllotmentConfig, CacheRegistry, CacheSpec};
pub use error::{AllotmentError, ManagerError};
pub use manager::{AllotmentSnapshot, CacheManager, ManagerState, StatsReport, StatsRow};
pub use policy::{ResizeOutcome, ResizePipeline, ThrottleMode};
pub use probe::{FnProbe, MemoryProbe, SystemProbe};
pub use crate::metrics::TickTimer;
