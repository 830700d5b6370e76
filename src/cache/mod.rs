//! Leaf caches and the capacity contract they satisfy.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Cache Module                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  traits.rs  - DynamicCache: size, set_capacity, freed size   │
//! │  empty.rs   - EmptyDynamicCache: quota holder, stores nothing│
//! │  lru.rs     - LruCache: item-sized LRU with batched shrink   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The allotment tree never owns cache data. Leaves hold an
//! `Arc<dyn DynamicCache>` handle while the subsystem that actually stores
//! data keeps its own handle to the same cache.

pub mod traits;
pub mod empty;
pub mod lru;

pub use traits::DynamicCache;
pub use empty::EmptyDynamicCache;
pub use self::lru::{LruCache, DEFAULT_SHRINK_STEP};
