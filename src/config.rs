// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the cache manager.
//!
//! # Example
//!
//! ```
//! use cache_allotment::AllotmentConfig;
//!
//! // Minimal config (uses defaults)
//! let config = AllotmentConfig::default();
//! assert_eq!(config.keep_free_percent, 25);
//! assert_eq!(config.keep_free_bytes, 6 * 1024 * 1024 * 1024); // 6 GiB
//!
//! // From JSON, with a cache tree
//! let config = AllotmentConfig::from_json(r#"{
//!     "keep_free_percent": 10,
//!     "monitoring_interval_ms": 5000,
//!     "growth_throttle": "freeze",
//!     "root": {
//!         "kind": "composite", "name": "cache", "weight": 100,
//!         "children": [
//!             { "kind": "static", "name": "IndexPages", "unit": "bytes", "capacity": 1048576 },
//!             { "kind": "dynamic", "name": "Chunks", "unit": "bytes", "weight": 60 }
//!         ]
//!     }
//! }"#).unwrap();
//! assert_eq!(config.keep_free_percent, 10);
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::allotment::{scale, Allotment, Unit};
use crate::cache::{DynamicCache, LruCache};
use crate::error::AllotmentError;
use crate::policy::ThrottleMode;

/// Configuration for the cache manager.
///
/// All fields have sensible defaults. `root` describes the cache tree; it can
/// be omitted when the host builds the tree in code.
#[derive(Debug, Clone, Deserialize)]
pub struct AllotmentConfig {
    /// Percentage of total memory always kept free (default: 25)
    #[serde(default = "default_keep_free_percent")]
    pub keep_free_percent: u64,

    /// Absolute floor on memory kept free, in bytes (default: 6 GiB)
    #[serde(default = "default_keep_free_bytes")]
    pub keep_free_bytes: u64,

    /// Interval between resize ticks (default: 15 s)
    #[serde(default = "default_monitoring_interval_ms")]
    pub monitoring_interval_ms: u64,

    /// Weight of the share left to the OS page cache, relative to the cache tree (default: 40)
    #[serde(default = "default_keep_for_os_weight")]
    pub keep_for_os_weight: u64,

    /// Total memory override; the probe is asked when unset
    #[serde(default)]
    pub total_memory_bytes: Option<u64>,

    /// Growth throttling (default: relax by half the increase per tick)
    #[serde(default)]
    pub growth_throttle: ThrottleMode,

    /// Largest amount a single LRU eviction pass may remove (default: 100 000)
    #[serde(default = "default_shrink_batch_step")]
    pub shrink_batch_step: u64,

    /// Cache tree
    #[serde(default)]
    pub root: Option<CacheSpec>,
}

fn default_keep_free_percent() -> u64 { 25 }
fn default_keep_free_bytes() -> u64 { 6 * 1024 * 1024 * 1024 } // 6 GiB
fn default_monitoring_interval_ms() -> u64 { 15_000 }
fn default_keep_for_os_weight() -> u64 { 40 }
fn default_shrink_batch_step() -> u64 { crate::cache::DEFAULT_SHRINK_STEP }

impl Default for AllotmentConfig {
    fn default() -> Self {
        Self {
            keep_free_percent: default_keep_free_percent(),
            keep_free_bytes: default_keep_free_bytes(),
            monitoring_interval_ms: default_monitoring_interval_ms(),
            keep_for_os_weight: default_keep_for_os_weight(),
            total_memory_bytes: None,
            growth_throttle: ThrottleMode::default(),
            shrink_batch_step: default_shrink_batch_step(),
            root: None,
        }
    }
}

impl AllotmentConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, AllotmentError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| AllotmentError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AllotmentError> {
        if self.keep_free_percent > 100 {
            return Err(AllotmentError::InvalidConfig(format!(
                "keep_free_percent must be at most 100, got {}",
                self.keep_free_percent
            )));
        }
        if self.monitoring_interval_ms == 0 {
            return Err(AllotmentError::InvalidConfig(
                "monitoring_interval_ms must be greater than zero".into(),
            ));
        }
        if self.keep_for_os_weight == 0 {
            return Err(AllotmentError::ZeroWeight {
                name: "keep_for_os_weight".into(),
            });
        }
        self.growth_throttle.validate()
    }

    #[must_use]
    pub fn monitoring_interval(&self) -> Duration {
        Duration::from_millis(self.monitoring_interval_ms)
    }

    /// Memory guaranteed free on a host with `total_memory` bytes.
    #[must_use]
    pub fn keep_free_for(&self, total_memory: u64) -> u64 {
        self.keep_free_bytes
            .max(scale(total_memory, self.keep_free_percent, 100))
    }

    /// Build the configured cache tree, binding leaves to `registry`.
    pub fn build_tree(&self, registry: &CacheRegistry) -> Result<Allotment, AllotmentError> {
        self.root
            .as_ref()
            .ok_or_else(|| AllotmentError::InvalidConfig("no cache tree configured".into()))?
            .build(registry)
    }

    /// Entry-counted LRU cache using the configured shrink step.
    #[must_use]
    pub fn lru<K: Hash + Eq, V>(&self, name: &str) -> LruCache<K, V> {
        LruCache::new(name, 0).with_shrink_step(self.shrink_batch_step)
    }

    /// Item-sized LRU cache using the configured shrink step.
    #[must_use]
    pub fn sized_lru<K: Hash + Eq, V>(
        &self,
        name: &str,
        item_size: impl Fn(&K, &V) -> u64 + Send + Sync + 'static,
    ) -> LruCache<K, V> {
        LruCache::with_sizer(name, 0, item_size).with_shrink_step(self.shrink_batch_step)
    }
}

/// Declarative description of one allotment node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheSpec {
    Static {
        name: String,
        unit: Unit,
        capacity: u64,
    },
    Dynamic {
        name: String,
        unit: Unit,
        weight: u64,
        #[serde(default)]
        min_capacity: u64,
        #[serde(default)]
        max_capacity: Option<u64>,
    },
    Composite {
        name: String,
        weight: u64,
        children: Vec<CacheSpec>,
    },
}

impl CacheSpec {
    /// Build the node (and its subtree), binding leaves to registered caches by name.
    pub fn build(&self, registry: &CacheRegistry) -> Result<Allotment, AllotmentError> {
        match self {
            Self::Static { name, unit, capacity } => {
                Ok(Allotment::fixed(name.clone(), *unit, *capacity, registry.get(name)?))
            }
            Self::Dynamic {
                name,
                unit,
                weight,
                min_capacity,
                max_capacity,
            } => Allotment::dynamic_bounded(
                name.clone(),
                *unit,
                *weight,
                *min_capacity,
                max_capacity.unwrap_or(u64::MAX),
                registry.get(name)?,
            ),
            Self::Composite { name, weight, children } => {
                let children = children
                    .iter()
                    .map(|child| child.build(registry))
                    .collect::<Result<Vec<_>, _>>()?;
                Allotment::composite(name.clone(), *weight, children)
            }
        }
    }
}

/// Caches available to [`CacheSpec::build`], keyed by [`DynamicCache::name`].
#[derive(Default, Clone)]
pub struct CacheRegistry {
    caches: HashMap<String, Arc<dyn DynamicCache>>,
}

impl CacheRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `cache`, replacing any cache with the same name.
    #[must_use]
    pub fn with(mut self, cache: Arc<dyn DynamicCache>) -> Self {
        self.register(cache);
        self
    }

    pub fn register(&mut self, cache: Arc<dyn DynamicCache>) -> Option<Arc<dyn DynamicCache>> {
        self.caches.insert(cache.name().to_string(), cache)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn DynamicCache>, AllotmentError> {
        self.caches
            .get(name)
            .cloned()
            .ok_or_else(|| AllotmentError::MissingCache { name: name.to_string() })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.caches.keys().collect();
        names.sort();
        f.debug_struct("CacheRegistry").field("caches", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EmptyDynamicCache;

    const TREE: &str = r#"{
        "root": {
            "kind": "composite", "name": "cache", "weight": 100,
            "children": [
                {
                    "kind": "composite", "name": "StreamInfo", "weight": 100,
                    "children": [
                        { "kind": "dynamic", "name": "LastEventNumber", "unit": "bytes",
                          "weight": 60, "min_capacity": 50, "max_capacity": 5000 },
                        { "kind": "dynamic", "name": "Metadata", "unit": "bytes", "weight": 40 }
                    ]
                },
                { "kind": "static", "name": "IndexPages", "unit": "bytes", "capacity": 1000 }
            ]
        }
    }"#;

    fn registry(names: &[&str]) -> CacheRegistry {
        names.iter().fold(CacheRegistry::new(), |registry, name| {
            registry.with(Arc::new(EmptyDynamicCache::new(*name)))
        })
    }

    #[test]
    fn test_defaults() {
        let config = AllotmentConfig::default();
        assert_eq!(config.monitoring_interval(), Duration::from_secs(15));
        assert_eq!(config.keep_for_os_weight, 40);
        assert_eq!(config.growth_throttle, ThrottleMode::Relax { factor: 0.5 });
        assert_eq!(config.shrink_batch_step, 100_000);
        assert!(config.root.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = AllotmentConfig::from_json("{}").unwrap();
        assert_eq!(config.keep_free_percent, 25);
        assert_eq!(config.total_memory_bytes, None);
    }

    #[test]
    fn test_keep_free_takes_larger_of_floor_and_percentage() {
        let config = AllotmentConfig {
            keep_free_percent: 25,
            keep_free_bytes: 1_000,
            ..Default::default()
        };
        assert_eq!(config.keep_free_for(100_000), 25_000);
        assert_eq!(config.keep_free_for(2_000), 1_000);
    }

    #[test]
    fn test_builds_tree_from_json() {
        let config = AllotmentConfig::from_json(TREE).unwrap();
        let tree = config
            .build_tree(&registry(&["LastEventNumber", "Metadata", "IndexPages"]))
            .unwrap();

        assert_eq!(tree.name(), "cache");
        assert_eq!(tree.unit(), Unit::Bytes);
        assert_eq!(tree.reserved_capacity(), 1_000);
        let keys: Vec<_> = tree.stats("").into_iter().map(|s| s.key).collect();
        assert_eq!(
            keys,
            vec![
                "cache",
                "cache-StreamInfo",
                "cache-StreamInfo-LastEventNumber",
                "cache-StreamInfo-Metadata",
                "cache-IndexPages",
            ]
        );
    }

    #[test]
    fn test_dynamic_bounds_from_json_are_applied() {
        let config = AllotmentConfig::from_json(TREE).unwrap();
        let last_event_number = Arc::new(EmptyDynamicCache::new("LastEventNumber"));
        let registry = registry(&["Metadata", "IndexPages"]).with(last_event_number.clone());
        let mut tree = config.build_tree(&registry).unwrap();

        tree.calc_capacity_top_level(1_000_000);
        assert_eq!(last_event_number.capacity(), 5_000);
        tree.calc_capacity_top_level(0);
        assert_eq!(last_event_number.capacity(), 50);
    }

    #[test]
    fn test_missing_cache_is_reported() {
        let config = AllotmentConfig::from_json(TREE).unwrap();
        let err = config.build_tree(&registry(&["LastEventNumber", "Metadata"])).unwrap_err();
        assert_eq!(err, AllotmentError::MissingCache { name: "IndexPages".into() });
    }

    #[test]
    fn test_missing_root_is_reported() {
        let err = AllotmentConfig::default().build_tree(&CacheRegistry::new()).unwrap_err();
        assert!(matches!(err, AllotmentError::InvalidConfig(_)));
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(AllotmentConfig::from_json(r#"{"keep_free_percent": 101}"#).is_err());
        assert!(AllotmentConfig::from_json(r#"{"monitoring_interval_ms": 0}"#).is_err());
        assert!(AllotmentConfig::from_json(r#"{"keep_for_os_weight": 0}"#).is_err());
        assert!(AllotmentConfig::from_json(r#"{"growth_throttle": {"relax": {"factor": 2.0}}}"#).is_err());
        assert!(AllotmentConfig::from_json(r#"{"keep_free_percent": "lots"}"#).is_err());
    }

    #[test]
    fn test_zero_weight_dynamic_in_config_fails_fast() {
        let json = r#"{"root": {"kind": "dynamic", "name": "Chunks", "unit": "bytes", "weight": 0}}"#;
        let config = AllotmentConfig::from_json(json).unwrap();
        let err = config.build_tree(&registry(&["Chunks"])).unwrap_err();
        assert_eq!(err, AllotmentError::ZeroWeight { name: "Chunks".into() });
    }

    #[test]
    fn test_lru_helpers_use_configured_step() {
        let config = AllotmentConfig {
            shrink_batch_step: 10,
            ..Default::default()
        };
        let cache: LruCache<u32, u32> = config.lru("Chunks");
        cache.set_capacity(100);
        for i in 0..100 {
            cache.put(i, i);
        }
        cache.set_capacity(0);
        assert_eq!(cache.shrink_passes(), 10);

        let sized = config.sized_lru::<u32, Vec<u8>>("Pages", |_, v| v.len() as u64);
        assert_eq!(sized.capacity(), 0);
    }

    #[test]
    fn test_registry_replaces_same_name() {
        let mut registry = CacheRegistry::new();
        assert!(registry.register(Arc::new(EmptyDynamicCache::new("a"))).is_none());
        assert!(registry.register(Arc::new(EmptyDynamicCache::new("a"))).is_some());
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }
}
