// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Ready-made stream-info cache trees.
//!
//! Two LRU caches keyed by stream id sit under one `"StreamInfo"` composite:
//! the last event number of each stream and its metadata. They are either
//! sized statically in entries, or dynamically in bytes with a 60/40 split.

use std::hash::Hash;
use std::sync::Arc;

use crate::allotment::{Allotment, Unit};
use crate::cache::LruCache;
use crate::error::AllotmentError;

pub const STREAM_INFO: &str = "StreamInfo";
pub const LAST_EVENT_NUMBER: &str = "LastEventNumber";
pub const METADATA: &str = "Metadata";

/// Combined floor of the dynamic preset (100 MB).
pub const DYNAMIC_MIN_CAPACITY: u64 = 100_000_000;
/// Combined ceiling of the dynamic preset, before the 40% of memory cap (16 GB).
pub const DYNAMIC_MAX_CAPACITY: u64 = 16_000_000_000;

/// Stream-info caches and the allotment subtree governing them.
pub struct StreamInfoCaches<K, L, M> {
    pub last_event_number: Arc<LruCache<K, L>>,
    pub metadata: Arc<LruCache<K, M>>,
    pub allotment: Allotment,
}

/// Both caches hold exactly `capacity` entries.
pub fn stream_info_static<K, L, M>(capacity: u64) -> Result<StreamInfoCaches<K, L, M>, AllotmentError>
where
    K: Hash + Eq + Send + 'static,
    L: Send + 'static,
    M: Send + 'static,
{
    let last_event_number = Arc::new(LruCache::new(LAST_EVENT_NUMBER, capacity));
    let metadata = Arc::new(LruCache::new(METADATA, capacity));

    let allotment = Allotment::composite(
        STREAM_INFO,
        100,
        vec![
            Allotment::fixed(LAST_EVENT_NUMBER, Unit::Entries, capacity, last_event_number.clone()),
            Allotment::fixed(METADATA, Unit::Entries, capacity, metadata.clone()),
        ],
    )?;

    Ok(StreamInfoCaches {
        last_event_number,
        metadata,
        allotment,
    })
}

/// Byte-sized caches sharing their parent's pool 60/40.
///
/// Each cache gets half of the combined bounds: a 100 MB floor and a ceiling
/// of `min(16 GB, 40% of total_memory)`. `key_heap_size` and
/// `metadata_heap_size` report the heap bytes referenced by a key or a
/// metadata value.
pub fn stream_info_dynamic<K, L, M>(
    total_memory: u64,
    key_heap_size: impl Fn(&K) -> u64 + Send + Sync + 'static,
    metadata_heap_size: impl Fn(&M) -> u64 + Send + Sync + 'static,
) -> Result<StreamInfoCaches<K, L, M>, AllotmentError>
where
    K: Hash + Eq + Send + 'static,
    L: Send + 'static,
    M: Send + 'static,
{
    let key_heap_size = Arc::new(key_heap_size);

    let key_size = Arc::clone(&key_heap_size);
    let last_event_number = Arc::new(LruCache::with_sizer(LAST_EVENT_NUMBER, 0, move |key: &K, _: &L| {
        LruCache::<K, L>::approximate_item_size((*key_size)(key), 0)
    }));

    let key_size = key_heap_size;
    let metadata = Arc::new(LruCache::with_sizer(METADATA, 0, move |key: &K, value: &M| {
        LruCache::<K, M>::approximate_item_size((*key_size)(key), metadata_heap_size(value))
    }));

    let max_capacity = DYNAMIC_MAX_CAPACITY.min(total_memory / 10 * 4);
    let min_per_cache = DYNAMIC_MIN_CAPACITY / 2;
    let max_per_cache = max_capacity / 2;

    let allotment = Allotment::composite(
        STREAM_INFO,
        100,
        vec![
            Allotment::dynamic_bounded(
                LAST_EVENT_NUMBER,
                Unit::Bytes,
                60,
                min_per_cache,
                max_per_cache.max(min_per_cache),
                last_event_number.clone(),
            )?,
            Allotment::dynamic_bounded(
                METADATA,
                Unit::Bytes,
                40,
                min_per_cache,
                max_per_cache.max(min_per_cache),
                metadata.clone(),
            )?,
        ],
    )?;

    Ok(StreamInfoCaches {
        last_event_number,
        metadata,
        allotment,
    })
}

impl<K, L, M> std::fmt::Debug for StreamInfoCaches<K, L, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamInfoCaches")
            .field("allotment", &self.allotment)
            .finish()
    }
}
