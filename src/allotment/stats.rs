// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use serde::Serialize;

/// Joins a parent key and a node name into a hierarchical key.
pub const KEY_SEPARATOR: &str = "-";

/// Build the stats key of `name` under `parent_key`.
#[must_use]
pub fn child_key(parent_key: &str, name: &str) -> String {
    if parent_key.is_empty() {
        name.to_string()
    } else {
        format!("{parent_key}{KEY_SEPARATOR}{name}")
    }
}

/// Immutable per-node statistics record.
///
/// `key` carries the node's path from the root so a flat list of records
/// still describes the shape of the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub key: String,
    pub name: String,
    pub capacity: u64,
    pub size: u64,
}

impl CacheStats {
    #[must_use]
    pub fn new(key: String, name: impl Into<String>, capacity: u64, size: u64) -> Self {
        Self {
            key,
            name: name.into(),
            capacity,
            size,
        }
    }

    /// Size as a percentage of capacity (0 when capacity is 0).
    #[must_use]
    pub fn utilization_percent(&self) -> f64 {
        if self.capacity == 0 {
            0.0
        } else {
            self.size as f64 * 100.0 / self.capacity as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_key_joins_with_separator() {
        assert_eq!(child_key("", "root"), "root");
        assert_eq!(child_key("root", "cache"), "root-cache");
        assert_eq!(child_key("root-cache", "StreamInfo"), "root-cache-StreamInfo");
    }

    #[test]
    fn test_utilization() {
        let stats = CacheStats::new("a".into(), "a", 200, 50);
        assert_eq!(stats.utilization_percent(), 25.0);

        let empty = CacheStats::new("b".into(), "b", 0, 0);
        assert_eq!(empty.utilization_percent(), 0.0);
    }
}
