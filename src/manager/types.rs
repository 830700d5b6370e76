//! Public types for the cache manager.

use serde::Serialize;

use crate::allotment::CacheStats;
use crate::policy::ResizeOutcome;

/// Manager lifecycle state.
///
/// Use [`super::CacheManager::state()`] to check the current state or
/// [`super::CacheManager::state_receiver()`] to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Just created, capacities not yet assigned
    Created,
    /// Initial capacities assigned
    Started,
    /// Periodic resize loop running
    Running,
    /// Resize loop stopped
    Stopped,
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Started => write!(f, "Started"),
            Self::Running => write!(f, "Running"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Immutable view of the tree published after every resize pass.
#[derive(Debug, Clone, Default)]
pub struct AllotmentSnapshot {
    /// Resize pass that produced this snapshot (0 = initial)
    pub tick: u64,
    /// Memory estimate fed into the pipeline (`None` for entry-counted trees)
    pub available_memory: Option<u64>,
    /// Outcome of the pass (`None` before the first pass)
    pub outcome: Option<ResizeOutcome>,
    /// Per-node stats in pre-order
    pub stats: Vec<CacheStats>,
}

/// One row of a [`StatsReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRow {
    pub key: String,
    pub name: String,
    pub size: u64,
    pub capacity: u64,
    pub utilization_percent: f64,
}

impl From<&CacheStats> for StatsRow {
    fn from(stats: &CacheStats) -> Self {
        Self {
            key: stats.key.clone(),
            name: stats.name.clone(),
            size: stats.size,
            capacity: stats.capacity,
            utilization_percent: stats.utilization_percent(),
        }
    }
}

/// Result of [`super::CacheManager::stats()`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    /// Resize pass the capacities were captured after
    pub tick: u64,
    /// Pool seen before any resize policy adjusted it (byte trees only)
    pub raw_pool: Option<u64>,
    pub rows: Vec<StatsRow>,
}

impl StatsReport {
    /// Row with the given hierarchical key.
    #[must_use]
    pub fn row(&self, key: &str) -> Option<&StatsRow> {
        self.rows.iter().find(|row| row.key == key)
    }
}
