//! Manager lifecycle: start, tick, run loop, shutdown.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use crate::allotment::Unit;
use crate::error::ManagerError;
use crate::policy::ResizeOutcome;

use super::{CacheManager, ManagerState};

impl CacheManager {
    /// Assign initial capacities.
    ///
    /// Byte trees get one synchronous resize pass; entry trees get their
    /// one-shot calculation. Every node's resulting capacity is logged.
    #[tracing::instrument(skip(self), fields(unit = %self.unit()))]
    pub fn start(&self) -> Result<(), ManagerError> {
        if self.started.swap(true, Ordering::AcqRel) {
            return Err(ManagerError::AlreadyStarted);
        }

        let outcome = self.resize_now();
        for node in &self.snapshot().stats {
            info!(key = %node.key, capacity = node.capacity, size = node.size, "Cache capacity assigned");
        }

        self.set_state(ManagerState::Started);
        info!(outcome = outcome.label(), "Cache manager started");
        Ok(())
    }

    /// Run one resize pass on the blocking pool.
    ///
    /// Entry-counted trees are not resized periodically and return
    /// [`ResizeOutcome::Unmanaged`] without touching the tree.
    pub async fn tick(&self) -> Result<ResizeOutcome, ManagerError> {
        if self.inner.unit == Unit::Entries {
            return Ok(ResizeOutcome::Unmanaged);
        }

        let tick = self.inner.next_tick();
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || inner.resize(tick)).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                let reason = fault_reason(e);
                error!(tick, available = ?self.inner.raw_pool.get(), reason = %reason, "Resize pass faulted");
                crate::metrics::record_tick_failure();
                Err(ManagerError::ResizeFaulted { tick, reason })
            }
        }
    }

    /// Resize every interval until [`Self::shutdown`] is called.
    ///
    /// Each pass completes before the next interval starts, and a faulted
    /// pass does not stop the loop.
    #[tracing::instrument(skip(self))]
    pub async fn run(&self) {
        let mut shutdown = self.shutdown.subscribe();
        if *shutdown.borrow_and_update() {
            return;
        }

        self.set_state(ManagerState::Running);
        info!(interval_ms = self.interval.as_millis() as u64, "Cache manager running");

        loop {
            tokio::select! {
                _ = shutdown.changed() => break,

                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.tick().await {
                        warn!(error = %e, "Resize tick failed, retrying next interval");
                    }
                }
            }
        }

        self.set_state(ManagerState::Stopped);
        info!(ticks = self.ticks(), "Cache manager stopped");
    }

    /// Run the resize loop on the current tokio runtime.
    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run().await })
    }

    /// Stop the resize loop after any in-flight pass completes.
    pub fn shutdown(&self) {
        info!("Initiating cache manager shutdown");
        self.shutdown.send_replace(true);
        if self.state() != ManagerState::Running {
            self.set_state(ManagerState::Stopped);
        }
    }
}

fn fault_reason(e: JoinError) -> String {
    if !e.is_panic() {
        return e.to_string();
    }
    let payload = e.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "resize panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;
    use std::time::Duration;

    use super::*;
    use crate::allotment::testing::stub;
    use crate::allotment::Allotment;
    use crate::config::AllotmentConfig;
    use crate::policy::ThrottleMode;
    use crate::probe::FnProbe;

    fn manager(interval_ms: u64) -> (Arc<CacheManager>, Arc<AtomicU64>) {
        let free = Arc::new(AtomicU64::new(1_000_000));
        let reader = free.clone();
        let tree = Allotment::dynamic("Chunks", Unit::Bytes, 60, 0, stub("Chunks", 0)).unwrap();
        let config = AllotmentConfig {
            keep_free_bytes: 0,
            keep_free_percent: 0,
            monitoring_interval_ms: interval_ms,
            total_memory_bytes: Some(10_000_000),
            growth_throttle: ThrottleMode::Unthrottled,
            ..Default::default()
        };
        let probe = FnProbe::new(10_000_000, move || reader.fetch_add(1_000, Ordering::SeqCst));
        (Arc::new(CacheManager::new(&config, tree, Arc::new(probe)).unwrap()), free)
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let (manager, _) = manager(1_000);
        manager.start().unwrap();
        assert_eq!(manager.state(), ManagerState::Started);
        assert!(matches!(manager.start(), Err(ManagerError::AlreadyStarted)));
        assert_eq!(manager.ticks(), 1);
    }

    #[tokio::test]
    async fn test_tick_runs_on_blocking_pool() {
        let (manager, _) = manager(1_000);
        manager.start().unwrap();
        let outcome = manager.tick().await.unwrap();
        assert!(outcome.is_applied());
        assert_eq!(manager.stats().tick, 2);
    }

    #[tokio::test]
    async fn test_run_ticks_until_shutdown() {
        let (manager, _) = manager(10);
        manager.start().unwrap();
        let mut states = manager.state_receiver();

        let handle = manager.spawn();
        states.wait_for(|state| *state == ManagerState::Running).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        manager.shutdown();
        handle.await.unwrap();
        assert_eq!(manager.state(), ManagerState::Stopped);
        assert!(manager.ticks() > 2);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_returns_immediately() {
        let (manager, _) = manager(10);
        manager.shutdown();
        assert_eq!(manager.state(), ManagerState::Stopped);
        manager.run().await;
        assert_eq!(manager.ticks(), 0);
    }

    #[test]
    fn test_fault_reason_from_panic() {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let err = rt
            .block_on(async { tokio::task::spawn_blocking(|| -> () { panic!("cache exploded") }).await })
            .unwrap_err();
        assert_eq!(fault_reason(err), "cache exploded");
    }
}
