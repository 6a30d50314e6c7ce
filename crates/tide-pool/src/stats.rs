//! Pool statistics — lock-free counters and a serialisable snapshot.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Counters shared by the pool handle, dispatcher and workers.
#[derive(Debug, Default)]
pub struct PoolStats {
    submitted: AtomicU64,
    dispatched: AtomicU64,
    executed: AtomicU64,
    panicked: AtomicU64,
    discarded: AtomicU64,
    spawned: AtomicU64,
    retired: AtomicU64,
}

impl PoolStats {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_executed(&self, panicked: bool) {
        self.executed.fetch_add(1, Ordering::Relaxed);
        if panicked {
            self.panicked.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_discarded(&self, count: u64) {
        self.discarded.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_spawned(&self) {
        self.spawned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retired(&self) {
        self.retired.fetch_add(1, Ordering::Relaxed);
    }

    /// Capture the counters together with the live gauges.
    pub fn snapshot(&self, alive_workers: usize, pending: usize) -> PoolSnapshot {
        PoolSnapshot {
            alive_workers,
            pending,
            submitted: self.submitted.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            spawned: self.spawned.load(Ordering::Relaxed),
            retired: self.retired.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Workers currently holding a slot.
    pub alive_workers: usize,
    /// Work buffered in the relay, not yet pulled by the dispatcher.
    pub pending: usize,
    pub submitted: u64,
    /// Work handed to a worker.
    pub dispatched: u64,
    /// Work that ran to completion, including work that panicked.
    pub executed: u64,
    pub panicked: u64,
    /// Work dropped at shutdown without running.
    pub discarded: u64,
    /// Workers started over the pool's life, core workers included.
    pub spawned: u64,
    /// Workers that retired after idling above the core floor.
    pub retired: u64,
}

impl PoolSnapshot {
    /// Work accepted but not yet finished or discarded.
    pub fn outstanding(&self) -> u64 {
        self.submitted
            .saturating_sub(self.executed)
            .saturating_sub(self.discarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let stats = PoolStats::default();
        for _ in 0..5 {
            stats.record_submitted();
        }
        stats.record_dispatched();
        stats.record_dispatched();
        stats.record_executed(false);
        stats.record_executed(true);
        stats.record_discarded(2);
        stats.record_spawned();
        stats.record_retired();

        let snap = stats.snapshot(3, 1);
        assert_eq!(snap.alive_workers, 3);
        assert_eq!(snap.pending, 1);
        assert_eq!(snap.submitted, 5);
        assert_eq!(snap.dispatched, 2);
        assert_eq!(snap.executed, 2);
        assert_eq!(snap.panicked, 1);
        assert_eq!(snap.discarded, 2);
        assert_eq!(snap.spawned, 1);
        assert_eq!(snap.retired, 1);
        assert_eq!(snap.outstanding(), 1);
    }

    #[test]
    fn snapshot_serializes_to_json() {
        let snap = PoolStats::default().snapshot(2, 0);
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["alive_workers"], 2);
        assert_eq!(json["executed"], 0);
    }
}
