use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of a map's operation counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapStats {
    /// Entries added through `insert` or `set`.
    pub inserts: u64,
    /// Entries removed through `remove` or `clear`.
    pub removals: u64,
    /// Completed scavenge passes, explicit or reaper-driven.
    pub scavenge_passes: u64,
    /// Expired entries dropped by scavenge passes and iteration cleanup.
    pub entries_reaped: u64,
    /// Reaper ticks that found the map lock contended and deferred.
    pub deferred_sweeps: u64,
}

/// Shared atomic counters behind `MapStats`. Counters are advisory and use
/// relaxed ordering; the map lock is what orders the operations themselves.
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    inserts: AtomicU64,
    removals: AtomicU64,
    scavenge_passes: AtomicU64,
    entries_reaped: AtomicU64,
    deferred_sweeps: AtomicU64,
}

impl StatCounters {
    pub(crate) fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removals(&self, n: usize) {
        self.removals.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_scavenge(&self) {
        self.scavenge_passes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reaped(&self, n: usize) {
        self.entries_reaped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_deferred_sweep(&self) {
        self.deferred_sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MapStats {
        MapStats {
            inserts: self.inserts.load(Ordering::Relaxed),
            removals: self.removals.load(Ordering::Relaxed),
            scavenge_passes: self.scavenge_passes.load(Ordering::Relaxed),
            entries_reaped: self.entries_reaped.load(Ordering::Relaxed),
            deferred_sweeps: self.deferred_sweeps.load(Ordering::Relaxed),
        }
    }
}
