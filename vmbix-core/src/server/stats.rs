//! Counters shared between the worker pool and the status commands.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Live view of the admission queue and worker pool.
#[derive(Debug, Default)]
pub struct ServerStats {
    live_workers: AtomicUsize,
    queued: AtomicUsize,
    accepted: AtomicU64,
}

impl ServerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Workers currently alive (idle or active).
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::Acquire)
    }

    /// Accepted connections not yet claimed by a worker.
    pub fn queue_depth(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Connections accepted since startup, rejected ones included.
    pub fn accepted(&self) -> u64 {
        self.accepted.load(Ordering::Acquire)
    }

    pub(crate) fn set_live_workers(&self, count: usize) {
        self.live_workers.store(count, Ordering::Release);
    }

    pub(crate) fn set_queue_depth(&self, depth: usize) {
        self.queued.store(depth, Ordering::Release);
    }

    pub(crate) fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::AcqRel);
    }
}
