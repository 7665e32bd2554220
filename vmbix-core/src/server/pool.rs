//! Admission queue and self-scaling worker pool.
//!
//! `submit` appends a job unless `capacity` jobs are already waiting, and
//! spawns a worker whenever the backlog exceeds the live worker count. Workers
//! claim jobs oldest first. An idle worker waits on a `Notify` for at most
//! `claim_interval` per round, accumulating idle time, and retires once it has
//! been idle for `idle_limit`. The pool thus grows with backlog and shrinks to
//! zero when quiet.
//!
//! Queue contents and the live worker count change together under one lock,
//! so a job is never stranded between a retiring worker and a new submission.

use super::stats::ServerStats;
use crate::observability::metrics as vmbix_metrics;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Back-off between claim attempts of an idle worker.
pub const CLAIM_INTERVAL: Duration = Duration::from_millis(10);

/// Idle time after which a worker retires.
pub const IDLE_LIMIT: Duration = Duration::from_millis(2000);

/// Processes one claimed job.
#[async_trait]
pub trait JobHandler<T>: Send + Sync + 'static {
    async fn handle(&self, job: T);
}

/// Returned by `submit` when the queue is full; carries the job back so the
/// caller can close it.
#[derive(Debug)]
pub struct Rejected<T>(pub T);

struct PoolState<T> {
    pending: VecDeque<T>,
    live_workers: usize,
}

pub struct WorkerPool<T> {
    state: Mutex<PoolState<T>>,
    capacity: usize,
    claim_interval: Duration,
    idle_limit: Duration,
    notify: Notify,
    handler: Arc<dyn JobHandler<T>>,
    stats: Arc<ServerStats>,
}

impl<T: Send + 'static> WorkerPool<T> {
    pub fn new(capacity: usize, handler: Arc<dyn JobHandler<T>>, stats: Arc<ServerStats>) -> Arc<Self> {
        Self::with_timing(capacity, handler, stats, CLAIM_INTERVAL, IDLE_LIMIT)
    }

    pub fn with_timing(
        capacity: usize,
        handler: Arc<dyn JobHandler<T>>,
        stats: Arc<ServerStats>,
        claim_interval: Duration,
        idle_limit: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PoolState { pending: VecDeque::new(), live_workers: 0 }),
            capacity,
            claim_interval,
            idle_limit,
            notify: Notify::new(),
            handler,
            stats,
        })
    }

    /// Queue a job. Counts it as accepted even when rejected.
    pub fn submit(self: &Arc<Self>, job: T) -> Result<(), Rejected<T>> {
        self.stats.record_accepted();
        vmbix_metrics::record_accepted();

        let spawn = {
            let mut state = self.state.lock();
            if state.pending.len() >= self.capacity {
                drop(state);
                warn!(capacity = self.capacity, "Maximum concurrent connections reached");
                vmbix_metrics::record_rejected();
                return Err(Rejected(job));
            }
            state.pending.push_back(job);
            self.stats.set_queue_depth(state.pending.len());

            let spawn = state.pending.len() > state.live_workers;
            if spawn {
                state.live_workers += 1;
                self.stats.set_live_workers(state.live_workers);
                vmbix_metrics::set_workers(state.live_workers);
            }
            spawn
        };

        if spawn {
            let pool = Arc::clone(self);
            tokio::spawn(async move { pool.run_worker().await });
        } else {
            self.notify.notify_one();
        }
        Ok(())
    }

    /// Pop the oldest waiting job.
    pub fn claim(&self) -> Option<T> {
        let mut state = self.state.lock();
        let job = state.pending.pop_front();
        self.stats.set_queue_depth(state.pending.len());
        job
    }

    pub fn live_workers(&self) -> usize {
        self.state.lock().live_workers
    }

    pub fn queue_depth(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Retire the calling worker unless work arrived meanwhile.
    fn try_retire(&self) -> bool {
        let mut state = self.state.lock();
        if !state.pending.is_empty() {
            return false;
        }
        state.live_workers -= 1;
        self.stats.set_live_workers(state.live_workers);
        vmbix_metrics::set_workers(state.live_workers);
        true
    }

    /// Run one job on its own task; a panicking handler costs the job only.
    async fn run_job(&self, job: T) {
        let handler = Arc::clone(&self.handler);
        if let Err(e) = tokio::spawn(async move { handler.handle(job).await }).await {
            error!(error = %e, "Job failed");
        }
    }

    async fn run_worker(self: Arc<Self>) {
        debug!("Worker started");
        let mut idle = Duration::ZERO;
        loop {
            if let Some(job) = self.claim() {
                idle = Duration::ZERO;
                self.run_job(job).await;
                continue;
            }

            if idle >= self.idle_limit {
                if self.try_retire() {
                    break;
                }
                continue;
            }

            if tokio::time::timeout(self.claim_interval, self.notify.notified()).await.is_err() {
                idle += self.claim_interval;
            }
        }
        debug!(idle_ms = idle.as_millis() as u64, "Worker retired");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records handled jobs; each job takes `delay`.
    struct Recorder {
        handled: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl JobHandler<u32> for Recorder {
        async fn handle(&self, _job: u32) {
            tokio::time::sleep(self.delay).await;
            self.handled.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn pool(capacity: usize, delay: Duration) -> (Arc<WorkerPool<u32>>, Arc<Recorder>, Arc<ServerStats>) {
        let recorder = Arc::new(Recorder { handled: AtomicUsize::new(0), delay });
        let stats = Arc::new(ServerStats::new());
        let pool = WorkerPool::with_timing(
            capacity,
            recorder.clone(),
            stats.clone(),
            Duration::from_millis(5),
            Duration::from_millis(100),
        );
        (pool, recorder, stats)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..400 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test]
    async fn test_rejects_beyond_capacity() {
        // Nothing gets claimed before we finish submitting on this thread.
        let (pool, _, stats) = pool(3, Duration::from_millis(200));
        let results: Vec<bool> = (0..5).map(|i| pool.submit(i).is_ok()).collect();

        assert_eq!(results, vec![true, true, true, false, false]);
        assert_eq!(stats.accepted(), 5);
    }

    #[tokio::test]
    async fn test_rejected_job_is_returned() {
        let (pool, _, _) = pool(1, Duration::from_millis(200));
        pool.submit(1).unwrap();
        let Rejected(job) = pool.submit(2).unwrap_err();
        assert_eq!(job, 2);
    }

    #[tokio::test]
    async fn test_burst_spawns_workers_and_drains() {
        let (pool, recorder, _) = pool(50, Duration::from_millis(20));
        for i in 0..20 {
            pool.submit(i).unwrap();
        }
        // Every submission outran the live workers, so each spawned one.
        assert_eq!(pool.live_workers(), 20);

        wait_until(|| recorder.handled.load(Ordering::SeqCst) == 20).await;
        assert_eq!(pool.queue_depth(), 0);
    }

    /// Panics on job 0, counts the rest.
    struct Fragile {
        handled: AtomicUsize,
    }

    #[async_trait]
    impl JobHandler<u32> for Fragile {
        async fn handle(&self, job: u32) {
            if job == 0 {
                panic!("handler blew up");
            }
            self.handled.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_panicking_job_keeps_worker_alive() {
        let fragile = Arc::new(Fragile { handled: AtomicUsize::new(0) });
        let pool = WorkerPool::with_timing(
            10,
            fragile.clone(),
            Arc::new(ServerStats::new()),
            Duration::from_millis(5),
            Duration::from_millis(100),
        );

        pool.submit(0).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(pool.live_workers(), 1);

        pool.submit(1).unwrap();
        pool.submit(2).unwrap();
        wait_until(|| fragile.handled.load(Ordering::SeqCst) == 2).await;
        assert_eq!(pool.queue_depth(), 0);

        wait_until(|| pool.live_workers() == 0).await;
    }

    #[tokio::test]
    async fn test_idle_workers_retire() {
        let (pool, recorder, stats) = pool(10, Duration::ZERO);
        for i in 0..4 {
            pool.submit(i).unwrap();
        }
        wait_until(|| recorder.handled.load(Ordering::SeqCst) == 4).await;
        wait_until(|| pool.live_workers() == 0).await;
        assert_eq!(stats.live_workers(), 0);

        // A retired pool comes back on demand.
        pool.submit(99).unwrap();
        wait_until(|| recorder.handled.load(Ordering::SeqCst) == 5).await;
    }
}
