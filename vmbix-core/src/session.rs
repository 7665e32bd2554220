//! Session supervisor: owns the process-wide remote session.
//!
//! The live session, navigator and performance accessor are published as one
//! immutable `SessionHandle` behind an `Arc`. Readers take a snapshot with
//! `current()` and use it for the whole request; `reconnect()` swaps in a new
//! handle atomically, so nobody ever pairs a stale navigator with a fresh
//! session.
//!
//! Reconnects are serialized by an async mutex. A caller that waited on the
//! mutex while another caller reconnected (or failed to) reuses that outcome
//! instead of reconnecting a second time.

use crate::adapters::{
    ConnectTarget, Connector, InventoryNavigator, PerformanceAccessor, RemoteSession, SessionParts,
};
use crate::error::Result;
use crate::observability::metrics as vmbix_metrics;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, instrument, warn};

/// One consistent snapshot of the remote session.
pub struct SessionHandle {
    /// Increases by one with every successful connect.
    pub generation: u64,
    pub session: Arc<dyn RemoteSession>,
    pub navigator: Arc<dyn InventoryNavigator>,
    pub performance: Arc<dyn PerformanceAccessor>,
}

impl SessionHandle {
    fn new(generation: u64, parts: SessionParts) -> Self {
        Self {
            generation,
            session: parts.session,
            navigator: parts.navigator,
            performance: parts.performance,
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("generation", &self.generation).finish()
    }
}

/// Outcome of the last failed reconnect, used to fold concurrent callers.
#[derive(Debug, Clone, Copy)]
struct FailedAttempt {
    generation: u64,
    finished_at: Instant,
}

pub struct SessionSupervisor {
    connector: Arc<dyn Connector>,
    target: ConnectTarget,
    current: RwLock<Arc<SessionHandle>>,
    reconnect_lock: tokio::sync::Mutex<()>,
    last_failure: Mutex<Option<FailedAttempt>>,
    attempts: AtomicU64,
}

impl SessionSupervisor {
    /// Open the initial session. Failure here is fatal to the daemon.
    #[instrument(skip(connector, target), fields(connector = connector.name(), url = %target.url))]
    pub async fn connect(connector: Arc<dyn Connector>, target: ConnectTarget) -> Result<Self> {
        let parts = connector.connect(&target).await?;
        info!(username = %target.username, "Connected to management endpoint");

        Ok(Self {
            connector,
            target,
            current: RwLock::new(Arc::new(SessionHandle::new(1, parts))),
            reconnect_lock: tokio::sync::Mutex::new(()),
            last_failure: Mutex::new(None),
            attempts: AtomicU64::new(0),
        })
    }

    /// Snapshot of the live session.
    pub fn current(&self) -> Arc<SessionHandle> {
        self.current.read().clone()
    }

    /// Number of reconnect attempts actually sent to the endpoint.
    pub fn reconnect_attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Replace the session observed dead by the caller.
    ///
    /// Returns the handle to use afterwards: the new one on success, or the
    /// unchanged current one if the attempt failed. Never raises; failures are
    /// logged and the caller's lookup simply comes back empty.
    pub async fn reconnect(&self, observed: &SessionHandle) -> Arc<SessionHandle> {
        let waiting_since = Instant::now();
        let _guard = self.reconnect_lock.lock().await;

        let current = self.current();
        if current.generation != observed.generation {
            info!(generation = current.generation, "Session already replaced, reusing it");
            return current;
        }
        let last_failure = *self.last_failure.lock();
        if let Some(failed) = last_failure {
            if failed.generation == observed.generation && failed.finished_at > waiting_since {
                warn!("Concurrent reconnect attempt just failed, not retrying");
                return current;
            }
        }

        self.attempts.fetch_add(1, Ordering::Relaxed);
        warn!(generation = observed.generation, "Reconnecting to management endpoint");

        match self.connector.connect(&self.target).await {
            Ok(parts) => {
                let fresh = Arc::new(SessionHandle::new(observed.generation + 1, parts));
                *self.current.write() = fresh.clone();
                *self.last_failure.lock() = None;
                vmbix_metrics::record_reconnect(true);
                info!(generation = fresh.generation, "Reconnected to management endpoint");
                // Release the old session; it is already unusable for us.
                if let Err(e) = observed.session.logout().await {
                    warn!(error = %e, "Logout of replaced session failed");
                }
                fresh
            }
            Err(e) => {
                *self.last_failure.lock() = Some(FailedAttempt {
                    generation: observed.generation,
                    finished_at: Instant::now(),
                });
                vmbix_metrics::record_reconnect(false);
                error!(error = %e, "Reconnect failed");
                current
            }
        }
    }

    /// Log out of the live session. Best-effort.
    pub async fn shutdown(&self) {
        let handle = self.current();
        match handle.session.logout().await {
            Ok(()) => info!("Logged out of management endpoint"),
            Err(e) => warn!(error = %e, "Logout failed during shutdown"),
        }
    }
}
