//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Give every accepted socket an id for log correlation
//! - Count live connections (and mirror the count into a gauge)
//! - Let shutdown wait for the count to reach zero, with a deadline

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use crate::observability::metrics;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection, rendered as `conn-N`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Shared {
    active: AtomicU64,
    idle: Notify,
}

/// Counts live connections so shutdown can drain them.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    shared: Arc<Shared>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection. The guard decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        let now = self.shared.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_connections(now);
        ConnectionGuard {
            shared: Arc::clone(&self.shared),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Wait until every tracked connection has closed or `grace` elapses.
    ///
    /// Returns the number of connections still open when it gave up.
    pub async fn drain(&self, grace: Duration) -> u64 {
        let wait = async {
            loop {
                let idle = self.shared.idle.notified();
                if self.active_count() == 0 {
                    return;
                }
                idle.await;
            }
        };

        match tokio::time::timeout(grace, wait).await {
            Ok(()) => 0,
            Err(_) => self.active_count(),
        }
    }
}

/// Holds one slot in the tracker for the lifetime of a connection.
#[derive(Debug)]
pub struct ConnectionGuard {
    shared: Arc<Shared>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let left = self.shared.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_connections(left);
        if left == 0 {
            self.shared.idle.notify_waiters();
        }
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
