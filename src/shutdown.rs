//! Graceful shutdown coordination.
//!
//! HTTP handlers hold a [`RequestGuard`] while they run. On shutdown the
//! coordinator stops handing out guards, waits for the outstanding ones to
//! drop, and only then lets the caller unload the model.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::Notify;

/// Shutdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// Result of draining in-flight requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainResult {
    Complete,
    Timeout { remaining: u32 },
}

/// Tracks in-flight requests and the accept/drain/stop transition.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    state: Arc<RwLock<ShutdownState>>,
    in_flight: Arc<AtomicU32>,
    notify: Arc<Notify>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ShutdownState::Running)),
            in_flight: Arc::new(AtomicU32::new(0)),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.read()
    }

    pub fn is_accepting(&self) -> bool {
        self.state() == ShutdownState::Running
    }

    /// Register a request. Returns `None` once draining has begun.
    pub fn track(&self) -> Option<RequestGuard> {
        let state = self.state.read();
        if *state != ShutdownState::Running {
            return None;
        }
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Some(RequestGuard {
            counter: self.in_flight.clone(),
            notify: self.notify.clone(),
        })
    }

    pub fn in_flight_count(&self) -> u32 {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stop accepting requests and wait up to `timeout` for the tracked
    /// ones to finish.
    pub async fn drain(&self, timeout: Duration) -> DrainResult {
        *self.state.write() = ShutdownState::Draining;
        tracing::info!(in_flight = self.in_flight_count(), "draining requests");

        let result = self.wait_for_drain(timeout).await;
        *self.state.write() = ShutdownState::Stopped;

        match &result {
            DrainResult::Complete => tracing::info!("drain complete"),
            DrainResult::Timeout { remaining } => {
                tracing::warn!(remaining, "drain timed out with requests in flight")
            }
        }
        result
    }

    async fn wait_for_drain(&self, timeout: Duration) -> DrainResult {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            // Register interest before checking the count so a guard dropped
            // in between still wakes us.
            let notified = self.notify.notified();
            let count = self.in_flight_count();
            if count == 0 {
                return DrainResult::Complete;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                let remaining = self.in_flight_count();
                if remaining == 0 {
                    return DrainResult::Complete;
                }
                return DrainResult::Timeout { remaining };
            }
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII marker for one in-flight request.
pub struct RequestGuard {
    counter: Arc<AtomicU32>,
    notify: Arc<Notify>,
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}
