//! Graceful Shutdown Handler
//!
//! Cooperative cancellation for the sync loop: the in-flight step of a cycle
//! completes, remaining games are skipped, and the cycle is recorded as
//! interrupted before the driver exits.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use tracing::{info, warn};

/// Shutdown signal types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Normal graceful shutdown (SIGTERM, SIGINT)
    Graceful,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownSignal::Graceful => write!(f, "graceful"),
        }
    }
}

/// Shutdown phase tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownPhase {
    Running,
    /// Signal received; current cycle is winding down
    Draining,
    Complete,
}

impl std::fmt::Display for ShutdownPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownPhase::Running => write!(f, "running"),
            ShutdownPhase::Draining => write!(f, "draining"),
            ShutdownPhase::Complete => write!(f, "complete"),
        }
    }
}

/// Graceful shutdown coordinator
pub struct GracefulShutdown {
    shutdown_requested: AtomicBool,
    phase_tx: watch::Sender<ShutdownPhase>,
    phase_rx: watch::Receiver<ShutdownPhase>,
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (phase_tx, phase_rx) = watch::channel(ShutdownPhase::Running);
        Self {
            shutdown_requested: AtomicBool::new(false),
            phase_tx,
            phase_rx,
        }
    }

    /// Check if shutdown has been requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn current_phase(&self) -> ShutdownPhase {
        *self.phase_rx.borrow()
    }

    /// Request shutdown with specified signal type
    pub fn request_shutdown(&self, signal: ShutdownSignal) {
        if self.shutdown_requested.swap(true, Ordering::SeqCst) {
            warn!("Shutdown already requested, ignoring duplicate signal: {}", signal);
            return;
        }

        info!("Shutdown requested: {}", signal);
        self.set_phase(ShutdownPhase::Draining);
    }

    /// Mark the drain as finished
    pub fn complete(&self) {
        self.set_phase(ShutdownPhase::Complete);
    }

    fn set_phase(&self, phase: ShutdownPhase) {
        let _ = self.phase_tx.send(phase);
        info!("Shutdown phase: {}", phase);
    }

    /// Resolve once shutdown has been requested (immediately if it already was)
    pub async fn wait_for_shutdown(&self) {
        let mut rx = self.phase_rx.clone();
        while *rx.borrow_and_update() == ShutdownPhase::Running {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_request_is_idempotent() {
        let shutdown = GracefulShutdown::new();
        assert!(!shutdown.is_shutdown_requested());
        assert_eq!(shutdown.current_phase(), ShutdownPhase::Running);

        shutdown.request_shutdown(ShutdownSignal::Graceful);
        shutdown.request_shutdown(ShutdownSignal::Graceful);
        assert!(shutdown.is_shutdown_requested());
        assert_eq!(shutdown.current_phase(), ShutdownPhase::Draining);

        shutdown.complete();
        assert_eq!(shutdown.current_phase(), ShutdownPhase::Complete);
    }

    #[tokio::test]
    async fn test_wait_for_shutdown_wakes_waiter() {
        let shutdown = Arc::new(GracefulShutdown::new());
        let waiter = {
            let shutdown = Arc::clone(&shutdown);
            tokio::spawn(async move { shutdown.wait_for_shutdown().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        shutdown.request_shutdown(ShutdownSignal::Graceful);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();

        // Late waiters return immediately
        shutdown.wait_for_shutdown().await;
    }
}
