//! Periodic driver around the orchestrator
//!
//! A tick that fires while a cycle is still running is skipped rather than
//! queued, so at most one cycle is ever in flight.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::coordination::GracefulShutdown;
use crate::domain::SyncRun;
use crate::error::Result;

use super::orchestrator::SyncOrchestrator;

/// Result of asking the driver for a cycle
#[derive(Debug)]
pub enum TriggerOutcome {
    Completed(SyncRun),
    /// Another cycle held the orchestrator
    Skipped,
}

#[derive(Clone)]
pub struct SyncDriver {
    orchestrator: Arc<Mutex<SyncOrchestrator>>,
    shutdown: Arc<GracefulShutdown>,
    tick: Duration,
}

impl SyncDriver {
    pub fn new(
        orchestrator: SyncOrchestrator,
        shutdown: Arc<GracefulShutdown>,
        tick: Duration,
    ) -> Self {
        Self {
            orchestrator: Arc::new(Mutex::new(orchestrator)),
            shutdown,
            tick,
        }
    }

    pub fn orchestrator(&self) -> Arc<Mutex<SyncOrchestrator>> {
        Arc::clone(&self.orchestrator)
    }

    /// Run one cycle now, unless one is already running
    pub async fn trigger(&self) -> Result<TriggerOutcome> {
        let Ok(mut orchestrator) = self.orchestrator.try_lock() else {
            debug!("Cycle already in progress; trigger skipped");
            return Ok(TriggerOutcome::Skipped);
        };
        let run = orchestrator.run_cycle(Utc::now()).await?;
        Ok(TriggerOutcome::Completed(run))
    }

    /// Tick until shutdown. Cycle errors are logged and the loop carries on;
    /// the failed cycle is retried on a later tick.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(tick_secs = self.tick.as_secs(), "Sync driver started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.wait_for_shutdown() => break,
            }
            if self.shutdown.is_shutdown_requested() {
                break;
            }

            match self.trigger().await {
                Ok(TriggerOutcome::Completed(run)) => {
                    debug!(run_id = %run.id, status = %run.status, "Tick complete");
                }
                Ok(TriggerOutcome::Skipped) => {
                    warn!("Previous cycle still running; tick skipped");
                }
                Err(e) => {
                    error!(error = %e, "Sync cycle failed");
                }
            }
        }

        self.shutdown.complete();
        info!("Sync driver stopped");
    }
}
