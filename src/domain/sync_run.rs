use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::SyncStatus;

/// Game record counts for one cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub inserted: u32,
    pub updated: u32,
    pub skipped: u32,
    pub errored: u32,
}

/// Summary of one sync cycle. Written once, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub counts: SyncCounts,
    /// Contracts linked to a game during this cycle
    pub contracts_matched: u32,
    /// Contracts still without a game after this cycle
    pub contracts_unmatched: u32,
    /// Rate-limited score-feed calls issued
    pub upstream_calls: u32,
    pub duration_ms: u64,
    pub status: SyncStatus,
    pub error: Option<String>,
}

/// Accumulates cycle results; consumed into an immutable [`SyncRun`]
#[derive(Debug, Clone)]
pub struct SyncRunBuilder {
    started_at: DateTime<Utc>,
    pub counts: SyncCounts,
    pub contracts_matched: u32,
    pub contracts_unmatched: u32,
    pub upstream_calls: u32,
    degraded: bool,
    interrupted: bool,
    notes: Vec<String>,
}

impl SyncRunBuilder {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            counts: SyncCounts::default(),
            contracts_matched: 0,
            contracts_unmatched: 0,
            upstream_calls: 0,
            degraded: false,
            interrupted: false,
            notes: Vec::new(),
        }
    }

    /// Part of the cycle did not complete; status becomes partial
    pub fn degrade(&mut self, note: impl Into<String>) {
        self.degraded = true;
        self.notes.push(note.into());
    }

    pub fn interrupt(&mut self) {
        self.interrupted = true;
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted
    }

    fn status(&self) -> SyncStatus {
        if self.interrupted {
            SyncStatus::Interrupted
        } else if self.degraded {
            SyncStatus::Partial
        } else {
            SyncStatus::Success
        }
    }

    fn error_note(&self) -> Option<String> {
        (!self.notes.is_empty()).then(|| self.notes.join("; "))
    }

    pub fn finish(&self, duration_ms: u64) -> SyncRun {
        SyncRun {
            id: Uuid::new_v4(),
            started_at: self.started_at,
            counts: self.counts,
            contracts_matched: self.contracts_matched,
            contracts_unmatched: self.contracts_unmatched,
            upstream_calls: self.upstream_calls,
            duration_ms,
            status: self.status(),
            error: self.error_note(),
        }
    }

    /// Record for a cycle whose commit failed
    pub fn finish_failed(&self, duration_ms: u64, error: &str) -> SyncRun {
        let mut run = self.finish(duration_ms);
        run.status = SyncStatus::Failed;
        run.error = Some(match self.error_note() {
            Some(notes) => format!("{error}; {notes}"),
            None => error.to_string(),
        });
        run
    }
}
