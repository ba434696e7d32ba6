//! Sync loop
//!
//! - `scheduler`: per-game poll timing
//! - `orchestrator`: one full fetch, match and commit cycle
//! - `driver`: periodic ticks with skip-if-running

pub mod driver;
pub mod orchestrator;
pub mod scheduler;

pub use driver::{SyncDriver, TriggerOutcome};
pub use orchestrator::{Collaborators, SyncOrchestrator};
pub use scheduler::PollScheduler;
