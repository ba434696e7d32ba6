pub mod adapters;
pub mod cli;
pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod matching;
pub mod sync;

pub use config::AppConfig;
pub use coordination::{GracefulShutdown, RateLimiter, ShutdownSignal};
pub use error::{Result, SyncError};
pub use matching::{TeamAliasDatabase, TeamMatcher, TeamNameExtractor};
pub use sync::{PollScheduler, SyncDriver, SyncOrchestrator};
