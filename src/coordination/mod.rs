//! Coordination Layer
//!
//! Process-wide pieces shared by the sync loop:
//! - Sliding-window rate limiter for score-feed calls
//! - Graceful shutdown handling

pub mod rate_limiter;
pub mod shutdown;

pub use rate_limiter::RateLimiter;
pub use shutdown::{GracefulShutdown, ShutdownPhase, ShutdownSignal};
