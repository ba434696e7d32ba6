//! Sliding-window rate limiter for score-feed calls
//!
//! Keeps the timestamps of granted calls and refuses a new one once `max_calls`
//! fall inside the trailing window. One instance is built at startup and shared
//! by reference; it is never reset.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::RateLimitConfig;
use crate::error::{Result, SyncError};

pub struct RateLimiter {
    /// Grant timestamps, oldest first
    window_calls: Mutex<VecDeque<Instant>>,
    window: Duration,
    max_calls: u32,
    total_granted: AtomicU64,
    total_denied: AtomicU64,
}

impl RateLimiter {
    pub fn new(max_calls: u32, window: Duration) -> Self {
        Self {
            window_calls: Mutex::new(VecDeque::with_capacity(max_calls as usize)),
            window,
            max_calls,
            total_granted: AtomicU64::new(0),
            total_denied: AtomicU64::new(0),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(config.max_calls, config.window())
    }

    fn calls(&self) -> MutexGuard<'_, VecDeque<Instant>> {
        // The deque is always left consistent, so a poisoned lock is still usable
        self.window_calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn prune(calls: &mut VecDeque<Instant>, now: Instant, window: Duration) {
        while let Some(&oldest) = calls.front() {
            if now.duration_since(oldest) >= window {
                calls.pop_front();
            } else {
                break;
            }
        }
    }

    /// Check-and-record under one lock. On denial returns how long until the
    /// oldest call leaves the window.
    fn acquire_or_delay(&self) -> std::result::Result<(), Duration> {
        let now = Instant::now();
        let mut calls = self.calls();
        Self::prune(&mut calls, now, self.window);

        if calls.len() < self.max_calls as usize {
            calls.push_back(now);
            self.total_granted.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        }

        self.total_denied.fetch_add(1, Ordering::Relaxed);
        let delay = calls
            .front()
            .map(|&oldest| (oldest + self.window).saturating_duration_since(now))
            .unwrap_or(self.window);
        Err(delay.max(Duration::from_millis(1)))
    }

    /// Take a slot if one is free right now
    pub fn try_acquire(&self) -> bool {
        self.acquire_or_delay().is_ok()
    }

    /// Wait for a slot, giving up after `max_wait`
    pub async fn wait_until_available(&self, max_wait: Duration) -> Result<()> {
        let started = Instant::now();
        let deadline = started + max_wait;

        loop {
            let delay = match self.acquire_or_delay() {
                Ok(()) => return Ok(()),
                Err(delay) => delay,
            };

            let now = Instant::now();
            if now >= deadline {
                let waited_ms = now.duration_since(started).as_millis() as u64;
                warn!(
                    waited_ms,
                    max_calls = self.max_calls,
                    window_secs = self.window.as_secs(),
                    "Rate limiter slot not available in time"
                );
                return Err(SyncError::RateLimitTimeout { waited_ms });
            }

            let wake = (now + delay).min(deadline);
            debug!(
                delay_ms = wake.duration_since(now).as_millis() as u64,
                "Waiting for rate limiter slot"
            );
            tokio::time::sleep_until(wake).await;
        }
    }

    /// Calls recorded inside the current window
    pub fn current_rate(&self) -> usize {
        let now = Instant::now();
        let mut calls = self.calls();
        Self::prune(&mut calls, now, self.window);
        calls.len()
    }

    pub fn max_calls(&self) -> u32 {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn total_granted(&self) -> u64 {
        self.total_granted.load(Ordering::Relaxed)
    }

    pub fn total_denied(&self) -> u64 {
        self.total_denied.load(Ordering::Relaxed)
    }
}
