use serde::{Deserialize, Serialize};
use std::fmt;

/// Game lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Not started yet
    Scheduled,
    /// Clock running
    Live,
    /// Between periods, halftime, weather delay
    Intermission,
    /// Final, or ended early (forfeit, postponement, cancellation)
    Completed,
}

impl GameStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameStatus::Scheduled => "SCHEDULED",
            GameStatus::Live => "LIVE",
            GameStatus::Intermission => "INTERMISSION",
            GameStatus::Completed => "COMPLETED",
        }
    }

    /// Check if this status can move to another status.
    ///
    /// Same-status is always allowed. Nothing leaves `Completed`.
    pub fn can_transition_to(&self, target: GameStatus) -> bool {
        use GameStatus::*;

        match (self, target) {
            (a, b) if *a == b => true,

            // Any state may end directly (forfeit, postponement)
            (Scheduled | Live | Intermission, Completed) => true,

            (Scheduled, Live) => true,
            // Start plus first break both missed between two polls
            (Scheduled, Intermission) => true,

            (Live, Intermission) => true,
            (Intermission, Live) => true,

            _ => false,
        }
    }

    /// Get valid next states from current state
    pub fn valid_transitions(&self) -> Vec<GameStatus> {
        use GameStatus::*;

        match self {
            Scheduled => vec![Live, Intermission, Completed],
            Live => vec![Intermission, Completed],
            Intermission => vec![Live, Completed],
            Completed => vec![],
        }
    }

    pub fn is_in_play(&self) -> bool {
        matches!(self, GameStatus::Live | GameStatus::Intermission)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, GameStatus::Completed)
    }

    /// Parse a score-feed status string.
    ///
    /// Accepts both bare names and the `STATUS_` prefixed form. The flag is set
    /// when the feed reports an early end (forfeit, postponement, cancellation).
    pub fn from_feed(text: &str) -> Option<(GameStatus, bool)> {
        let upper = text.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        let name = upper.strip_prefix("STATUS_").unwrap_or(&upper);

        let parsed = match name {
            "SCHEDULED" | "PRE" | "DELAYED" | "TBD" => (GameStatus::Scheduled, false),
            "IN_PROGRESS" | "IN" | "LIVE" | "FIRST_HALF" | "SECOND_HALF" | "OVERTIME"
            | "SHOOTOUT" => (GameStatus::Live, false),
            "HALFTIME" | "END_PERIOD" | "END_OF_PERIOD" | "INTERMISSION" | "RAIN_DELAY" => {
                (GameStatus::Intermission, false)
            }
            "POSTPONED" | "CANCELED" | "CANCELLED" | "FORFEIT" | "SUSPENDED" | "ABANDONED" => {
                (GameStatus::Completed, true)
            }
            other if other.starts_with("FINAL") || other == "POST" || other == "COMPLETED" => {
                (GameStatus::Completed, false)
            }
            _ => return None,
        };
        Some(parsed)
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for GameStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "SCHEDULED" => Ok(GameStatus::Scheduled),
            "LIVE" => Ok(GameStatus::Live),
            "INTERMISSION" => Ok(GameStatus::Intermission),
            "COMPLETED" => Ok(GameStatus::Completed),
            _ => Err(format!("Unknown game status: {}", s)),
        }
    }
}

/// Outcome of one sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    /// Some games went stale, or the cycle was cut short by the rate limiter
    Partial,
    /// Store write failed; nothing from this cycle was committed
    Failed,
    /// Shutdown requested mid-cycle
    Interrupted,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Partial => "partial",
            SyncStatus::Failed => "failed",
            SyncStatus::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for SyncStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "success" => Ok(SyncStatus::Success),
            "partial" => Ok(SyncStatus::Partial),
            "failed" => Ok(SyncStatus::Failed),
            "interrupted" => Ok(SyncStatus::Interrupted),
            _ => Err(format!("Unknown sync status: {}", s)),
        }
    }
}
