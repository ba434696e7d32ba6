use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::GameStatus;

/// One game as returned by a batched scoreboard query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreboardGame {
    pub external_id: String,
    pub home_team_name: String,
    pub away_team_name: String,
    pub home_score: u32,
    pub away_score: u32,
    pub status_text: String,
    pub period: u32,
    pub clock: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
}

/// Per-game detail from the enrichment call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameDetail {
    pub home_score: u32,
    pub away_score: u32,
    pub status_text: String,
    pub period: u32,
    pub clock: Option<String>,
}

/// League context needed to interpret raw feed values
#[derive(Debug, Clone, Copy)]
pub struct LeagueRules<'a> {
    pub league: &'a str,
    pub sport: &'a str,
    pub final_period: u32,
}

/// What changed when a snapshot was applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GameChange {
    /// Score, period, clock or status moved
    pub changed: bool,
    pub status_changed: bool,
    /// Feed reported an earlier status; the update was ignored
    pub regression_rejected: bool,
}

/// A game tracked across cycles, keyed by the score feed's id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedGame {
    pub external_id: String,
    pub league: String,
    pub sport: String,
    /// Canonical names where the alias database knows the team, feed names otherwise
    pub home_team: String,
    pub away_team: String,
    pub status: GameStatus,
    pub home_score: u32,
    pub away_score: u32,
    pub period: u32,
    pub clock: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub is_final_period: bool,
    pub last_update: DateTime<Utc>,
    pub poll_interval_secs: u64,
    pub next_poll_at: DateTime<Utc>,
    /// Last enrichment failed twice; retried next cycle
    pub stale: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// Ended without going through live play, or forfeit/postponement
    pub abnormal_completion: bool,
}

impl TrackedGame {
    /// Build a game on first sighting. Poll timing is left for the scheduler.
    pub fn first_sighting(
        snapshot: &ScoreboardGame,
        rules: LeagueRules<'_>,
        home_team: String,
        away_team: String,
        now: DateTime<Utc>,
    ) -> Self {
        let (status, abnormal) =
            GameStatus::from_feed(&snapshot.status_text).unwrap_or((GameStatus::Scheduled, false));
        let completed = status.is_terminal();

        Self {
            external_id: snapshot.external_id.clone(),
            league: rules.league.to_string(),
            sport: rules.sport.to_string(),
            home_team,
            away_team,
            status,
            home_score: snapshot.home_score,
            away_score: snapshot.away_score,
            period: snapshot.period,
            clock: snapshot.clock.clone(),
            start_time: snapshot.start_time,
            is_final_period: status.is_in_play() && snapshot.period >= rules.final_period,
            last_update: now,
            poll_interval_secs: 0,
            next_poll_at: now,
            stale: false,
            completed_at: completed.then_some(now),
            abnormal_completion: completed && abnormal,
        }
    }

    /// Apply a scoreboard row for this game
    pub fn apply_scoreboard(
        &mut self,
        snapshot: &ScoreboardGame,
        final_period: u32,
        now: DateTime<Utc>,
    ) -> GameChange {
        if self.start_time.is_none() {
            self.start_time = snapshot.start_time;
        }
        self.apply_values(
            snapshot.home_score,
            snapshot.away_score,
            &snapshot.status_text,
            snapshot.period,
            snapshot.clock.as_deref(),
            final_period,
            now,
        )
    }

    /// Apply an enrichment result for this game
    pub fn apply_detail(
        &mut self,
        detail: &GameDetail,
        final_period: u32,
        now: DateTime<Utc>,
    ) -> GameChange {
        self.apply_values(
            detail.home_score,
            detail.away_score,
            &detail.status_text,
            detail.period,
            detail.clock.as_deref(),
            final_period,
            now,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_values(
        &mut self,
        home_score: u32,
        away_score: u32,
        status_text: &str,
        period: u32,
        clock: Option<&str>,
        final_period: u32,
        now: DateTime<Utc>,
    ) -> GameChange {
        let mut change = GameChange::default();
        self.last_update = now;

        // Nothing leaves COMPLETED, including late score corrections
        if self.status.is_terminal() {
            return change;
        }

        match GameStatus::from_feed(status_text) {
            Some((next, abnormal)) if self.status.can_transition_to(next) => {
                if next != self.status {
                    if next.is_terminal() {
                        self.completed_at = Some(now);
                        self.abnormal_completion = abnormal || self.status == GameStatus::Scheduled;
                    }
                    self.status = next;
                    change.status_changed = true;
                    change.changed = true;
                }
            }
            Some(_) => {
                // The whole row is suspect, scores included
                change.regression_rejected = true;
                return change;
            }
            None => {}
        }

        if self.home_score != home_score || self.away_score != away_score {
            self.home_score = home_score;
            self.away_score = away_score;
            change.changed = true;
        }
        if self.period != period {
            self.period = period;
            change.changed = true;
        }
        if self.clock.as_deref() != clock {
            self.clock = clock.map(str::to_string);
            change.changed = true;
        }

        self.is_final_period = self.status.is_in_play() && self.period >= final_period;
        change
    }

    pub fn score_differential(&self) -> u32 {
        self.home_score.abs_diff(self.away_score)
    }

}
