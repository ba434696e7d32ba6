//! Adaptive poll scheduling
//!
//! Pure functions of game state and the clock. Close games late in the final
//! period poll fastest; completed games poll slowly until their retention
//! window runs out.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use crate::config::PollConfig;
use crate::domain::{GameStatus, TrackedGame};

#[derive(Debug, Clone)]
pub struct PollScheduler {
    config: PollConfig,
}

impl PollScheduler {
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll interval for a game in this state
    pub fn interval_for(
        &self,
        status: GameStatus,
        is_final_period: bool,
        score_differential: u32,
        close_threshold: u32,
    ) -> Duration {
        let secs = match status {
            GameStatus::Scheduled => self.config.scheduled_secs,
            GameStatus::Live if is_final_period && score_differential <= close_threshold => {
                self.config.live_close_final_secs
            }
            GameStatus::Live => self.config.live_secs,
            GameStatus::Intermission => self.config.intermission_secs,
            GameStatus::Completed => self.config.completed_secs,
        };
        Duration::from_secs(secs)
    }

    /// Earliest time the game may be polled again
    pub fn next_poll_at(
        &self,
        status: GameStatus,
        is_final_period: bool,
        score_differential: u32,
        close_threshold: u32,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let interval =
            self.interval_for(status, is_final_period, score_differential, close_threshold);
        now + secs(interval.as_secs())
    }

    /// Set interval and next poll time after the game was polled at `now`
    pub fn schedule(&self, game: &mut TrackedGame, close_threshold: u32, now: DateTime<Utc>) {
        let interval = self.interval_for(
            game.status,
            game.is_final_period,
            game.score_differential(),
            close_threshold,
        );
        game.poll_interval_secs = interval.as_secs();
        game.next_poll_at = now + secs(game.poll_interval_secs);
    }

    /// Refresh the interval for a game seen but not polled this cycle. The
    /// next poll only ever moves earlier, so a game going live tightens its
    /// schedule without pushing back a poll that is already due.
    pub fn tighten(&self, game: &mut TrackedGame, close_threshold: u32, now: DateTime<Utc>) {
        let interval = self.interval_for(
            game.status,
            game.is_final_period,
            game.score_differential(),
            close_threshold,
        );
        game.poll_interval_secs = interval.as_secs();
        game.next_poll_at = game.next_poll_at.min(now + secs(game.poll_interval_secs));
    }

    /// Completed long enough ago that the game is no longer tracked
    pub fn retention_expired(&self, game: &TrackedGame, now: DateTime<Utc>) -> bool {
        match (game.status, game.completed_at) {
            (GameStatus::Completed, Some(completed_at)) => {
                now >= completed_at + secs(self.config.completed_retention_secs)
            }
            _ => false,
        }
    }

    /// Is the game due for a poll. Stale games keep their old `next_poll_at`
    /// and so come due again on the next cycle.
    pub fn should_update(&self, game: &TrackedGame, now: DateTime<Utc>) -> bool {
        if self.retention_expired(game, now) {
            return false;
        }
        now >= game.next_poll_at
    }
}

fn secs(value: u64) -> ChronoDuration {
    ChronoDuration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn scheduler() -> PollScheduler {
        PollScheduler::new(PollConfig::default())
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn game(status: GameStatus, is_final_period: bool, home: u32, away: u32) -> TrackedGame {
        TrackedGame {
            external_id: "401".into(),
            league: "nba".into(),
            sport: "nba".into(),
            home_team: "Boston Celtics".into(),
            away_team: "Los Angeles Lakers".into(),
            status,
            home_score: home,
            away_score: away,
            period: if is_final_period { 4 } else { 2 },
            clock: None,
            start_time: None,
            is_final_period,
            last_update: at(0),
            poll_interval_secs: 0,
            next_poll_at: at(0),
            stale: false,
            completed_at: (status == GameStatus::Completed).then(|| at(0)),
            abnormal_completion: false,
        }
    }

    #[test]
    fn test_default_intervals() {
        let s = scheduler();
        let secs = |status, fin, diff| s.interval_for(status, fin, diff, 8).as_secs();

        assert_eq!(secs(GameStatus::Scheduled, false, 0), 60);
        assert_eq!(secs(GameStatus::Live, false, 3), 10);
        assert_eq!(secs(GameStatus::Live, true, 20), 10);
        assert_eq!(secs(GameStatus::Live, true, 8), 5);
        assert_eq!(secs(GameStatus::Intermission, true, 2), 15);
        assert_eq!(secs(GameStatus::Completed, false, 0), 300);
    }

    #[test]
    fn test_close_game_never_polls_slower_than_blowout() {
        let s = scheduler();
        for status in [
            GameStatus::Scheduled,
            GameStatus::Live,
            GameStatus::Intermission,
            GameStatus::Completed,
        ] {
            for is_final in [false, true] {
                for close in 0..=8 {
                    for blowout in 9..40 {
                        assert!(
                            s.interval_for(status, is_final, close, 8)
                                <= s.interval_for(status, is_final, blowout, 8)
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_schedule_and_should_update() {
        let s = scheduler();
        let mut g = game(GameStatus::Live, true, 101, 99);
        s.schedule(&mut g, 8, at(0));
        assert_eq!(g.poll_interval_secs, 5);
        assert_eq!(g.next_poll_at, at(5));

        assert!(!s.should_update(&g, at(4)));
        assert!(s.should_update(&g, at(5)));
    }

    #[test]
    fn test_tighten_only_moves_earlier() {
        let s = scheduler();
        let mut g = game(GameStatus::Scheduled, false, 0, 0);
        s.schedule(&mut g, 8, at(0));
        assert_eq!(g.next_poll_at, at(60));

        g.status = GameStatus::Live;
        s.tighten(&mut g, 8, at(20));
        assert_eq!(g.poll_interval_secs, 10);
        assert_eq!(g.next_poll_at, at(30));

        g.status = GameStatus::Completed;
        s.tighten(&mut g, 8, at(25));
        assert_eq!(g.poll_interval_secs, 300);
        assert_eq!(g.next_poll_at, at(30));
    }

    #[test]
    fn test_completed_game_stops_after_retention() {
        let s = scheduler();
        let mut g = game(GameStatus::Completed, false, 90, 80);
        s.schedule(&mut g, 8, at(0));

        assert!(s.should_update(&g, at(300)));
        assert!(!s.retention_expired(&g, at(7_199)));
        assert!(s.retention_expired(&g, at(7_200)));
        assert!(!s.should_update(&g, at(7_200)));
    }

    #[test]
    fn test_next_poll_at_is_pure() {
        let s = scheduler();
        assert_eq!(s.next_poll_at(GameStatus::Intermission, false, 0, 8, at(100)), at(115));
        assert_eq!(s.next_poll_at(GameStatus::Intermission, false, 0, 8, at(100)), at(115));
    }
}
