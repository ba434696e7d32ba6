use chrono::{DateTime, NaiveDate, Utc};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default = "default_leagues")]
    pub leagues: Vec<LeagueConfig>,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default)]
    pub feeds: FeedConfig,
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum outbound score-feed calls inside one window
    pub max_calls: u32,
    /// Sliding window length in seconds
    pub window_secs: u64,
    /// Longest a cycle will wait for a free slot before giving up
    pub max_wait_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 30,
            window_secs: 60,
            max_wait_ms: 2_000,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

/// Per-status poll intervals
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub scheduled_secs: u64,
    pub live_secs: u64,
    /// Live, final period, close score
    pub live_close_final_secs: u64,
    pub intermission_secs: u64,
    pub completed_secs: u64,
    /// Score differential at or under which a final-period game counts as close
    pub close_game_threshold: u32,
    /// How long a completed game keeps being polled before it is dropped
    pub completed_retention_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            scheduled_secs: 60,
            live_secs: 10,
            live_close_final_secs: 5,
            intermission_secs: 15,
            completed_secs: 300,
            close_game_threshold: 8,
            completed_retention_secs: 2 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MatchingConfig {
    /// Fragments that may never stand alone as a team variation
    #[serde(default = "default_collision_denylist")]
    pub collision_denylist: Vec<String>,
    /// Alias file override; the bundled table is used when unset
    #[serde(default)]
    pub alias_file: Option<PathBuf>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            collision_denylist: default_collision_denylist(),
            alias_file: None,
        }
    }
}

fn default_collision_denylist() -> Vec<String> {
    [
        "State",
        "St.",
        "St",
        "Tech",
        "Saint",
        "University",
        "College",
        "A&M",
        "North",
        "South",
        "East",
        "West",
        "Central",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// One score-feed league polled every cycle
#[derive(Debug, Clone, Deserialize)]
pub struct LeagueConfig {
    /// Feed league key (e.g., "nba", "college-football")
    pub key: String,
    /// Sport tag used to scope alias lookups (e.g., "nba", "ncaaf")
    pub sport: String,
    /// Feed path segment for the sport (e.g., "basketball", "football")
    pub feed_sport: String,
    /// First period counted as the final period (4 for quarters, 2 for halves)
    pub final_period: u32,
    /// Per-league override of the close-game threshold
    #[serde(default)]
    pub close_game_threshold: Option<u32>,
}

fn default_leagues() -> Vec<LeagueConfig> {
    vec![
        LeagueConfig {
            key: "nba".to_string(),
            sport: "nba".to_string(),
            feed_sport: "basketball".to_string(),
            final_period: 4,
            close_game_threshold: Some(8),
        },
        LeagueConfig {
            key: "college-football".to_string(),
            sport: "ncaaf".to_string(),
            feed_sport: "football".to_string(),
            final_period: 4,
            close_game_threshold: Some(8),
        },
        LeagueConfig {
            key: "mens-college-basketball".to_string(),
            sport: "ncaab".to_string(),
            feed_sport: "basketball".to_string(),
            final_period: 2,
            close_game_threshold: None,
        },
    ]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Driver tick; a cycle is attempted every tick
    pub tick_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { tick_secs: 5 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub scoreboard_base_url: String,
    pub gamma_base_url: String,
    pub timeout_secs: u64,
    pub market_page_limit: u32,
    /// Offset applied to the cycle time before picking the scoreboard date.
    /// The feed groups games by US Eastern calendar day.
    pub scoreboard_utc_offset_hours: i32,
}

impl FeedConfig {
    /// Calendar date whose scoreboard covers games in progress at `now`
    pub fn scoreboard_date(&self, now: DateTime<Utc>) -> NaiveDate {
        (now + chrono::Duration::hours(i64::from(self.scoreboard_utc_offset_hours))).date_naive()
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            scoreboard_base_url: "https://site.api.espn.com/apis/site/v2/sports".to_string(),
            gamma_base_url: "https://gamma-api.polymarket.com".to_string(),
            timeout_secs: 10,
            market_page_limit: 500,
            scoreboard_utc_offset_hours: -5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            poll: PollConfig::default(),
            matching: MatchingConfig::default(),
            leagues: default_leagues(),
            sync: SyncConfig::default(),
            feeds: FeedConfig::default(),
            database: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("GAMESYNC_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (GAMESYNC__RATE_LIMIT__MAX_CALLS, etc.)
            .add_source(
                Environment::with_prefix("GAMESYNC")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Close-game threshold for a league, falling back to the global one
    pub fn close_threshold_for(&self, league: &LeagueConfig) -> u32 {
        league
            .close_game_threshold
            .unwrap_or(self.poll.close_game_threshold)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.rate_limit.max_calls == 0 {
            errors.push("rate_limit.max_calls must be positive".to_string());
        }
        if self.rate_limit.window_secs == 0 {
            errors.push("rate_limit.window_secs must be positive".to_string());
        }

        let poll = &self.poll;
        for (name, secs) in [
            ("scheduled_secs", poll.scheduled_secs),
            ("live_secs", poll.live_secs),
            ("live_close_final_secs", poll.live_close_final_secs),
            ("intermission_secs", poll.intermission_secs),
            ("completed_secs", poll.completed_secs),
        ] {
            if secs == 0 {
                errors.push(format!("poll.{name} must be positive"));
            }
        }
        if poll.live_close_final_secs > poll.live_secs {
            errors.push(format!(
                "poll.live_close_final_secs ({}) must not exceed poll.live_secs ({})",
                poll.live_close_final_secs, poll.live_secs
            ));
        }

        if self.leagues.is_empty() {
            errors.push("at least one league must be configured".to_string());
        }
        for league in &self.leagues {
            if league.final_period == 0 {
                errors.push(format!("league {}: final_period must be positive", league.key));
            }
        }

        if self.sync.tick_secs == 0 {
            errors.push("sync.tick_secs must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.poll.scheduled_secs, 60);
        assert_eq!(cfg.poll.live_close_final_secs, 5);
        assert!(cfg
            .matching
            .collision_denylist
            .iter()
            .any(|t| t == "State"));
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut cfg = AppConfig::default();
        cfg.rate_limit.window_secs = 0;
        cfg.poll.live_close_final_secs = 30;
        cfg.leagues.clear();

        let errors = cfg.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_scoreboard_date_uses_feed_day() {
        use chrono::TimeZone;

        let feeds = FeedConfig::default();
        // 01:30 UTC is still the previous evening in the feed's day
        let late = Utc.with_ymd_and_hms(2024, 1, 13, 1, 30, 0).unwrap();
        assert_eq!(feeds.scoreboard_date(late), NaiveDate::from_ymd_opt(2024, 1, 12).unwrap());
        let noon = Utc.with_ymd_and_hms(2024, 1, 13, 12, 0, 0).unwrap();
        assert_eq!(feeds.scoreboard_date(noon), NaiveDate::from_ymd_opt(2024, 1, 13).unwrap());
    }

    #[test]
    fn test_league_threshold_override() {
        let mut cfg = AppConfig::default();
        cfg.poll.close_game_threshold = 3;
        let mut league = cfg.leagues[0].clone();
        league.close_game_threshold = None;
        assert_eq!(cfg.close_threshold_for(&league), 3);
        league.close_game_threshold = Some(10);
        assert_eq!(cfg.close_threshold_for(&league), 10);
    }
}
