//! ESPN Live Scoreboard Client
//!
//! Public scoreboard and game summary endpoints. No API key required.
//! Status text is passed through as ESPN's `status.type.name`
//! (e.g. `STATUS_IN_PROGRESS`).

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::http::fetch_json;
use super::traits::LiveScoreSource;
use crate::config::{FeedConfig, LeagueConfig};
use crate::domain::{GameDetail, ScoreboardGame};
use crate::error::{Result, SyncError};

// ── ESPN JSON deserialization structs ────────────────────────────

#[derive(Debug, Deserialize)]
struct EspnScoreboardResponse {
    #[serde(default)]
    events: Vec<EspnEvent>,
}

#[derive(Debug, Deserialize)]
struct EspnEvent {
    id: String,
    date: Option<String>,
    #[serde(default)]
    competitions: Vec<EspnCompetition>,
}

#[derive(Debug, Deserialize)]
struct EspnCompetition {
    #[serde(default)]
    competitors: Vec<EspnCompetitor>,
    status: EspnStatus,
}

#[derive(Debug, Deserialize)]
struct EspnCompetitor {
    team: EspnTeam,
    #[serde(rename = "homeAway")]
    home_away: String,
    score: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EspnTeam {
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct EspnStatus {
    #[serde(default)]
    period: u32,
    #[serde(rename = "displayClock")]
    display_clock: Option<String>,
    #[serde(rename = "type")]
    status_type: EspnStatusType,
}

#[derive(Debug, Deserialize)]
struct EspnStatusType {
    name: String,
}

#[derive(Debug, Deserialize)]
struct EspnSummary {
    header: EspnSummaryHeader,
}

#[derive(Debug, Deserialize)]
struct EspnSummaryHeader {
    #[serde(default)]
    competitions: Vec<EspnSummaryCompetition>,
}

#[derive(Debug, Deserialize)]
struct EspnSummaryCompetition {
    #[serde(default)]
    competitors: Vec<EspnSummaryCompetitor>,
    status: EspnStatus,
}

#[derive(Debug, Deserialize)]
struct EspnSummaryCompetitor {
    #[serde(rename = "homeAway")]
    home_away: String,
    score: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────

pub struct EspnScoreboard {
    http: reqwest::Client,
    base_url: String,
}

impl EspnScoreboard {
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.scoreboard_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn league_url(&self, league: &LeagueConfig, endpoint: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, league.feed_sport, league.key, endpoint)
    }

    fn parse_scoreboard(data: &EspnScoreboardResponse) -> Vec<ScoreboardGame> {
        data.events.iter().filter_map(Self::parse_event).collect()
    }

    fn parse_event(event: &EspnEvent) -> Option<ScoreboardGame> {
        let comp = event.competitions.first()?;
        let home = comp.competitors.iter().find(|c| c.home_away == "home")?;
        let away = comp.competitors.iter().find(|c| c.home_away == "away")?;

        Some(ScoreboardGame {
            external_id: event.id.clone(),
            home_team_name: home.team.display_name.clone(),
            away_team_name: away.team.display_name.clone(),
            home_score: parse_score(home.score.as_deref()),
            away_score: parse_score(away.score.as_deref()),
            status_text: comp.status.status_type.name.clone(),
            period: comp.status.period,
            clock: clock(&comp.status),
            start_time: event.date.as_deref().and_then(parse_event_date),
        })
    }

    fn parse_summary(data: &EspnSummary) -> Option<GameDetail> {
        let comp = data.header.competitions.first()?;
        let home = comp.competitors.iter().find(|c| c.home_away == "home")?;
        let away = comp.competitors.iter().find(|c| c.home_away == "away")?;

        Some(GameDetail {
            home_score: parse_score(home.score.as_deref()),
            away_score: parse_score(away.score.as_deref()),
            status_text: comp.status.status_type.name.clone(),
            period: comp.status.period,
            clock: clock(&comp.status),
        })
    }
}

#[async_trait]
impl LiveScoreSource for EspnScoreboard {
    async fn fetch_scoreboard(
        &self,
        league: &LeagueConfig,
        date: NaiveDate,
    ) -> Result<Vec<ScoreboardGame>> {
        let target = format!("{}/scoreboard", league.key);
        let req = self
            .http
            .get(self.league_url(league, "scoreboard"))
            .query(&[("dates", date.format("%Y%m%d").to_string())]);

        let data: EspnScoreboardResponse = fetch_json(&target, req).await?;
        let games = Self::parse_scoreboard(&data);
        debug!(
            league = %league.key,
            %date,
            events = data.events.len(),
            games = games.len(),
            "ESPN scoreboard fetched"
        );
        Ok(games)
    }

    async fn fetch_game_detail(
        &self,
        league: &LeagueConfig,
        external_id: &str,
    ) -> Result<GameDetail> {
        let target = format!("{}/summary/{}", league.key, external_id);
        let req = self
            .http
            .get(self.league_url(league, "summary"))
            .query(&[("event", external_id)]);

        let data: EspnSummary = fetch_json(&target, req).await?;
        Self::parse_summary(&data).ok_or_else(|| {
            SyncError::InvalidFeedData(format!("{target}: no competition in summary"))
        })
    }
}

fn parse_score(raw: Option<&str>) -> u32 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v as u32)
        .unwrap_or(0)
}

fn clock(status: &EspnStatus) -> Option<String> {
    status
        .display_clock
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

/// ESPN dates come as "2024-01-13T00:30Z" (no seconds) or full RFC 3339
fn parse_event_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%MZ")
        .ok()
        .map(|naive| naive.and_utc())
}
