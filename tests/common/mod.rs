#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use gamesync::adapters::{LiveScoreSource, MarketSource, MemoryStore};
use gamesync::config::{AppConfig, LeagueConfig};
use gamesync::coordination::{GracefulShutdown, RateLimiter};
use gamesync::domain::{ContractListing, GameDetail, ScoreboardGame};
use gamesync::error::{Result, SyncError};
use gamesync::matching::TeamAliasDatabase;
use gamesync::sync::{Collaborators, SyncOrchestrator};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 30, 20, 0, 0).unwrap()
}

pub fn at(secs: i64) -> DateTime<Utc> {
    t0() + chrono::Duration::seconds(secs)
}

/// Default config narrowed to the given league keys
pub fn config_for(leagues: &[&str]) -> AppConfig {
    let mut config = AppConfig::default();
    config.leagues.retain(|l| leagues.contains(&l.key.as_str()));
    config
}

pub fn snapshot(
    id: &str,
    home: &str,
    away: &str,
    home_score: u32,
    away_score: u32,
    status: &str,
    period: u32,
) -> ScoreboardGame {
    ScoreboardGame {
        external_id: id.to_string(),
        home_team_name: home.to_string(),
        away_team_name: away.to_string(),
        home_score,
        away_score,
        status_text: status.to_string(),
        period,
        clock: None,
        start_time: None,
    }
}

pub fn detail(home_score: u32, away_score: u32, status: &str, period: u32) -> GameDetail {
    GameDetail {
        home_score,
        away_score,
        status_text: status.to_string(),
        period,
        clock: Some("7:30".to_string()),
    }
}

pub fn listing(id: &str, title: &str) -> ContractListing {
    ContractListing {
        contract_id: id.to_string(),
        title: title.to_string(),
        yes_price: None,
        no_price: None,
        volume: None,
        close_time: None,
    }
}

/// Holds a scoreboard call open until released
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

/// Scripted score feed
#[derive(Default)]
pub struct FakeScores {
    scoreboards: Mutex<HashMap<String, Vec<ScoreboardGame>>>,
    details: Mutex<HashMap<String, GameDetail>>,
    /// Remaining transient failures per game
    failures: Mutex<HashMap<String, u32>>,
    calls: Mutex<Vec<String>>,
    gate: Option<Arc<Gate>>,
}

impl FakeScores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Gate>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn set_scoreboard(&self, league: &str, games: Vec<ScoreboardGame>) {
        self.scoreboards.lock().unwrap().insert(league.to_string(), games);
    }

    pub fn set_detail(&self, external_id: &str, detail: GameDetail) {
        self.details.lock().unwrap().insert(external_id.to_string(), detail);
    }

    pub fn fail_detail(&self, external_id: &str, times: u32) {
        self.failures.lock().unwrap().insert(external_id.to_string(), times);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn detail_calls(&self, external_id: &str) -> usize {
        let wanted = format!("detail:{external_id}");
        self.calls().iter().filter(|c| **c == wanted).count()
    }
}

#[async_trait]
impl LiveScoreSource for FakeScores {
    async fn fetch_scoreboard(
        &self,
        league: &LeagueConfig,
        _date: NaiveDate,
    ) -> Result<Vec<ScoreboardGame>> {
        self.calls.lock().unwrap().push(format!("scoreboard:{}", league.key));
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        Ok(self
            .scoreboards
            .lock()
            .unwrap()
            .get(&league.key)
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_game_detail(
        &self,
        _league: &LeagueConfig,
        external_id: &str,
    ) -> Result<GameDetail> {
        self.calls.lock().unwrap().push(format!("detail:{external_id}"));

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(external_id) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(SyncError::TransientFetch {
                    target: format!("summary/{external_id}"),
                    reason: "timed out".to_string(),
                });
            }
        }
        drop(failures);

        self.details
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| SyncError::InvalidFeedData(format!("no detail for {external_id}")))
    }
}

/// Scripted market listing feed
#[derive(Default)]
pub struct FakeMarkets {
    listings: Mutex<Vec<ContractListing>>,
}

impl FakeMarkets {
    pub fn new(listings: Vec<ContractListing>) -> Self {
        Self {
            listings: Mutex::new(listings),
        }
    }

    pub fn set(&self, listings: Vec<ContractListing>) {
        *self.listings.lock().unwrap() = listings;
    }
}

#[async_trait]
impl MarketSource for FakeMarkets {
    async fn fetch_active_contracts(&self) -> Result<Vec<ContractListing>> {
        Ok(self.listings.lock().unwrap().clone())
    }
}

pub struct Harness {
    pub scores: Arc<FakeScores>,
    pub markets: Arc<FakeMarkets>,
    pub store: Arc<MemoryStore>,
    pub shutdown: Arc<GracefulShutdown>,
    pub orchestrator: SyncOrchestrator,
}

pub fn harness(config: AppConfig, scores: FakeScores, markets: FakeMarkets) -> Harness {
    let scores = Arc::new(scores);
    let markets = Arc::new(markets);
    let store = Arc::new(MemoryStore::new());
    let shutdown = Arc::new(GracefulShutdown::new());
    let aliases = Arc::new(TeamAliasDatabase::from_config(&config.matching).unwrap());
    let limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));

    let orchestrator = SyncOrchestrator::new(
        config,
        limiter,
        aliases,
        Collaborators {
            scores: scores.clone(),
            markets: markets.clone(),
            store: store.clone(),
        },
        Arc::clone(&shutdown),
    );

    Harness {
        scores,
        markets,
        store,
        shutdown,
        orchestrator,
    }
}
