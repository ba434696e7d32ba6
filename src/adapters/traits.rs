//! Collaborator seams for the sync cycle
//!
//! The orchestrator only talks to these traits; concrete feeds and stores
//! live next to them in `adapters`.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::config::LeagueConfig;
use crate::domain::{
    ContractListing, GameDetail, MarketContract, ScoreboardGame, SyncRun, TrackedGame,
};
use crate::error::Result;

/// Upstream live-score feed. Every call costs one rate-limiter slot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiveScoreSource: Send + Sync {
    /// All games of a league for one calendar date, in one request
    async fn fetch_scoreboard(
        &self,
        league: &LeagueConfig,
        date: NaiveDate,
    ) -> Result<Vec<ScoreboardGame>>;

    /// Per-game enrichment
    async fn fetch_game_detail(&self, league: &LeagueConfig, external_id: &str)
        -> Result<GameDetail>;
}

/// Prediction-market contract listings
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn fetch_active_contracts(&self) -> Result<Vec<ContractListing>>;
}

/// Everything one cycle writes, applied as one unit
#[derive(Debug, Clone, Serialize)]
pub struct CycleBatch {
    pub games: Vec<TrackedGame>,
    pub contracts: Vec<MarketContract>,
    pub sync_run: SyncRun,
}

/// Keyed, idempotent persistence. Upserts are keyed by external_id,
/// contract_id and run id respectively.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SyncStore: Send + Sync {
    async fn upsert_game(&self, game: &TrackedGame) -> Result<()>;

    async fn upsert_contract(&self, contract: &MarketContract) -> Result<()>;

    /// Sync runs are immutable; appending an existing id is a no-op
    async fn append_sync_run(&self, run: &SyncRun) -> Result<()>;

    /// All of a cycle's writes, or none of them
    async fn commit_cycle(&self, batch: &CycleBatch) -> Result<()>;

    async fn load_games(&self) -> Result<Vec<TrackedGame>>;

    async fn load_contracts(&self) -> Result<Vec<MarketContract>>;
}
