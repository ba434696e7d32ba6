use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{PgExecutor, Row};
use tracing::{debug, info, instrument};

use super::traits::{CycleBatch, SyncStore};
use crate::domain::{
    GameStatus, MarketContract, SyncCounts, SyncRun, SyncStatus, TeamPair, TrackedGame,
};
use crate::error::{Result, SyncError};

/// PostgreSQL storage adapter
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Most recent sync runs, newest first
    pub async fn recent_sync_runs(&self, limit: i64) -> Result<Vec<SyncRun>> {
        let rows = sqlx::query(
            r#"
            SELECT id, started_at, inserted, updated, skipped, errored,
                   contracts_matched, contracts_unmatched, upstream_calls,
                   duration_ms, status, error
            FROM sync_runs
            ORDER BY started_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(sync_run_from_row).collect()
    }
}

// ==================== Statements ====================

async fn upsert_game_with<'e, E: PgExecutor<'e>>(exec: E, game: &TrackedGame) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracked_games (
            external_id, league, sport, home_team, away_team, status,
            home_score, away_score, period, clock, start_time, is_final_period,
            last_update, poll_interval_secs, next_poll_at, stale, completed_at,
            abnormal_completion
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        ON CONFLICT (external_id) DO UPDATE SET
            home_team = EXCLUDED.home_team,
            away_team = EXCLUDED.away_team,
            status = EXCLUDED.status,
            home_score = EXCLUDED.home_score,
            away_score = EXCLUDED.away_score,
            period = EXCLUDED.period,
            clock = EXCLUDED.clock,
            start_time = COALESCE(EXCLUDED.start_time, tracked_games.start_time),
            is_final_period = EXCLUDED.is_final_period,
            last_update = EXCLUDED.last_update,
            poll_interval_secs = EXCLUDED.poll_interval_secs,
            next_poll_at = EXCLUDED.next_poll_at,
            stale = EXCLUDED.stale,
            completed_at = EXCLUDED.completed_at,
            abnormal_completion = EXCLUDED.abnormal_completion
        "#,
    )
    .bind(&game.external_id)
    .bind(&game.league)
    .bind(&game.sport)
    .bind(&game.home_team)
    .bind(&game.away_team)
    .bind(game.status.as_str())
    .bind(to_i32(game.home_score))
    .bind(to_i32(game.away_score))
    .bind(to_i32(game.period))
    .bind(&game.clock)
    .bind(game.start_time)
    .bind(game.is_final_period)
    .bind(game.last_update)
    .bind(to_i64(game.poll_interval_secs))
    .bind(game.next_poll_at)
    .bind(game.stale)
    .bind(game.completed_at)
    .bind(game.abnormal_completion)
    .execute(exec)
    .await?;
    Ok(())
}

async fn upsert_contract_with<'e, E: PgExecutor<'e>>(
    exec: E,
    contract: &MarketContract,
) -> Result<()> {
    let (first, second) = match &contract.extracted {
        Some(pair) => (Some(pair.first.as_str()), Some(pair.second.as_str())),
        None => (None, None),
    };

    // The staged contract is authoritative, so a dropped link is written as NULL
    sqlx::query(
        r#"
        INSERT INTO market_contracts (
            contract_id, title, extracted_first, extracted_second, matched_game_id,
            yes_price, no_price, volume, close_time, last_seen
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        ON CONFLICT (contract_id) DO UPDATE SET
            title = EXCLUDED.title,
            extracted_first = EXCLUDED.extracted_first,
            extracted_second = EXCLUDED.extracted_second,
            matched_game_id = EXCLUDED.matched_game_id,
            yes_price = EXCLUDED.yes_price,
            no_price = EXCLUDED.no_price,
            volume = EXCLUDED.volume,
            close_time = EXCLUDED.close_time,
            last_seen = EXCLUDED.last_seen
        "#,
    )
    .bind(&contract.contract_id)
    .bind(&contract.title)
    .bind(first)
    .bind(second)
    .bind(&contract.matched_game_id)
    .bind(contract.yes_price)
    .bind(contract.no_price)
    .bind(contract.volume)
    .bind(contract.close_time)
    .bind(contract.last_seen)
    .execute(exec)
    .await?;
    Ok(())
}

async fn insert_sync_run_with<'e, E: PgExecutor<'e>>(exec: E, run: &SyncRun) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sync_runs (
            id, started_at, inserted, updated, skipped, errored,
            contracts_matched, contracts_unmatched, upstream_calls,
            duration_ms, status, error
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(run.id)
    .bind(run.started_at)
    .bind(to_i32(run.counts.inserted))
    .bind(to_i32(run.counts.updated))
    .bind(to_i32(run.counts.skipped))
    .bind(to_i32(run.counts.errored))
    .bind(to_i32(run.contracts_matched))
    .bind(to_i32(run.contracts_unmatched))
    .bind(to_i32(run.upstream_calls))
    .bind(to_i64(run.duration_ms))
    .bind(run.status.as_str())
    .bind(&run.error)
    .execute(exec)
    .await?;
    Ok(())
}

// ==================== Row mapping ====================

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u32(value: i32) -> u32 {
    u32::try_from(value).unwrap_or(0)
}

fn game_from_row(r: &PgRow) -> Result<TrackedGame> {
    let status: String = r.try_get("status")?;
    let status = GameStatus::try_from(status.as_str()).map_err(SyncError::Persistence)?;
    let poll_interval_secs: i64 = r.try_get("poll_interval_secs")?;

    Ok(TrackedGame {
        external_id: r.try_get("external_id")?,
        league: r.try_get("league")?,
        sport: r.try_get("sport")?,
        home_team: r.try_get("home_team")?,
        away_team: r.try_get("away_team")?,
        status,
        home_score: to_u32(r.try_get("home_score")?),
        away_score: to_u32(r.try_get("away_score")?),
        period: to_u32(r.try_get("period")?),
        clock: r.try_get("clock")?,
        start_time: r.try_get("start_time")?,
        is_final_period: r.try_get("is_final_period")?,
        last_update: r.try_get("last_update")?,
        poll_interval_secs: u64::try_from(poll_interval_secs).unwrap_or(0),
        next_poll_at: r.try_get("next_poll_at")?,
        stale: r.try_get("stale")?,
        completed_at: r.try_get("completed_at")?,
        abnormal_completion: r.try_get("abnormal_completion")?,
    })
}

fn contract_from_row(r: &PgRow) -> Result<MarketContract> {
    let first: Option<String> = r.try_get("extracted_first")?;
    let second: Option<String> = r.try_get("extracted_second")?;

    Ok(MarketContract {
        contract_id: r.try_get("contract_id")?,
        title: r.try_get("title")?,
        extracted: first.zip(second).map(|(a, b)| TeamPair::new(a, b)),
        matched_game_id: r.try_get("matched_game_id")?,
        yes_price: r.try_get("yes_price")?,
        no_price: r.try_get("no_price")?,
        volume: r.try_get("volume")?,
        close_time: r.try_get("close_time")?,
        last_seen: r.try_get("last_seen")?,
    })
}

fn sync_run_from_row(r: &PgRow) -> Result<SyncRun> {
    let status: String = r.try_get("status")?;
    let duration_ms: i64 = r.try_get("duration_ms")?;

    Ok(SyncRun {
        id: r.try_get("id")?,
        started_at: r.try_get("started_at")?,
        counts: SyncCounts {
            inserted: to_u32(r.try_get("inserted")?),
            updated: to_u32(r.try_get("updated")?),
            skipped: to_u32(r.try_get("skipped")?),
            errored: to_u32(r.try_get("errored")?),
        },
        contracts_matched: to_u32(r.try_get("contracts_matched")?),
        contracts_unmatched: to_u32(r.try_get("contracts_unmatched")?),
        upstream_calls: to_u32(r.try_get("upstream_calls")?),
        duration_ms: u64::try_from(duration_ms).unwrap_or(0),
        status: SyncStatus::try_from(status.as_str()).map_err(SyncError::Persistence)?,
        error: r.try_get("error")?,
    })
}

#[async_trait]
impl SyncStore for PostgresStore {
    #[instrument(skip_all, fields(game = %game.external_id))]
    async fn upsert_game(&self, game: &TrackedGame) -> Result<()> {
        upsert_game_with(&self.pool, game).await
    }

    #[instrument(skip_all, fields(contract = %contract.contract_id))]
    async fn upsert_contract(&self, contract: &MarketContract) -> Result<()> {
        upsert_contract_with(&self.pool, contract).await
    }

    #[instrument(skip_all, fields(run = %run.id, status = %run.status))]
    async fn append_sync_run(&self, run: &SyncRun) -> Result<()> {
        insert_sync_run_with(&self.pool, run).await
    }

    #[instrument(
        skip_all,
        fields(
            games = batch.games.len(),
            contracts = batch.contracts.len(),
            run = %batch.sync_run.id
        )
    )]
    async fn commit_cycle(&self, batch: &CycleBatch) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for game in &batch.games {
            upsert_game_with(&mut *tx, game).await?;
        }
        for contract in &batch.contracts {
            upsert_contract_with(&mut *tx, contract).await?;
        }
        insert_sync_run_with(&mut *tx, &batch.sync_run).await?;

        tx.commit().await?;
        debug!("Cycle committed");
        Ok(())
    }

    async fn load_games(&self) -> Result<Vec<TrackedGame>> {
        let rows = sqlx::query(
            r#"
            SELECT external_id, league, sport, home_team, away_team, status,
                   home_score, away_score, period, clock, start_time, is_final_period,
                   last_update, poll_interval_secs, next_poll_at, stale, completed_at,
                   abnormal_completion
            FROM tracked_games
            ORDER BY external_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(game_from_row).collect()
    }

    async fn load_contracts(&self) -> Result<Vec<MarketContract>> {
        let rows = sqlx::query(
            r#"
            SELECT contract_id, title, extracted_first, extracted_second, matched_game_id,
                   yes_price, no_price, volume, close_time, last_seen
            FROM market_contracts
            ORDER BY contract_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(contract_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_conversions_saturate() {
        assert_eq!(to_i32(u32::MAX), i32::MAX);
        assert_eq!(to_i32(42), 42);
        assert_eq!(to_i64(u64::MAX), i64::MAX);
        assert_eq!(to_u32(-1), 0);
        assert_eq!(to_u32(7), 7);
    }
}
