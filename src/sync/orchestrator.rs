//! One synchronization cycle
//!
//! Scoreboards per league (one rate-limited call each), game upserts and
//! scheduling, per-game enrichment for games that are due, market listing
//! refresh, contract matching, then a single commit. All of it runs against
//! a staged copy of the tracked state, swapped in only after the store
//! accepts the cycle.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::adapters::{CycleBatch, LiveScoreSource, MarketSource, SyncStore};
use crate::config::{AppConfig, LeagueConfig};
use crate::coordination::{GracefulShutdown, RateLimiter};
use crate::domain::{
    GameChange, LeagueRules, MarketContract, ScoreboardGame, SyncRun, SyncRunBuilder, TrackedGame,
};
use crate::error::{Result, SyncError};
use crate::matching::{MatchOutcome, TeamAliasDatabase, TeamMatcher, TeamNameExtractor};

use super::scheduler::PollScheduler;

/// External collaborators of the cycle
pub struct Collaborators {
    pub scores: Arc<dyn LiveScoreSource>,
    pub markets: Arc<dyn MarketSource>,
    pub store: Arc<dyn SyncStore>,
}

/// Which records a cycle saw, created or changed
#[derive(Debug, Default)]
struct RecordLog {
    seen: BTreeSet<String>,
    inserted: BTreeSet<String>,
    changed: BTreeSet<String>,
}

impl RecordLog {
    fn inserted(&mut self, id: &str) {
        self.seen.insert(id.to_string());
        self.inserted.insert(id.to_string());
    }

    fn seen(&mut self, id: &str, changed: bool) {
        self.seen.insert(id.to_string());
        if changed {
            self.changed.insert(id.to_string());
        }
    }

    /// (inserted, updated, skipped)
    fn counts(&self) -> (u32, u32, u32) {
        let inserted = self.inserted.len();
        let updated = self.changed.difference(&self.inserted).count();
        let skipped = self.seen.len() - inserted - updated;
        (inserted as u32, updated as u32, skipped as u32)
    }
}

/// Working copy for one cycle
struct CycleState {
    games: HashMap<String, TrackedGame>,
    contracts: HashMap<String, MarketContract>,
    game_log: RecordLog,
    contract_log: RecordLog,
    run: SyncRunBuilder,
}

pub struct SyncOrchestrator {
    config: AppConfig,
    limiter: Arc<RateLimiter>,
    extractor: TeamNameExtractor,
    matcher: TeamMatcher,
    scheduler: PollScheduler,
    scores: Arc<dyn LiveScoreSource>,
    markets: Arc<dyn MarketSource>,
    store: Arc<dyn SyncStore>,
    shutdown: Arc<GracefulShutdown>,
    games: HashMap<String, TrackedGame>,
    contracts: HashMap<String, MarketContract>,
}

impl SyncOrchestrator {
    pub fn new(
        config: AppConfig,
        limiter: Arc<RateLimiter>,
        aliases: Arc<TeamAliasDatabase>,
        collaborators: Collaborators,
        shutdown: Arc<GracefulShutdown>,
    ) -> Self {
        Self {
            scheduler: PollScheduler::new(config.poll.clone()),
            extractor: TeamNameExtractor::new(Arc::clone(&aliases)),
            matcher: TeamMatcher::new(aliases),
            config,
            limiter,
            scores: collaborators.scores,
            markets: collaborators.markets,
            store: collaborators.store,
            shutdown,
            games: HashMap::new(),
            contracts: HashMap::new(),
        }
    }

    /// Restore tracked state from the store. Completed games past retention
    /// are left behind.
    pub async fn hydrate(&mut self, now: DateTime<Utc>) -> Result<(usize, usize)> {
        let games = self.store.load_games().await?;
        let contracts = self.store.load_contracts().await?;

        self.games = games
            .into_iter()
            .filter(|g| !self.scheduler.retention_expired(g, now))
            .map(|g| (g.external_id.clone(), g))
            .collect();
        self.contracts = contracts
            .into_iter()
            .map(|c| (c.contract_id.clone(), c))
            .collect();

        info!(games = self.games.len(), contracts = self.contracts.len(), "Restored tracked state");
        Ok((self.games.len(), self.contracts.len()))
    }

    pub fn scheduler(&self) -> &PollScheduler {
        &self.scheduler
    }

    pub fn game(&self, external_id: &str) -> Option<&TrackedGame> {
        self.games.get(external_id)
    }

    pub fn games(&self) -> impl Iterator<Item = &TrackedGame> {
        self.games.values()
    }

    pub fn contract(&self, contract_id: &str) -> Option<&MarketContract> {
        self.contracts.get(contract_id)
    }

    pub fn contracts(&self) -> impl Iterator<Item = &MarketContract> {
        self.contracts.values()
    }

    /// Run one full cycle at `now` and commit it. On a store failure the
    /// tracked state is left exactly as it was before the call.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<SyncRun> {
        let started = Instant::now();
        let mut cycle = CycleState {
            games: self.games.clone(),
            contracts: self.contracts.clone(),
            game_log: RecordLog::default(),
            contract_log: RecordLog::default(),
            run: SyncRunBuilder::new(now),
        };

        let tracked = cycle.games.len();
        cycle.games.retain(|_, g| !self.scheduler.retention_expired(g, now));
        if cycle.games.len() < tracked {
            debug!(dropped = tracked - cycle.games.len(), "Completed games past retention dropped");
        }

        let mut cut_short = false;
        for league in &self.config.leagues {
            if self.stop_requested(&mut cycle.run) {
                break;
            }
            match self.sync_league(league, now, &mut cycle).await {
                Ok(()) => {}
                Err(SyncError::RateLimitTimeout { waited_ms }) => {
                    warn!(
                        league = %league.key,
                        waited_ms,
                        "No rate limiter slot; ending cycle early"
                    );
                    cycle.run.degrade(format!(
                        "rate limit wait exceeded during {} after {}ms",
                        league.key, waited_ms
                    ));
                    cut_short = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        if !cut_short && !self.stop_requested(&mut cycle.run) {
            self.sync_contracts(now, &mut cycle).await;
            if !self.stop_requested(&mut cycle.run) {
                self.match_contracts(&mut cycle);
            }
        }

        self.commit(cycle, started).await
    }

    /// Shutdown check between steps; marks the run interrupted once
    fn stop_requested(&self, run: &mut SyncRunBuilder) -> bool {
        if !self.shutdown.is_shutdown_requested() {
            return false;
        }
        if !run.is_interrupted() {
            info!("Shutdown requested; skipping the rest of the cycle");
            run.interrupt();
        }
        true
    }

    async fn acquire_slot(&self, run: &mut SyncRunBuilder) -> Result<()> {
        self.limiter
            .wait_until_available(self.config.rate_limit.max_wait())
            .await?;
        run.upstream_calls += 1;
        Ok(())
    }

    async fn sync_league(
        &self,
        league: &LeagueConfig,
        now: DateTime<Utc>,
        cycle: &mut CycleState,
    ) -> Result<()> {
        self.acquire_slot(&mut cycle.run).await?;
        let date = self.config.feeds.scoreboard_date(now);
        let snapshots = match self.scores.fetch_scoreboard(league, date).await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(league = %league.key, %date, error = %e, "Scoreboard fetch failed");
                cycle.run.counts.errored += 1;
                cycle.run.degrade(format!("scoreboard {}: {}", league.key, e));
                return Ok(());
            }
        };

        let threshold = self.config.close_threshold_for(league);
        let mut new_games = BTreeSet::new();
        for snapshot in &snapshots {
            if self.stop_requested(&mut cycle.run) {
                return Ok(());
            }
            if self.apply_snapshot(league, threshold, snapshot, now, cycle) {
                new_games.insert(snapshot.external_id.clone());
            }
        }

        // First sightings are scheduled, not enriched
        let mut due: Vec<String> = cycle
            .games
            .values()
            .filter(|g| g.league == league.key && !new_games.contains(&g.external_id))
            .filter(|g| self.scheduler.should_update(g, now))
            .map(|g| g.external_id.clone())
            .collect();
        due.sort();

        debug!(
            league = %league.key,
            scoreboard = snapshots.len(),
            new = new_games.len(),
            due = due.len(),
            "League scoreboard applied"
        );

        for external_id in due {
            if self.stop_requested(&mut cycle.run) {
                break;
            }
            self.enrich_game(league, threshold, &external_id, now, cycle).await?;
        }
        Ok(())
    }

    /// Upsert one scoreboard row. Returns true for a first sighting.
    fn apply_snapshot(
        &self,
        league: &LeagueConfig,
        threshold: u32,
        snapshot: &ScoreboardGame,
        now: DateTime<Utc>,
        cycle: &mut CycleState,
    ) -> bool {
        let id = snapshot.external_id.as_str();

        if let Some(game) = cycle.games.get_mut(id) {
            let change = game.apply_scoreboard(snapshot, league.final_period, now);
            log_change(game, &change, &snapshot.status_text);
            self.scheduler.tighten(game, threshold, now);
            cycle.game_log.seen(id, change.changed);
            return false;
        }

        let home = self.canonical_team(&league.sport, &snapshot.home_team_name, id);
        let away = self.canonical_team(&league.sport, &snapshot.away_team_name, id);
        let rules = LeagueRules {
            league: &league.key,
            sport: &league.sport,
            final_period: league.final_period,
        };
        let mut game = TrackedGame::first_sighting(snapshot, rules, home, away, now);
        self.scheduler.schedule(&mut game, threshold, now);
        debug!(
            game = id,
            home = %game.home_team,
            away = %game.away_team,
            status = %game.status,
            interval_secs = game.poll_interval_secs,
            "New game tracked"
        );

        cycle.game_log.inserted(id);
        cycle.games.insert(id.to_string(), game);
        true
    }

    fn canonical_team(&self, sport: &str, raw: &str, game_id: &str) -> String {
        match self.extractor.canonicalize(raw, sport) {
            Some(canonical) => canonical,
            None => {
                warn!(
                    game = game_id,
                    sport,
                    team = raw,
                    "Unknown team; game is excluded from matching"
                );
                raw.to_string()
            }
        }
    }

    /// Per-game detail fetch, retried once on a transient failure. A game
    /// that still fails is marked stale and stays due.
    async fn enrich_game(
        &self,
        league: &LeagueConfig,
        threshold: u32,
        external_id: &str,
        now: DateTime<Utc>,
        cycle: &mut CycleState,
    ) -> Result<()> {
        let mut attempt = 0;
        let err = loop {
            attempt += 1;
            self.acquire_slot(&mut cycle.run).await?;
            match self.scores.fetch_game_detail(league, external_id).await {
                Ok(detail) => {
                    if let Some(game) = cycle.games.get_mut(external_id) {
                        let change = game.apply_detail(&detail, league.final_period, now);
                        log_change(game, &change, &detail.status_text);
                        let recovered = std::mem::replace(&mut game.stale, false);
                        self.scheduler.schedule(game, threshold, now);
                        cycle.game_log.seen(external_id, change.changed || recovered);
                    }
                    return Ok(());
                }
                Err(e) if e.is_transient() && attempt < 2 => {
                    debug!(game = external_id, error = %e, "Enrichment failed; retrying once");
                }
                Err(e) => break e,
            }
        };

        warn!(
            game = external_id,
            attempts = attempt,
            error = %err,
            "Enrichment failed; game marked stale"
        );
        if let Some(game) = cycle.games.get_mut(external_id) {
            let newly_stale = !std::mem::replace(&mut game.stale, true);
            cycle.game_log.seen(external_id, newly_stale);
        }
        cycle.run.counts.errored += 1;
        cycle.run.degrade(format!("game {external_id} stale: {err}"));
        Ok(())
    }

    /// Insert new listings and refresh known ones. A feed failure leaves
    /// contracts as they were.
    async fn sync_contracts(&self, now: DateTime<Utc>, cycle: &mut CycleState) {
        let listings = match self.markets.fetch_active_contracts().await {
            Ok(listings) => listings,
            Err(e) => {
                warn!(error = %e, "Market listing fetch failed; contracts unchanged");
                cycle.run.counts.errored += 1;
                cycle.run.degrade(format!("market feed: {e}"));
                return;
            }
        };

        for listing in &listings {
            let id = listing.contract_id.as_str();
            match cycle.contracts.get_mut(id) {
                Some(contract) => {
                    let changed = contract.refresh(listing, now);
                    cycle.contract_log.seen(id, changed);
                }
                None => {
                    cycle
                        .contracts
                        .insert(id.to_string(), MarketContract::from_listing(listing, now));
                    cycle.contract_log.inserted(id);
                }
            }
        }
        debug!(listings = listings.len(), "Market listings applied");
    }

    /// Re-run extraction and matching for every unmatched contract against
    /// every tracked game. Links are not revisited unless the contract was
    /// retitled, in which case the new title must still name the linked game.
    fn match_contracts(&self, cycle: &mut CycleState) {
        let mut games: Vec<&TrackedGame> = cycle.games.values().collect();
        games.sort_by(|a, b| a.external_id.cmp(&b.external_id));

        for contract in cycle.contracts.values_mut() {
            if contract.needs_link_check() && !self.confirm_link(contract, &games) {
                let previous = contract.unlink();
                info!(
                    contract = %contract.contract_id,
                    previous = previous.as_deref().unwrap_or_default(),
                    title = %contract.title,
                    "Retitled contract no longer names its game; link dropped"
                );
                cycle.contract_log.seen(&contract.contract_id, true);
            }
            if contract.is_matched() {
                continue;
            }

            let extracted = self.extractor.extract_teams(&contract.title);
            let mut changed = extracted != contract.extracted;
            contract.extracted = extracted;

            match self.matcher.match_contract(contract.extracted.as_ref(), games.iter().copied()) {
                MatchOutcome::Matched { game_id, score } => {
                    info!(
                        contract = %contract.contract_id,
                        game = %game_id,
                        score,
                        title = %contract.title,
                        "Contract matched"
                    );
                    contract.matched_game_id = Some(game_id);
                    cycle.run.contracts_matched += 1;
                    changed = true;
                }
                MatchOutcome::UnknownTeam { team } => {
                    debug!(
                        contract = %contract.contract_id,
                        team = %team,
                        "Contract blocked by unknown team"
                    );
                }
                MatchOutcome::Ambiguous { .. }
                | MatchOutcome::NoMatch
                | MatchOutcome::NotExtracted => {}
            }

            if changed {
                cycle.contract_log.seen(&contract.contract_id, true);
            }
        }
    }

    /// Re-extract a retitled, linked contract. True if the new pair still
    /// resolves to the linked game and to no other.
    fn confirm_link(&self, contract: &mut MarketContract, games: &[&TrackedGame]) -> bool {
        let extracted = self.extractor.extract_teams(&contract.title);
        let confirmed = match (&contract.matched_game_id, extracted.as_ref()) {
            (Some(linked), Some(_)) => matches!(
                self.matcher.match_contract(extracted.as_ref(), games.iter().copied()),
                MatchOutcome::Matched { ref game_id, .. } if game_id == linked
            ),
            _ => false,
        };
        if confirmed {
            contract.extracted = extracted;
        }
        confirmed
    }

    async fn commit(&mut self, mut cycle: CycleState, started: Instant) -> Result<SyncRun> {
        let (games_inserted, games_updated, games_skipped) = cycle.game_log.counts();
        let (contracts_inserted, contracts_updated, contracts_skipped) =
            cycle.contract_log.counts();
        cycle.run.counts.inserted = games_inserted + contracts_inserted;
        cycle.run.counts.updated = games_updated + contracts_updated;
        cycle.run.counts.skipped = games_skipped + contracts_skipped;
        cycle.run.contracts_unmatched =
            cycle.contracts.values().filter(|c| !c.is_matched()).count() as u32;

        let duration_ms = started.elapsed().as_millis() as u64;
        let sync_run = cycle.run.finish(duration_ms);
        let batch = CycleBatch {
            games: cycle
                .game_log
                .seen
                .iter()
                .filter_map(|id| cycle.games.get(id).cloned())
                .collect(),
            contracts: cycle
                .contract_log
                .seen
                .iter()
                .filter_map(|id| cycle.contracts.get(id).cloned())
                .collect(),
            sync_run: sync_run.clone(),
        };

        if let Err(e) = self.store.commit_cycle(&batch).await {
            error!(error = %e, "Cycle commit failed; tracked state not advanced");
            let failed = cycle.run.finish_failed(duration_ms, &e.to_string());
            if let Err(audit) = self.store.append_sync_run(&failed).await {
                warn!(error = %audit, "Could not record failed sync run");
            }
            return Err(e);
        }

        self.games = cycle.games;
        self.contracts = cycle.contracts;

        info!(
            run_id = %sync_run.id,
            status = %sync_run.status,
            inserted = sync_run.counts.inserted,
            updated = sync_run.counts.updated,
            skipped = sync_run.counts.skipped,
            errored = sync_run.counts.errored,
            matched = sync_run.contracts_matched,
            unmatched = sync_run.contracts_unmatched,
            upstream_calls = sync_run.upstream_calls,
            duration_ms,
            "Sync cycle committed"
        );
        Ok(sync_run)
    }
}

fn log_change(game: &TrackedGame, change: &GameChange, reported: &str) {
    if change.regression_rejected {
        warn!(
            game = %game.external_id,
            status = %game.status,
            reported,
            "Ignored status regression"
        );
    }
    if change.status_changed {
        info!(
            game = %game.external_id,
            status = %game.status,
            abnormal = game.abnormal_completion,
            "Game status changed"
        );
    }
}
