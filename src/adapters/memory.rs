//! In-process store for dry runs and tests

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::traits::{CycleBatch, SyncStore};
use crate::domain::{MarketContract, SyncRun, TrackedGame};
use crate::error::{Result, SyncError};

#[derive(Debug, Default)]
struct Tables {
    games: BTreeMap<String, TrackedGame>,
    contracts: BTreeMap<String, MarketContract>,
    runs: Vec<SyncRun>,
}

impl Tables {
    fn put_contract(&mut self, contract: &MarketContract) {
        self.contracts.insert(contract.contract_id.clone(), contract.clone());
    }

    fn put_run(&mut self, run: &SyncRun) {
        if !self.runs.iter().any(|r| r.id == run.id) {
            self.runs.push(run.clone());
        }
    }
}

/// Keyed maps behind one lock. `commit_cycle` applies a batch under a single
/// lock acquisition, so readers never see half a cycle.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent cycle commit fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SyncError::Persistence("memory store write rejected".to_string()));
        }
        Ok(())
    }

    pub fn games(&self) -> Vec<TrackedGame> {
        self.tables().games.values().cloned().collect()
    }

    pub fn game(&self, external_id: &str) -> Option<TrackedGame> {
        self.tables().games.get(external_id).cloned()
    }

    pub fn contracts(&self) -> Vec<MarketContract> {
        self.tables().contracts.values().cloned().collect()
    }

    pub fn contract(&self, contract_id: &str) -> Option<MarketContract> {
        self.tables().contracts.get(contract_id).cloned()
    }

    pub fn sync_runs(&self) -> Vec<SyncRun> {
        self.tables().runs.clone()
    }
}

#[async_trait]
impl SyncStore for MemoryStore {
    async fn upsert_game(&self, game: &TrackedGame) -> Result<()> {
        self.check_writable()?;
        self.tables().games.insert(game.external_id.clone(), game.clone());
        Ok(())
    }

    async fn upsert_contract(&self, contract: &MarketContract) -> Result<()> {
        self.check_writable()?;
        self.tables().put_contract(contract);
        Ok(())
    }

    /// Run records are accepted even while writes are failing, mirroring a
    /// store whose cycle transaction fails but whose audit insert succeeds
    async fn append_sync_run(&self, run: &SyncRun) -> Result<()> {
        self.tables().put_run(run);
        Ok(())
    }

    async fn commit_cycle(&self, batch: &CycleBatch) -> Result<()> {
        self.check_writable()?;
        let mut tables = self.tables();
        for game in &batch.games {
            tables.games.insert(game.external_id.clone(), game.clone());
        }
        for contract in &batch.contracts {
            tables.put_contract(contract);
        }
        tables.put_run(&batch.sync_run);
        Ok(())
    }

    async fn load_games(&self) -> Result<Vec<TrackedGame>> {
        Ok(self.games())
    }

    async fn load_contracts(&self) -> Result<Vec<MarketContract>> {
        Ok(self.contracts())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ContractListing, SyncRunBuilder};
    use chrono::Utc;

    fn contract(id: &str, matched: Option<&str>) -> MarketContract {
        let listing = ContractListing {
            contract_id: id.into(),
            title: "Heat @ Knicks".into(),
            yes_price: None,
            no_price: None,
            volume: None,
            close_time: None,
        };
        let mut c = MarketContract::from_listing(&listing, Utc::now());
        c.matched_game_id = matched.map(str::to_string);
        c
    }

    #[tokio::test]
    async fn test_commit_is_idempotent() {
        let store = MemoryStore::new();
        let batch = CycleBatch {
            games: vec![],
            contracts: vec![contract("c1", None)],
            sync_run: SyncRunBuilder::new(Utc::now()).finish(3),
        };

        store.commit_cycle(&batch).await.unwrap();
        store.commit_cycle(&batch).await.unwrap();
        assert_eq!(store.contracts().len(), 1);
        assert_eq!(store.sync_runs().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_link_is_written() {
        let store = MemoryStore::new();
        store.upsert_contract(&contract("c1", Some("401"))).await.unwrap();
        store.upsert_contract(&contract("c1", None)).await.unwrap();
        assert_eq!(store.contracts()[0].matched_game_id, None);
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let batch = CycleBatch {
            games: vec![],
            contracts: vec![contract("c1", None)],
            sync_run: SyncRunBuilder::new(Utc::now()).finish(1),
        };
        let err = store.commit_cycle(&batch).await.unwrap_err();
        assert!(err.is_cycle_fatal());
        assert!(store.contracts().is_empty());
        assert!(store.sync_runs().is_empty());
    }
}
