//! In-memory ledger store
//!
//! Backs every unit and integration test in the workspace. Mirrors the
//! Postgres implementation's semantics, including the atomicity and
//! idempotence of `release_contract`.

use crate::error::{LedgerError, Result};
use crate::store::{LedgerStore, NewCapTransaction, StatsSource, SyncHistoryEntry};
use crate::types::{
    CapAdjustment, CapTransaction, Contract, ContractStatus, League, Player, PlayerSeasonStats,
    Team, TransactionKind,
};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    leagues: HashMap<i64, League>,
    teams: HashMap<i64, Team>,
    players: HashMap<i64, Player>,
    contracts: HashMap<i64, Contract>,
    adjustments: HashMap<i64, CapAdjustment>,
    transactions: Vec<CapTransaction>,
    sync_history: Vec<SyncHistoryEntry>,
    next_id: i64,
}

impl Tables {
    fn alloc_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory implementation of [`LedgerStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a league, assigning its id
    pub async fn add_league(&self, mut league: League) -> League {
        let mut t = self.tables.write().await;
        league.id = t.alloc_id();
        t.leagues.insert(league.id, league.clone());
        league
    }

    /// Insert a team, assigning its id
    pub async fn add_team(&self, mut team: Team) -> Team {
        let mut t = self.tables.write().await;
        team.id = t.alloc_id();
        t.teams.insert(team.id, team.clone());
        team
    }

    /// Insert a player, assigning its id
    pub async fn add_player(&self, mut player: Player) -> Player {
        let mut t = self.tables.write().await;
        player.id = t.alloc_id();
        t.players.insert(player.id, player.clone());
        player
    }

    /// Insert a contract after checking its invariants
    pub async fn add_contract(&self, mut contract: Contract) -> Result<Contract> {
        contract.validate()?;
        let mut t = self.tables.write().await;
        contract.id = t.alloc_id();
        t.contracts.insert(contract.id, contract.clone());
        Ok(contract)
    }

    /// Insert an adjustment after checking its season window
    pub async fn add_adjustment(&self, mut adjustment: CapAdjustment) -> Result<CapAdjustment> {
        adjustment.validate()?;
        let mut t = self.tables.write().await;
        adjustment.id = t.alloc_id();
        t.adjustments.insert(adjustment.id, adjustment.clone());
        Ok(adjustment)
    }

    /// Number of transactions currently on the trail (test helper)
    pub async fn transaction_count(&self) -> usize {
        self.tables.read().await.transactions.len()
    }

    /// Recorded sync-history rows (test helper)
    pub async fn sync_history(&self) -> Vec<SyncHistoryEntry> {
        self.tables.read().await.sync_history.clone()
    }
}

#[async_trait::async_trait]
impl LedgerStore for MemoryStore {
    async fn league(&self, league_id: i64) -> Result<League> {
        self.tables
            .read()
            .await
            .leagues
            .get(&league_id)
            .cloned()
            .ok_or(LedgerError::NotFound { entity: "League", id: league_id })
    }

    async fn leagues(&self) -> Result<Vec<League>> {
        let mut all: Vec<League> = self.tables.read().await.leagues.values().cloned().collect();
        all.sort_by_key(|l| l.id);
        Ok(all)
    }

    async fn team(&self, team_id: i64) -> Result<Team> {
        self.tables
            .read()
            .await
            .teams
            .get(&team_id)
            .cloned()
            .ok_or(LedgerError::NotFound { entity: "Team", id: team_id })
    }

    async fn teams_in_league(&self, league_id: i64) -> Result<Vec<Team>> {
        let mut teams: Vec<Team> = self
            .tables
            .read()
            .await
            .teams
            .values()
            .filter(|t| t.league_id == league_id)
            .cloned()
            .collect();
        teams.sort_by_key(|t| t.id);
        Ok(teams)
    }

    async fn player(&self, player_id: i64) -> Result<Player> {
        self.tables
            .read()
            .await
            .players
            .get(&player_id)
            .cloned()
            .ok_or(LedgerError::NotFound { entity: "Player", id: player_id })
    }

    async fn contract(&self, contract_id: i64) -> Result<Contract> {
        self.tables
            .read()
            .await
            .contracts
            .get(&contract_id)
            .cloned()
            .ok_or(LedgerError::NotFound { entity: "Contract", id: contract_id })
    }

    async fn active_contracts_for_team(&self, team_id: i64) -> Result<Vec<Contract>> {
        let mut contracts: Vec<Contract> = self
            .tables
            .read()
            .await
            .contracts
            .values()
            .filter(|c| c.team_id == team_id && c.status == ContractStatus::Active)
            .cloned()
            .collect();
        contracts.sort_by_key(|c| c.id);
        Ok(contracts)
    }

    async fn active_contracts_in_league(&self, league_id: i64) -> Result<Vec<Contract>> {
        let t = self.tables.read().await;
        let mut contracts: Vec<Contract> = t
            .contracts
            .values()
            .filter(|c| c.status == ContractStatus::Active)
            .filter(|c| {
                t.teams.get(&c.team_id).map(|team| team.league_id == league_id).unwrap_or(false)
            })
            .cloned()
            .collect();
        contracts.sort_by_key(|c| c.id);
        Ok(contracts)
    }

    async fn adjustments_for_team(&self, team_id: i64) -> Result<Vec<CapAdjustment>> {
        let mut adjustments: Vec<CapAdjustment> = self
            .tables
            .read()
            .await
            .adjustments
            .values()
            .filter(|a| a.team_id == team_id)
            .cloned()
            .collect();
        adjustments.sort_by_key(|a| a.id);
        Ok(adjustments)
    }

    async fn transactions_for_team(
        &self,
        team_id: i64,
        season: i32,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<CapTransaction>> {
        Ok(self
            .tables
            .read()
            .await
            .transactions
            .iter()
            .filter(|tx| tx.team_id == team_id && tx.season == season)
            .filter(|tx| kind.map_or(true, |k| tx.kind == k))
            .cloned()
            .collect())
    }

    async fn append_transaction(&self, tx: NewCapTransaction) -> Result<CapTransaction> {
        let mut t = self.tables.write().await;
        let record = CapTransaction {
            id: t.alloc_id(),
            team_id: tx.team_id,
            season: tx.season,
            kind: tx.kind,
            amount: tx.amount,
            contract_id: tx.contract_id,
            note: tx.note,
            created_at: Utc::now(),
        };
        t.transactions.push(record.clone());
        Ok(record)
    }

    async fn release_contract(
        &self,
        contract_id: i64,
        dead_cap: Decimal,
        reason: &str,
        season: i32,
    ) -> Result<Contract> {
        // Single write-lock scope makes the status flip and the transaction
        // append one atomic unit.
        let mut t = self.tables.write().await;

        let contract = t
            .contracts
            .get(&contract_id)
            .cloned()
            .ok_or(LedgerError::NotFound { entity: "Contract", id: contract_id })?;

        if contract.status != ContractStatus::Active {
            return Err(LedgerError::AlreadyReleased { contract_id });
        }

        let mut released = contract;
        released.status = ContractStatus::Released;
        released.dead_cap_hit = Some(dead_cap);
        released.release_reason = Some(reason.to_string());
        released.updated_at = Utc::now();
        t.contracts.insert(contract_id, released.clone());

        if dead_cap > Decimal::ZERO {
            let tx_id = t.alloc_id();
            t.transactions.push(CapTransaction {
                id: tx_id,
                team_id: released.team_id,
                season,
                kind: TransactionKind::DeadMoney,
                amount: dead_cap,
                contract_id: Some(contract_id),
                note: Some(format!("release: {}", reason)),
                created_at: Utc::now(),
            });
        }

        Ok(released)
    }

    async fn record_sync_history(&self, entry: SyncHistoryEntry) -> Result<()> {
        self.tables.write().await.sync_history.push(entry);
        Ok(())
    }
}

/// In-memory implementation of [`StatsSource`]
#[derive(Debug, Default)]
pub struct MemoryStats {
    records: RwLock<HashMap<(i64, i32), PlayerSeasonStats>>,
}

impl MemoryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_stats(&self, player_id: i64, season: i32, games_played: i32, ppg: f64) {
        self.records.write().await.insert(
            (player_id, season),
            PlayerSeasonStats { player_id, season, games_played, avg_points_per_game: ppg },
        );
    }
}

#[async_trait::async_trait]
impl StatsSource for MemoryStats {
    async fn season_stats(
        &self,
        player_id: i64,
        season: i32,
    ) -> Result<Option<PlayerSeasonStats>> {
        Ok(self.records.read().await.get(&(player_id, season)).cloned())
    }

    async fn has_any_stats(&self, player_id: i64) -> Result<bool> {
        Ok(self.records.read().await.keys().any(|(pid, _)| *pid == player_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_contract(team_id: i64, player_id: i64, salary: i64) -> Contract {
        Contract {
            id: 0,
            team_id,
            player_id,
            salary: Decimal::from(salary),
            years_total: 3,
            years_remaining: 3,
            start_season: 2026,
            end_season: 2028,
            status: ContractStatus::Active,
            dead_cap_hit: None,
            release_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn release_flips_status_and_posts_one_transaction() {
        let store = MemoryStore::new();
        let contract = store.add_contract(test_contract(1, 1, 30)).await.unwrap();

        let released = store
            .release_contract(contract.id, Decimal::from(18), "dropped", 2026)
            .await
            .unwrap();

        assert_eq!(released.status, ContractStatus::Released);
        assert_eq!(released.dead_cap_hit, Some(Decimal::from(18)));
        assert_eq!(released.release_reason.as_deref(), Some("dropped"));

        let txs = store
            .transactions_for_team(1, 2026, Some(TransactionKind::DeadMoney))
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].amount, Decimal::from(18));
        assert_eq!(txs[0].contract_id, Some(contract.id));
    }

    #[tokio::test]
    async fn second_release_is_rejected_without_new_writes() {
        let store = MemoryStore::new();
        let contract = store.add_contract(test_contract(1, 1, 30)).await.unwrap();

        store.release_contract(contract.id, Decimal::from(18), "dropped", 2026).await.unwrap();
        let before = store.transaction_count().await;

        let err = store
            .release_contract(contract.id, Decimal::from(18), "dropped", 2026)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyReleased { .. }));
        assert_eq!(store.transaction_count().await, before);
    }

    #[tokio::test]
    async fn zero_dead_cap_release_posts_no_transaction() {
        let store = MemoryStore::new();
        let contract = store.add_contract(test_contract(1, 1, 30)).await.unwrap();

        store.release_contract(contract.id, Decimal::ZERO, "dropped", 2026).await.unwrap();
        assert_eq!(store.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn appended_transactions_show_up_in_the_season_trail() {
        let store = MemoryStore::new();
        store
            .append_transaction(NewCapTransaction {
                team_id: 3,
                season: 2026,
                kind: TransactionKind::Correction,
                amount: Decimal::from(-4),
                contract_id: None,
                note: Some("commissioner correction".to_string()),
            })
            .await
            .unwrap();

        let txs = store.transactions_for_team(3, 2026, None).await.unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].kind, TransactionKind::Correction);
        assert_eq!(txs[0].amount, Decimal::from(-4));
        // Other seasons and kinds stay filtered out
        assert!(store
            .transactions_for_team(3, 2027, None)
            .await
            .unwrap()
            .is_empty());
        assert!(store
            .transactions_for_team(3, 2026, Some(TransactionKind::DeadMoney))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn stats_source_signals_rookie_on_total_absence() {
        let stats = MemoryStats::new();
        stats.set_stats(7, 2025, 15, 18.2).await;

        assert!(stats.has_any_stats(7).await.unwrap());
        assert!(!stats.has_any_stats(8).await.unwrap());
        assert!(stats.season_stats(7, 2026).await.unwrap().is_none());
    }
}
