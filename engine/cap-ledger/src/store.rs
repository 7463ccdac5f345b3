//! Storage seam for the cap ledger
//!
//! Every core component reads and writes exclusively through [`LedgerStore`].
//! The trait is deliberately narrow: only the operations the accounting,
//! valuation, and reconciliation paths need.

use crate::error::Result;
use crate::types::{
    CapAdjustment, CapTransaction, Contract, League, Player, PlayerSeasonStats, Team,
    TransactionKind,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cap transaction about to be appended to the audit trail
#[derive(Debug, Clone)]
pub struct NewCapTransaction {
    pub team_id: i64,
    pub season: i32,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub contract_id: Option<i64>,
    pub note: Option<String>,
}

/// Summary row persisted after a reconciliation run that released players
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncHistoryEntry {
    pub run_id: Uuid,
    pub league_id: i64,
    pub contracts_checked: usize,
    pub contracts_released: usize,
    pub dead_cap_total: Decimal,
    pub error_count: usize,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Abstract trait for ledger persistence backends
#[async_trait::async_trait]
pub trait LedgerStore: Send + Sync {
    async fn league(&self, league_id: i64) -> Result<League>;

    async fn leagues(&self) -> Result<Vec<League>>;

    async fn team(&self, team_id: i64) -> Result<Team>;

    async fn teams_in_league(&self, league_id: i64) -> Result<Vec<Team>>;

    async fn player(&self, player_id: i64) -> Result<Player>;

    async fn contract(&self, contract_id: i64) -> Result<Contract>;

    /// Active contracts held by one team
    async fn active_contracts_for_team(&self, team_id: i64) -> Result<Vec<Contract>>;

    /// Active contracts across a whole league
    async fn active_contracts_in_league(&self, league_id: i64) -> Result<Vec<Contract>>;

    /// All adjustment rows for a team; season resolution happens in the caller
    async fn adjustments_for_team(&self, team_id: i64) -> Result<Vec<CapAdjustment>>;

    /// Transactions for a team and season, optionally filtered by kind
    async fn transactions_for_team(
        &self,
        team_id: i64,
        season: i32,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<CapTransaction>>;

    /// Append one entry to the audit trail
    async fn append_transaction(&self, tx: NewCapTransaction) -> Result<CapTransaction>;

    /// Release a contract and post its dead-money transaction as one atomic
    /// unit of work.
    ///
    /// Sets status to `Released`, records `dead_cap_hit` and the reason, and
    /// appends exactly one `DeadMoney` transaction when `dead_cap > 0`.
    /// Either both writes land or neither does. Releasing a contract that is
    /// not `Active` fails with `AlreadyReleased` and writes nothing, which is
    /// what makes re-running reconciliation safe.
    async fn release_contract(
        &self,
        contract_id: i64,
        dead_cap: Decimal,
        reason: &str,
        season: i32,
    ) -> Result<Contract>;

    /// Persist a reconciliation summary row
    async fn record_sync_history(&self, entry: SyncHistoryEntry) -> Result<()>;
}

/// Abstract trait for the player statistics source
#[async_trait::async_trait]
pub trait StatsSource: Send + Sync {
    /// Stats for one player in one season, if any were recorded
    async fn season_stats(&self, player_id: i64, season: i32)
        -> Result<Option<PlayerSeasonStats>>;

    /// Whether the player has a stats record in any season. Absence across
    /// all seasons signals a rookie.
    async fn has_any_stats(&self, player_id: i64) -> Result<bool>;
}
