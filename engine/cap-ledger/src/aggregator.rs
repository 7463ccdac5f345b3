//! Cap aggregator
//!
//! Folds three independently-maintained sources into one cap-room figure:
//! active contract salaries, release-driven dead money on the transaction
//! trail, and the per-season adjustment ledger. A pure query over the store,
//! never a running balance, so it works for any of the five projection
//! seasons.

use crate::error::{LedgerError, Result};
use crate::store::LedgerStore;
use crate::types::{TransactionKind, SUPPORTED_SEASONS};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Derived cap state for one team and season.
///
/// Identity: `cap_room + committed_salary + dead_money_total == salary_cap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapSummary {
    pub team_id: i64,
    pub season: i32,
    pub salary_cap: Decimal,
    pub committed_salary: Decimal,
    pub dead_money_releases: Decimal,
    pub dead_money_trades: Decimal,
    pub dead_money_total: Decimal,
    pub cap_room: Decimal,
    pub contract_count: usize,
}

/// Compute the cap summary for one team and season.
pub async fn cap_summary(
    store: &dyn LedgerStore,
    team_id: i64,
    season: i32,
) -> Result<CapSummary> {
    let team = store.team(team_id).await?;
    let league = store.league(team.league_id).await?;

    let contracts = store.active_contracts_for_team(team_id).await?;
    let mut committed_salary = Decimal::ZERO;
    let mut contract_count = 0;
    for contract in contracts.iter().filter(|c| c.covers_season(season)) {
        committed_salary += contract.salary;
        contract_count += 1;
    }

    let dead_money_releases: Decimal = store
        .transactions_for_team(team_id, season, Some(TransactionKind::DeadMoney))
        .await?
        .iter()
        .map(|tx| tx.amount)
        .sum();

    // Adjustments outside the supported window resolve to zero, not an error.
    let dead_money_trades: Decimal = store
        .adjustments_for_team(team_id)
        .await?
        .iter()
        .map(|adj| adj.amount_for(season))
        .sum();

    let dead_money_total = dead_money_releases + dead_money_trades;
    let cap_room = league.salary_cap - committed_salary - dead_money_total;

    Ok(CapSummary {
        team_id,
        season,
        salary_cap: league.salary_cap,
        committed_salary,
        dead_money_releases,
        dead_money_trades,
        dead_money_total,
        cap_room,
        contract_count,
    })
}

/// Five-season cap projection for forward planning.
pub async fn cap_projection(store: &dyn LedgerStore, team_id: i64) -> Result<Vec<CapSummary>> {
    let mut projection = Vec::with_capacity(5);
    for season in SUPPORTED_SEASONS {
        projection.push(cap_summary(store, team_id, season).await?);
    }
    Ok(projection)
}

/// Check that a proposed salary fits under the team's current cap room.
pub async fn validate_signing(
    store: &dyn LedgerStore,
    team_id: i64,
    season: i32,
    salary: Decimal,
) -> Result<()> {
    if salary < Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "Proposed salary must be non-negative, got {}",
            salary
        )));
    }
    let summary = cap_summary(store, team_id, season).await?;
    if salary > summary.cap_room {
        return Err(LedgerError::InsufficientCapRoom {
            required: salary,
            available: summary.cap_room,
        });
    }
    Ok(())
}
