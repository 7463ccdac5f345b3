//! Contract evaluator and league ranking engine
//!
//! Rank is relative, so scoring one contract means scoring them all.
//! [`league_rankings`] is the batch path; [`evaluate_contract`] reuses it
//! rather than re-estimating per contract. Callers needing many evaluations
//! should call the batch path once and index into the result.

use crate::estimator::{estimate, EstimateRequest};
use cap_ledger::{Contract, LedgerStore, Result, StatsSource};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A ranked contract never classifies as Legendary below this production
const LEGENDARY_MIN_PPG: f64 = 10.0;
const LEGENDARY_MAX_RANK: usize = 10;
const LEGENDARY_MIN_SCORE: f64 = 50.0;
const STEAL_THRESHOLD: f64 = 25.0;
const BUST_THRESHOLD: f64 = -25.0;

/// Qualitative contract-value tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rating {
    Rookie,
    Bust,
    Good,
    Steal,
    Legendary,
}

/// One row of the league-wide value ranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedContract {
    pub contract_id: i64,
    pub team_id: i64,
    pub player_id: i64,
    pub player_name: String,
    pub salary: Decimal,
    pub estimated: Decimal,
    /// Percentage by which the market estimate exceeds the actual salary.
    /// Positive = the team is underpaying.
    pub value_score: f64,
    /// 1-indexed league rank; rank 1 is the best value
    pub rank: usize,
    pub rating: Rating,
    pub avg_ppg: f64,
}

/// Evaluation of a single contract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub contract_id: i64,
    pub rating: Rating,
    /// Absent for rookies, who have no basis for valuation
    pub value_score: Option<f64>,
    pub rank: Option<usize>,
    pub estimated: Option<Decimal>,
}

/// Score and rank every active salaried contract in a league.
///
/// Contracts belonging to players with no stats history in any season are
/// skipped here; they evaluate to `Rookie` through [`evaluate_contract`].
/// Deterministic for an unchanged contract set (ties broken by contract id).
pub async fn league_rankings(
    store: &dyn LedgerStore,
    stats: &dyn StatsSource,
    league_id: i64,
) -> Result<Vec<RankedContract>> {
    let league = store.league(league_id).await?;
    let season = league.current_season;

    let mut scored: Vec<RankedContract> = Vec::new();
    for contract in store.active_contracts_in_league(league_id).await? {
        if contract.salary <= Decimal::ZERO {
            continue;
        }
        let player = store.player(contract.player_id).await?;
        if !stats.has_any_stats(player.id).await? {
            continue;
        }

        let current = stats.season_stats(player.id, season).await?;
        let avg_ppg = current.as_ref().map(|s| s.avg_points_per_game);
        let games_played = current.as_ref().map(|s| s.games_played);

        // The player's own salary is deliberately left out of the request to
        // avoid anchoring the estimate on the deal being judged.
        let market = estimate(
            store,
            stats,
            &EstimateRequest {
                league_id,
                player_id: player.id,
                position: player.position,
                age: player.age,
                avg_ppg,
                games_played,
                prior_salary: None,
            },
        )
        .await?;

        scored.push(RankedContract {
            contract_id: contract.id,
            team_id: contract.team_id,
            player_id: player.id,
            player_name: player.name,
            salary: contract.salary,
            estimated: market.amount,
            value_score: value_score(market.amount, contract.salary),
            rank: 0,
            rating: Rating::Good,
            avg_ppg: avg_ppg.unwrap_or(0.0),
        });
    }

    scored.sort_by(|a, b| {
        b.value_score
            .partial_cmp(&a.value_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.contract_id.cmp(&b.contract_id))
    });

    for (index, row) in scored.iter_mut().enumerate() {
        row.rank = index + 1;
        row.rating = classify(row.value_score, row.rank, row.avg_ppg);
    }

    Ok(scored)
}

/// Evaluate one contract against the full league ranking.
pub async fn evaluate_contract(
    store: &dyn LedgerStore,
    stats: &dyn StatsSource,
    contract_id: i64,
) -> Result<Evaluation> {
    let contract = store.contract(contract_id).await?;
    let team = store.team(contract.team_id).await?;

    if !stats.has_any_stats(contract.player_id).await? {
        return Ok(Evaluation {
            contract_id,
            rating: Rating::Rookie,
            value_score: None,
            rank: None,
            estimated: None,
        });
    }

    let rankings = league_rankings(store, stats, team.league_id).await?;
    match find_ranked(&rankings, &contract) {
        Some(row) => Ok(Evaluation {
            contract_id,
            rating: row.rating,
            value_score: Some(row.value_score),
            rank: Some(row.rank),
            estimated: Some(row.estimated),
        }),
        // Unranked (zero salary or no longer active): neutral, never an error
        None => Ok(Evaluation {
            contract_id,
            rating: Rating::Good,
            value_score: Some(0.0),
            rank: None,
            estimated: None,
        }),
    }
}

/// `(estimated - actual) / estimated * 100`, zero when the estimate is zero
fn value_score(estimated: Decimal, actual: Decimal) -> f64 {
    let estimated = estimated.to_f64().unwrap_or(0.0);
    if estimated == 0.0 {
        return 0.0;
    }
    let actual = actual.to_f64().unwrap_or(0.0);
    (estimated - actual) / estimated * 100.0
}

fn classify(score: f64, rank: usize, avg_ppg: f64) -> Rating {
    let base = if score < BUST_THRESHOLD {
        Rating::Bust
    } else if score < STEAL_THRESHOLD {
        Rating::Good
    } else {
        Rating::Steal
    };

    // The production floor keeps low-usage players from looking legendary
    // purely on a cheap salary.
    if base == Rating::Steal
        && rank <= LEGENDARY_MAX_RANK
        && score >= LEGENDARY_MIN_SCORE
        && avg_ppg >= LEGENDARY_MIN_PPG
    {
        Rating::Legendary
    } else {
        base
    }
}

/// Convenience for callers that already hold the batch ranking
pub fn find_ranked<'a>(
    rankings: &'a [RankedContract],
    contract: &Contract,
) -> Option<&'a RankedContract> {
    rankings.iter().find(|r| r.contract_id == contract.id)
}
