//! Contract estimator
//!
//! Produces a fair-market salary estimate for a player from comparable
//! contracted players, with positional fallbacks and age/availability
//! adjustments. Pure given the store snapshot at call time; results are
//! never cached because league state changes between calls.

use cap_ledger::{LedgerStore, Position, Result, StatsSource};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Games below this count draw an availability penalty
const FULL_SEASON_GAMES: i32 = 14;
/// Dollars deducted per missing game
const MISSING_GAME_PENALTY: f64 = 0.5;
/// Prior salary only matters when it differs from the base by more than this
const PRIOR_DELTA_THRESHOLD: f64 = 2.0;
/// Share of the prior-salary delta blended into the estimate
const PRIOR_BLEND: f64 = 0.3;
/// Linear penalty per year of age above the decline threshold
const AGE_DECLINE_START: i32 = 28;
const AGE_DECLINE_PER_YEAR: f64 = 2.0;
/// Prime age band earning a flat bonus
const PRIME_AGE: std::ops::RangeInclusive<i32> = 24..=26;

/// Per-position market parameters
#[derive(Debug, Clone, Copy)]
pub struct PositionParams {
    pub floor: f64,
    pub ceiling: f64,
    pub baseline_ppg: f64,
    pub dollars_per_point: f64,
    pub prime_bonus: f64,
    /// Comparable PPG window (wider for quarterbacks)
    pub comparable_window: f64,
}

impl PositionParams {
    pub const fn for_position(position: Position) -> &'static PositionParams {
        match position {
            Position::QB => &PositionParams {
                floor: 10.0,
                ceiling: 60.0,
                baseline_ppg: 18.0,
                dollars_per_point: 1.5,
                prime_bonus: 3.0,
                comparable_window: 3.0,
            },
            Position::RB => &PositionParams {
                floor: 5.0,
                ceiling: 50.0,
                baseline_ppg: 12.0,
                dollars_per_point: 2.0,
                prime_bonus: 3.0,
                comparable_window: 2.0,
            },
            Position::WR => &PositionParams {
                floor: 5.0,
                ceiling: 50.0,
                baseline_ppg: 12.0,
                dollars_per_point: 2.0,
                prime_bonus: 3.0,
                comparable_window: 2.0,
            },
            Position::TE => &PositionParams {
                floor: 3.0,
                ceiling: 35.0,
                baseline_ppg: 8.0,
                dollars_per_point: 2.0,
                prime_bonus: 2.0,
                comparable_window: 2.0,
            },
            Position::K => &PositionParams {
                floor: 1.0,
                ceiling: 10.0,
                baseline_ppg: 8.0,
                dollars_per_point: 0.5,
                prime_bonus: 1.0,
                comparable_window: 2.0,
            },
            Position::DEF => &PositionParams {
                floor: 1.0,
                ceiling: 12.0,
                baseline_ppg: 7.0,
                dollars_per_point: 0.5,
                prime_bonus: 1.0,
                comparable_window: 2.0,
            },
        }
    }
}

/// Inputs to one estimate
#[derive(Debug, Clone)]
pub struct EstimateRequest {
    pub league_id: i64,
    pub player_id: i64,
    pub position: Position,
    pub age: Option<i32>,
    /// Most recent season's per-game fantasy-point average
    pub avg_ppg: Option<f64>,
    pub games_played: Option<i32>,
    pub prior_salary: Option<Decimal>,
}

/// How much signal backed the estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// A same-position player used as a pricing reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comparable {
    pub player_id: i64,
    pub player_name: String,
    pub salary: Decimal,
    pub avg_ppg: f64,
}

/// Market estimate with its explainability payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Estimate {
    /// Fair-market salary, rounded to whole dollars
    pub amount: Decimal,
    pub low: Decimal,
    pub high: Decimal,
    pub confidence: Confidence,
    pub comparables: Vec<Comparable>,
}

/// Estimate a fair-market salary for the requested player.
pub async fn estimate(
    store: &dyn LedgerStore,
    stats: &dyn StatsSource,
    request: &EstimateRequest,
) -> Result<Estimate> {
    let league = store.league(request.league_id).await?;
    let season = league.current_season;
    let params = PositionParams::for_position(request.position);

    // Candidate pool: every other active contract at the position. Salaries
    // feed the fallback average; current-season PPG decides comparability.
    let mut position_salaries: Vec<f64> = Vec::new();
    let mut comparables: Vec<Comparable> = Vec::new();

    for contract in store.active_contracts_in_league(request.league_id).await? {
        if contract.player_id == request.player_id {
            continue;
        }
        let player = store.player(contract.player_id).await?;
        if player.position != request.position {
            continue;
        }
        let salary = contract.salary.to_f64().unwrap_or(0.0);
        position_salaries.push(salary);

        if let Some(target_ppg) = request.avg_ppg {
            if let Some(record) = stats.season_stats(player.id, season).await? {
                let diff = (record.avg_points_per_game - target_ppg).abs();
                if diff <= params.comparable_window {
                    comparables.push(Comparable {
                        player_id: player.id,
                        player_name: player.name.clone(),
                        salary: contract.salary,
                        avg_ppg: record.avg_points_per_game,
                    });
                }
            }
        }
    }

    let games = request.games_played.unwrap_or(0);
    let used_comparables = comparables.len() >= 2;

    let mut base = if used_comparables {
        weighted_comparable_average(&comparables, request.avg_ppg.unwrap_or(0.0))
    } else {
        fallback_base(params, &position_salaries, request)
    };

    // Availability penalty applies on both paths
    if let Some(games) = request.games_played {
        if games < FULL_SEASON_GAMES {
            base -= MISSING_GAME_PENALTY * f64::from(FULL_SEASON_GAMES - games);
        }
    }

    // Prior price is informative but must not dominate
    if let Some(prior) = request.prior_salary {
        let prior = prior.to_f64().unwrap_or(0.0);
        let delta = prior - base;
        if delta.abs() > PRIOR_DELTA_THRESHOLD {
            base += PRIOR_BLEND * delta;
        }
    }

    let amount = base.clamp(params.floor, params.ceiling).round();
    // +/-10% range with a minimum five-dollar total spread
    let half_spread = (amount * 0.10).max(2.5);
    let low = (amount - half_spread).max(0.0).round();
    let high = (amount + half_spread).round();

    let confidence = if comparables.len() >= 3 && games >= 10 {
        Confidence::High
    } else if used_comparables {
        Confidence::Medium
    } else if comparables.is_empty() && games >= 6 {
        Confidence::Low
    } else {
        Confidence::Medium
    };

    Ok(Estimate {
        amount: Decimal::from(amount as i64),
        low: Decimal::from(low as i64),
        high: Decimal::from(high as i64),
        confidence,
        comparables,
    })
}

/// PPG-distance-weighted salary average. Weight `1/(1+|diff|)` favors closer
/// comparables without a hard cutoff.
fn weighted_comparable_average(comparables: &[Comparable], target_ppg: f64) -> f64 {
    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;
    for comp in comparables {
        let weight = 1.0 / (1.0 + (comp.avg_ppg - target_ppg).abs());
        weighted_sum += weight * comp.salary.to_f64().unwrap_or(0.0);
        weight_total += weight;
    }
    if weight_total == 0.0 {
        0.0
    } else {
        weighted_sum / weight_total
    }
}

/// Top-salary fallback when the comparable set is too thin: positional
/// top-10 average, PPG deviation from the position baseline, and an age
/// curve.
fn fallback_base(
    params: &PositionParams,
    position_salaries: &[f64],
    request: &EstimateRequest,
) -> f64 {
    let mut salaries = position_salaries.to_vec();
    salaries.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    salaries.truncate(10);

    let mut base = if salaries.is_empty() {
        params.floor
    } else {
        salaries.iter().sum::<f64>() / salaries.len() as f64
    };

    if let Some(ppg) = request.avg_ppg {
        base += (ppg - params.baseline_ppg) * params.dollars_per_point;
    }

    if let Some(age) = request.age {
        if PRIME_AGE.contains(&age) {
            base += params.prime_bonus;
        } else if age > AGE_DECLINE_START {
            base -= AGE_DECLINE_PER_YEAR * f64::from(age - AGE_DECLINE_START);
        }
    }

    base
}
