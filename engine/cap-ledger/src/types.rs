//! Domain types for the cap ledger

use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Seasons the per-year adjustment ledger is allowed to write to.
///
/// Reads outside this window resolve to a zero adjustment rather than an
/// error, so forward projections degrade gracefully.
pub const SUPPORTED_SEASONS: RangeInclusive<i32> = 2026..=2030;

/// A league is the cap-accounting tenant: one cap ceiling, one current season.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct League {
    pub id: i64,
    pub name: String,
    /// Cap ceiling in dollars
    pub salary_cap: Decimal,
    pub current_season: i32,
    /// Aggregate contract-years bounds per team
    pub min_contract_years_total: i32,
    pub max_contract_years_total: i32,
    /// Identifier of this league at the external roster provider
    pub external_league_id: Option<String>,
}

/// A team holds no cap state directly; cap room is always derived.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub league_id: i64,
    pub name: String,
    /// Identifier of this team's roster at the external provider
    pub external_roster_id: Option<String>,
}

/// Fantasy positions supported by the valuation engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Position {
    QB,
    RB,
    WR,
    TE,
    K,
    DEF,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Position::QB => "QB",
            Position::RB => "RB",
            Position::WR => "WR",
            Position::TE => "TE",
            Position::K => "K",
            Position::DEF => "DEF",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Position {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "QB" => Ok(Position::QB),
            "RB" => Ok(Position::RB),
            "WR" => Ok(Position::WR),
            "TE" => Ok(Position::TE),
            "K" => Ok(Position::K),
            "DEF" | "DST" => Ok(Position::DEF),
            other => Err(LedgerError::Validation(format!("Unknown position: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub position: Position,
    pub age: Option<i32>,
    /// Identifier of this player at the external roster provider
    pub external_id: Option<String>,
}

/// Lifecycle state of a contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    Active,
    Released,
    Traded,
    Expired,
    Voided,
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContractStatus::Active => "active",
            ContractStatus::Released => "released",
            ContractStatus::Traded => "traded",
            ContractStatus::Expired => "expired",
            ContractStatus::Voided => "voided",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ContractStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "active" => Ok(ContractStatus::Active),
            "released" => Ok(ContractStatus::Released),
            "traded" => Ok(ContractStatus::Traded),
            "expired" => Ok(ContractStatus::Expired),
            "voided" => Ok(ContractStatus::Voided),
            other => Err(LedgerError::Validation(format!("Unknown contract status: {}", other))),
        }
    }
}

/// A player contract held by one team.
///
/// Invariants: `1 <= years_total <= 5`,
/// `end_season == start_season + years_total - 1`, `salary >= 0`.
/// A contract transitions to `Released` at most once; `dead_cap_hit` is set
/// only on that transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    pub id: i64,
    pub team_id: i64,
    pub player_id: i64,
    pub salary: Decimal,
    pub years_total: i32,
    pub years_remaining: i32,
    pub start_season: i32,
    pub end_season: i32,
    pub status: ContractStatus,
    pub dead_cap_hit: Option<Decimal>,
    pub release_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contract {
    /// Check the structural invariants, returning a validation error on the
    /// first violation.
    pub fn validate(&self) -> Result<()> {
        if self.years_total < 1 || self.years_total > 5 {
            return Err(LedgerError::Validation(format!(
                "Contract years must be between 1 and 5, got {}",
                self.years_total
            )));
        }
        if self.end_season != self.start_season + self.years_total - 1 {
            return Err(LedgerError::Validation(format!(
                "End season {} does not match start {} + {} years",
                self.end_season, self.start_season, self.years_total
            )));
        }
        if self.salary < Decimal::ZERO {
            return Err(LedgerError::Validation(format!(
                "Contract salary must be non-negative, got {}",
                self.salary
            )));
        }
        Ok(())
    }

    /// Whether this contract counts against the cap in `season`
    pub fn covers_season(&self, season: i32) -> bool {
        self.start_season <= season && season <= self.end_season
    }
}

/// A one-off cap ledger entry that does not correspond to a contract row
/// (legacy trade dead money, manual corrections).
///
/// Amounts are keyed by season. Positive = charge, negative = credit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapAdjustment {
    pub id: i64,
    pub team_id: i64,
    pub description: String,
    pub amounts: BTreeMap<i32, Decimal>,
}

impl CapAdjustment {
    /// Resolve this adjustment for one season.
    ///
    /// Seasons outside [`SUPPORTED_SEASONS`] always resolve to zero.
    pub fn amount_for(&self, season: i32) -> Decimal {
        if !SUPPORTED_SEASONS.contains(&season) {
            return Decimal::ZERO;
        }
        self.amounts.get(&season).copied().unwrap_or(Decimal::ZERO)
    }

    /// Reject writes outside the supported window.
    pub fn validate(&self) -> Result<()> {
        for season in self.amounts.keys() {
            if !SUPPORTED_SEASONS.contains(season) {
                return Err(LedgerError::Validation(format!(
                    "Adjustment season {} outside supported window {}-{}",
                    season,
                    SUPPORTED_SEASONS.start(),
                    SUPPORTED_SEASONS.end()
                )));
            }
        }
        Ok(())
    }
}

/// Kind of an append-only cap transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    DeadMoney,
    ContractSigned,
    TagApplied,
    TradeCharge,
    Correction,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransactionKind::DeadMoney => "dead_money",
            TransactionKind::ContractSigned => "contract_signed",
            TransactionKind::TagApplied => "tag_applied",
            TransactionKind::TradeCharge => "trade_charge",
            TransactionKind::Correction => "correction",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "dead_money" => Ok(TransactionKind::DeadMoney),
            "contract_signed" => Ok(TransactionKind::ContractSigned),
            "tag_applied" => Ok(TransactionKind::TagApplied),
            "trade_charge" => Ok(TransactionKind::TradeCharge),
            "correction" => Ok(TransactionKind::Correction),
            other => Err(LedgerError::Validation(format!("Unknown transaction kind: {}", other))),
        }
    }
}

/// Append-only audit trail entry. Dead-cap charges post exactly one of these
/// per release event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapTransaction {
    pub id: i64,
    pub team_id: i64,
    pub season: i32,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub contract_id: Option<i64>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Per-season production numbers for a player
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSeasonStats {
    pub player_id: i64,
    pub season: i32,
    pub games_played: i32,
    pub avg_points_per_game: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contract(years_total: i32, start: i32, end: i32) -> Contract {
        Contract {
            id: 1,
            team_id: 1,
            player_id: 1,
            salary: Decimal::from(20),
            years_total,
            years_remaining: years_total,
            start_season: start,
            end_season: end,
            status: ContractStatus::Active,
            dead_cap_hit: None,
            release_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn contract_invariants_hold_for_valid_terms() {
        for years in 1..=5 {
            let c = contract(years, 2026, 2026 + years - 1);
            assert!(c.validate().is_ok(), "{} year contract should validate", years);
        }
    }

    #[test]
    fn contract_rejects_bad_years_and_mismatched_end() {
        assert!(contract(0, 2026, 2025).validate().is_err());
        assert!(contract(6, 2026, 2031).validate().is_err());
        // end_season off by one
        assert!(contract(3, 2026, 2029).validate().is_err());
    }

    #[test]
    fn adjustment_resolves_zero_outside_window() {
        let mut amounts = BTreeMap::new();
        amounts.insert(2027, Decimal::from(12));
        let adj = CapAdjustment {
            id: 1,
            team_id: 1,
            description: "legacy trade".to_string(),
            amounts,
        };
        assert_eq!(adj.amount_for(2027), Decimal::from(12));
        assert_eq!(adj.amount_for(2026), Decimal::ZERO);
        assert_eq!(adj.amount_for(2031), Decimal::ZERO);
        assert_eq!(adj.amount_for(2025), Decimal::ZERO);
    }

    #[test]
    fn adjustment_rejects_write_outside_window() {
        let mut amounts = BTreeMap::new();
        amounts.insert(2031, Decimal::from(5));
        let adj = CapAdjustment {
            id: 1,
            team_id: 1,
            description: "bad".to_string(),
            amounts,
        };
        assert!(adj.validate().is_err());
    }

    #[test]
    fn position_round_trips_through_strings() {
        for p in [Position::QB, Position::RB, Position::WR, Position::TE, Position::K, Position::DEF]
        {
            assert_eq!(p.to_string().parse::<Position>().unwrap(), p);
        }
        assert_eq!("DST".parse::<Position>().unwrap(), Position::DEF);
    }
}
