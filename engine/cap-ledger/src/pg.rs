//! Postgres ledger store
//!
//! Production implementation of [`LedgerStore`] over `sqlx`. The release
//! path wraps the status flip and the dead-money insert in one database
//! transaction so a crash between the two steps cannot leave the ledger
//! inconsistent.

use crate::error::{LedgerError, Result};
use crate::store::{LedgerStore, NewCapTransaction, StatsSource, SyncHistoryEntry};
use crate::types::{
    CapAdjustment, CapTransaction, Contract, League, Player, PlayerSeasonStats, Team,
    TransactionKind,
};
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::collections::BTreeMap;

/// Postgres-backed implementation of [`LedgerStore`]
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run pending migrations
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn league_from_row(row: &PgRow) -> Result<League> {
    Ok(League {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        salary_cap: row.try_get("salary_cap")?,
        current_season: row.try_get("current_season")?,
        min_contract_years_total: row.try_get("min_contract_years_total")?,
        max_contract_years_total: row.try_get("max_contract_years_total")?,
        external_league_id: row.try_get("external_league_id")?,
    })
}

fn team_from_row(row: &PgRow) -> Result<Team> {
    Ok(Team {
        id: row.try_get("id")?,
        league_id: row.try_get("league_id")?,
        name: row.try_get("name")?,
        external_roster_id: row.try_get("external_roster_id")?,
    })
}

fn player_from_row(row: &PgRow) -> Result<Player> {
    let position: String = row.try_get("position")?;
    Ok(Player {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        position: position.parse()?,
        age: row.try_get("age")?,
        external_id: row.try_get("external_id")?,
    })
}

fn contract_from_row(row: &PgRow) -> Result<Contract> {
    let status: String = row.try_get("status")?;
    Ok(Contract {
        id: row.try_get("id")?,
        team_id: row.try_get("team_id")?,
        player_id: row.try_get("player_id")?,
        salary: row.try_get("salary")?,
        years_total: row.try_get("years_total")?,
        years_remaining: row.try_get("years_remaining")?,
        start_season: row.try_get("start_season")?,
        end_season: row.try_get("end_season")?,
        status: status.parse()?,
        dead_cap_hit: row.try_get("dead_cap_hit")?,
        release_reason: row.try_get("release_reason")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn transaction_from_row(row: &PgRow) -> Result<CapTransaction> {
    let kind: String = row.try_get("kind")?;
    Ok(CapTransaction {
        id: row.try_get("id")?,
        team_id: row.try_get("team_id")?,
        season: row.try_get("season")?,
        kind: kind.parse()?,
        amount: row.try_get("amount")?,
        contract_id: row.try_get("contract_id")?,
        note: row.try_get("note")?,
        created_at: row.try_get("created_at")?,
    })
}

const CONTRACT_COLUMNS: &str = "id, team_id, player_id, salary, years_total, years_remaining, \
     start_season, end_season, status, dead_cap_hit, release_reason, created_at, updated_at";

#[async_trait::async_trait]
impl LedgerStore for PgStore {
    async fn league(&self, league_id: i64) -> Result<League> {
        let row = sqlx::query(
            "SELECT id, name, salary_cap, current_season, min_contract_years_total, \
             max_contract_years_total, external_league_id FROM leagues WHERE id = $1",
        )
        .bind(league_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::NotFound { entity: "League", id: league_id })?;
        league_from_row(&row)
    }

    async fn leagues(&self) -> Result<Vec<League>> {
        let rows = sqlx::query(
            "SELECT id, name, salary_cap, current_season, min_contract_years_total, \
             max_contract_years_total, external_league_id FROM leagues ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(league_from_row).collect()
    }

    async fn team(&self, team_id: i64) -> Result<Team> {
        let row = sqlx::query(
            "SELECT id, league_id, name, external_roster_id FROM teams WHERE id = $1",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::NotFound { entity: "Team", id: team_id })?;
        team_from_row(&row)
    }

    async fn teams_in_league(&self, league_id: i64) -> Result<Vec<Team>> {
        let rows = sqlx::query(
            "SELECT id, league_id, name, external_roster_id FROM teams \
             WHERE league_id = $1 ORDER BY id",
        )
        .bind(league_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(team_from_row).collect()
    }

    async fn player(&self, player_id: i64) -> Result<Player> {
        let row = sqlx::query(
            "SELECT id, name, position, age, external_id FROM players WHERE id = $1",
        )
        .bind(player_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::NotFound { entity: "Player", id: player_id })?;
        player_from_row(&row)
    }

    async fn contract(&self, contract_id: i64) -> Result<Contract> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM contracts WHERE id = $1",
            CONTRACT_COLUMNS
        ))
        .bind(contract_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(LedgerError::NotFound { entity: "Contract", id: contract_id })?;
        contract_from_row(&row)
    }

    async fn active_contracts_for_team(&self, team_id: i64) -> Result<Vec<Contract>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM contracts WHERE team_id = $1 AND status = 'active' ORDER BY id",
            CONTRACT_COLUMNS
        ))
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(contract_from_row).collect()
    }

    async fn active_contracts_in_league(&self, league_id: i64) -> Result<Vec<Contract>> {
        let rows = sqlx::query(&format!(
            "SELECT c.{} FROM contracts c \
             JOIN teams t ON t.id = c.team_id \
             WHERE t.league_id = $1 AND c.status = 'active' ORDER BY c.id",
            CONTRACT_COLUMNS.replace(", ", ", c.")
        ))
        .bind(league_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(contract_from_row).collect()
    }

    async fn adjustments_for_team(&self, team_id: i64) -> Result<Vec<CapAdjustment>> {
        let rows = sqlx::query(
            "SELECT a.id, a.team_id, a.description, m.season, m.amount \
             FROM cap_adjustments a \
             JOIN cap_adjustment_amounts m ON m.adjustment_id = a.id \
             WHERE a.team_id = $1 ORDER BY a.id, m.season",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;

        // Fold the per-season rows into one map per adjustment
        let mut adjustments: Vec<CapAdjustment> = Vec::new();
        for row in &rows {
            let id: i64 = row.try_get("id")?;
            let season: i32 = row.try_get("season")?;
            let amount: Decimal = row.try_get("amount")?;
            match adjustments.last_mut() {
                Some(last) if last.id == id => {
                    last.amounts.insert(season, amount);
                }
                _ => {
                    let mut amounts = BTreeMap::new();
                    amounts.insert(season, amount);
                    adjustments.push(CapAdjustment {
                        id,
                        team_id: row.try_get("team_id")?,
                        description: row.try_get("description")?,
                        amounts,
                    });
                }
            }
        }
        Ok(adjustments)
    }

    async fn transactions_for_team(
        &self,
        team_id: i64,
        season: i32,
        kind: Option<TransactionKind>,
    ) -> Result<Vec<CapTransaction>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query(
                    "SELECT id, team_id, season, kind, amount, contract_id, note, created_at \
                     FROM cap_transactions \
                     WHERE team_id = $1 AND season = $2 AND kind = $3 ORDER BY id",
                )
                .bind(team_id)
                .bind(season)
                .bind(kind.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, team_id, season, kind, amount, contract_id, note, created_at \
                     FROM cap_transactions \
                     WHERE team_id = $1 AND season = $2 ORDER BY id",
                )
                .bind(team_id)
                .bind(season)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(transaction_from_row).collect()
    }

    async fn append_transaction(&self, tx: NewCapTransaction) -> Result<CapTransaction> {
        let row = sqlx::query(
            "INSERT INTO cap_transactions (team_id, season, kind, amount, contract_id, note, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, NOW()) \
             RETURNING id, team_id, season, kind, amount, contract_id, note, created_at",
        )
        .bind(tx.team_id)
        .bind(tx.season)
        .bind(tx.kind.to_string())
        .bind(tx.amount)
        .bind(tx.contract_id)
        .bind(tx.note)
        .fetch_one(&self.pool)
        .await?;
        transaction_from_row(&row)
    }

    async fn release_contract(
        &self,
        contract_id: i64,
        dead_cap: Decimal,
        reason: &str,
        season: i32,
    ) -> Result<Contract> {
        let mut db_tx = self.pool.begin().await?;

        // Guarded update: zero rows affected means the contract was missing
        // or no longer active.
        let row = sqlx::query(&format!(
            "UPDATE contracts \
             SET status = 'released', dead_cap_hit = $1, release_reason = $2, updated_at = NOW() \
             WHERE id = $3 AND status = 'active' \
             RETURNING {}",
            CONTRACT_COLUMNS
        ))
        .bind(dead_cap)
        .bind(reason)
        .bind(contract_id)
        .fetch_optional(&mut *db_tx)
        .await?;

        let released = match row {
            Some(row) => contract_from_row(&row)?,
            None => {
                db_tx.rollback().await?;
                let exists = sqlx::query("SELECT 1 FROM contracts WHERE id = $1")
                    .bind(contract_id)
                    .fetch_optional(&self.pool)
                    .await?
                    .is_some();
                return Err(if exists {
                    LedgerError::AlreadyReleased { contract_id }
                } else {
                    LedgerError::NotFound { entity: "Contract", id: contract_id }
                });
            }
        };

        if dead_cap > Decimal::ZERO {
            sqlx::query(
                "INSERT INTO cap_transactions (team_id, season, kind, amount, contract_id, note, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, NOW())",
            )
            .bind(released.team_id)
            .bind(season)
            .bind(TransactionKind::DeadMoney.to_string())
            .bind(dead_cap)
            .bind(contract_id)
            .bind(format!("release: {}", reason))
            .execute(&mut *db_tx)
            .await?;
        }

        db_tx.commit().await?;
        Ok(released)
    }

    async fn record_sync_history(&self, entry: SyncHistoryEntry) -> Result<()> {
        sqlx::query(
            "INSERT INTO sync_history \
             (run_id, league_id, contracts_checked, contracts_released, dead_cap_total, \
              error_count, started_at, duration_ms) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(entry.run_id)
        .bind(entry.league_id)
        .bind(entry.contracts_checked as i64)
        .bind(entry.contracts_released as i64)
        .bind(entry.dead_cap_total)
        .bind(entry.error_count as i64)
        .bind(entry.started_at)
        .bind(entry.duration_ms as i64)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Postgres-backed implementation of [`StatsSource`]
#[derive(Debug, Clone)]
pub struct PgStats {
    pool: PgPool,
}

impl PgStats {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl StatsSource for PgStats {
    async fn season_stats(
        &self,
        player_id: i64,
        season: i32,
    ) -> Result<Option<PlayerSeasonStats>> {
        let row = sqlx::query(
            "SELECT player_id, season, games_played, avg_points_per_game \
             FROM player_season_stats WHERE player_id = $1 AND season = $2",
        )
        .bind(player_id)
        .bind(season)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(PlayerSeasonStats {
                player_id: row.try_get("player_id")?,
                season: row.try_get("season")?,
                games_played: row.try_get("games_played")?,
                avg_points_per_game: row.try_get("avg_points_per_game")?,
            })),
            None => Ok(None),
        }
    }

    async fn has_any_stats(&self, player_id: i64) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM player_season_stats WHERE player_id = $1 LIMIT 1")
            .bind(player_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}
