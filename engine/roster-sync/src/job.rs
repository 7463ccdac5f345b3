//! Reconciliation job
//!
//! For each league, converge the ledger toward the provider's roster state:
//! any locally-active contract whose player has disappeared from the
//! external roster is released at the league's current season, charging
//! dead cap through the retention schedule. Releases are atomic and
//! idempotent at the store layer, so re-running against an unchanged
//! roster is a no-op.

use crate::cache::RosterCache;
use crate::error::{Result, SyncError};
use crate::provider::{ProviderRoster, RosterProvider};
use cap_ledger::{dead_cap_for, League, LedgerStore, SyncHistoryEntry};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Retry policy for provider fetches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per fetch
    pub max_retries: u32,
    /// Initial retry delay in seconds
    pub initial_delay_secs: u64,
    /// Maximum retry delay in seconds
    pub max_delay_secs: u64,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_secs: 5,
            max_delay_secs: 300,
            backoff_multiplier: 2.0,
        }
    }
}

/// One release that could not be applied
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseFailure {
    /// Absent for league-level failures (provider fetch, missing mapping)
    pub contract_id: Option<i64>,
    pub player_name: Option<String>,
    pub error: String,
}

/// Outcome of one league's reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub league_id: i64,
    pub contracts_checked: usize,
    pub contracts_released: usize,
    pub dead_cap_total: Decimal,
    pub errors: Vec<ReleaseFailure>,
    pub duration_ms: u64,
}

/// Periodic roster reconciliation over one ledger store
pub struct ReconciliationJob {
    store: Arc<dyn LedgerStore>,
    provider: Arc<dyn RosterProvider>,
    cache: RosterCache,
    retry: RetryConfig,
}

impl ReconciliationJob {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        provider: Arc<dyn RosterProvider>,
        cache: RosterCache,
    ) -> Self {
        Self { store, provider, cache, retry: RetryConfig::default() }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch rosters through the cache, retrying transient provider
    /// failures with exponential backoff.
    async fn rosters_with_retry(&self, external_league_id: &str) -> Result<Vec<ProviderRoster>> {
        let mut delay = Duration::from_secs(self.retry.initial_delay_secs);
        let mut attempt = 1;
        loop {
            match self.cache.get_or_fetch(self.provider.as_ref(), external_league_id).await {
                Ok(rosters) => return Ok(rosters),
                Err(e) if attempt >= self.retry.max_retries => return Err(e),
                Err(e) => {
                    warn!(
                        "Roster fetch attempt {} for {} failed: {}, retrying in {:?}",
                        attempt, external_league_id, e, delay
                    );
                    sleep(delay).await;
                    delay = Duration::from_secs(
                        (delay.as_secs() as f64 * self.retry.backoff_multiplier)
                            .min(self.retry.max_delay_secs as f64) as u64,
                    );
                    attempt += 1;
                }
            }
        }
    }

    /// Reconcile every league sequentially.
    ///
    /// A failure in one league is recorded and never blocks the others.
    pub async fn run_all(&self) -> Vec<SyncReport> {
        let leagues = match self.store.leagues().await {
            Ok(leagues) => leagues,
            Err(e) => {
                error!("Reconciliation could not list leagues: {}", e);
                return Vec::new();
            }
        };

        let mut reports = Vec::with_capacity(leagues.len());
        for league in leagues {
            let league_id = league.id;
            match self.run_league(&league).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    error!("Reconciliation failed for league {}: {}", league_id, e);
                    reports.push(SyncReport {
                        run_id: Uuid::new_v4(),
                        league_id,
                        contracts_checked: 0,
                        contracts_released: 0,
                        dead_cap_total: Decimal::ZERO,
                        errors: vec![ReleaseFailure {
                            contract_id: None,
                            player_name: None,
                            error: e.to_string(),
                        }],
                        duration_ms: 0,
                    });
                }
            }
        }
        reports
    }

    /// Reconcile one league against the provider's current rosters.
    pub async fn run_league(&self, league: &League) -> Result<SyncReport> {
        let started = Instant::now();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();

        let external_league_id = league
            .external_league_id
            .as_deref()
            .ok_or(SyncError::NoExternalMapping { league_id: league.id })?;

        let rosters = self.rosters_with_retry(external_league_id).await?;
        let provider_players: HashMap<&str, &std::collections::HashSet<String>> =
            rosters.iter().map(|r| (r.team_external_id.as_str(), &r.player_ids)).collect();

        let mut report = SyncReport {
            run_id,
            league_id: league.id,
            contracts_checked: 0,
            contracts_released: 0,
            dead_cap_total: Decimal::ZERO,
            errors: Vec::new(),
            duration_ms: 0,
        };

        for team in self.store.teams_in_league(league.id).await? {
            let Some(roster_id) = team.external_roster_id.as_deref() else {
                continue;
            };
            // A roster the provider no longer reports is treated as unknown,
            // not as empty; releasing a whole team on a provider hiccup would
            // be unrecoverable.
            let Some(held_players) = provider_players.get(roster_id) else {
                warn!("Provider returned no roster {} for team {}", roster_id, team.id);
                continue;
            };

            for contract in self.store.active_contracts_for_team(team.id).await? {
                report.contracts_checked += 1;
                if let Err(failure) =
                    self.release_if_dropped(league, &contract, held_players, &mut report).await
                {
                    // One bad release must not stop the rest of the run
                    warn!(
                        "Release failed for contract {}: {}",
                        contract.id, failure.error
                    );
                    report.errors.push(failure);
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;

        if report.contracts_released > 0 {
            self.store
                .record_sync_history(SyncHistoryEntry {
                    run_id,
                    league_id: league.id,
                    contracts_checked: report.contracts_checked,
                    contracts_released: report.contracts_released,
                    dead_cap_total: report.dead_cap_total,
                    error_count: report.errors.len(),
                    started_at,
                    duration_ms: report.duration_ms,
                })
                .await?;
        }

        info!(
            "Reconciled league {}: {} checked, {} released, {} dead cap, {} errors in {}ms",
            league.id,
            report.contracts_checked,
            report.contracts_released,
            report.dead_cap_total,
            report.errors.len(),
            report.duration_ms
        );
        Ok(report)
    }

    async fn release_if_dropped(
        &self,
        league: &League,
        contract: &cap_ledger::Contract,
        held_players: &std::collections::HashSet<String>,
        report: &mut SyncReport,
    ) -> std::result::Result<(), ReleaseFailure> {
        let player = self.store.player(contract.player_id).await.map_err(|e| ReleaseFailure {
            contract_id: Some(contract.id),
            player_name: None,
            error: e.to_string(),
        })?;

        // Players without a provider mapping cannot be diffed
        let Some(external_id) = player.external_id.as_deref() else {
            return Ok(());
        };
        if held_players.contains(external_id) {
            return Ok(());
        }

        let dead_cap = dead_cap_for(
            contract.salary,
            contract.years_total,
            contract.start_season,
            league.current_season,
        );

        // Status flip and dead-money transaction land atomically or not at all
        self.store
            .release_contract(contract.id, dead_cap, "dropped", league.current_season)
            .await
            .map_err(|e| ReleaseFailure {
                contract_id: Some(contract.id),
                player_name: Some(player.name.clone()),
                error: e.to_string(),
            })?;

        info!(
            "Released {} (contract {}) for {} dead cap",
            player.name, contract.id, dead_cap
        );
        report.contracts_released += 1;
        report.dead_cap_total += dead_cap;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, RosterCache};
    use crate::provider::ProviderRoster;
    use cap_ledger::{
        CapTransaction, CapAdjustment, Contract, ContractStatus, LedgerError, MemoryStore,
        NewCapTransaction, Player, Position, Team, TransactionKind,
    };
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::RwLock;

    struct MapProvider {
        rosters: HashMap<String, Vec<ProviderRoster>>,
        fail_leagues: HashSet<String>,
    }

    #[async_trait::async_trait]
    impl RosterProvider for MapProvider {
        async fn league_rosters(&self, id: &str) -> Result<Vec<ProviderRoster>> {
            if self.fail_leagues.contains(id) {
                return Err(SyncError::Provider("fetch timed out".to_string()));
            }
            Ok(self.rosters.get(id).cloned().unwrap_or_default())
        }
    }

    fn roster(team: &str, players: &[&str]) -> ProviderRoster {
        ProviderRoster {
            team_external_id: team.to_string(),
            player_ids: players.iter().map(|p| p.to_string()).collect(),
        }
    }

    async fn seed_league(store: &MemoryStore, external: &str) -> (League, Team) {
        let league = store
            .add_league(League {
                id: 0,
                name: "Dynasty".to_string(),
                salary_cap: Decimal::from(200),
                current_season: 2027,
                min_contract_years_total: 15,
                max_contract_years_total: 60,
                external_league_id: Some(external.to_string()),
            })
            .await;
        let team = store
            .add_team(Team {
                id: 0,
                league_id: league.id,
                name: "Hawks".to_string(),
                external_roster_id: Some("1".to_string()),
            })
            .await;
        (league, team)
    }

    async fn sign(
        store: &MemoryStore,
        team: &Team,
        external_id: Option<&str>,
        salary: i64,
    ) -> Contract {
        let player = store
            .add_player(Player {
                id: 0,
                name: format!("Player {}", external_id.unwrap_or("unmapped")),
                position: Position::RB,
                age: None,
                external_id: external_id.map(|s| s.to_string()),
            })
            .await;
        store
            .add_contract(Contract {
                id: 0,
                team_id: team.id,
                player_id: player.id,
                salary: Decimal::from(salary),
                years_total: 5,
                years_remaining: 4,
                start_season: 2026,
                end_season: 2030,
                status: ContractStatus::Active,
                dead_cap_hit: None,
                release_reason: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap()
    }

    fn job(store: Arc<dyn LedgerStore>, provider: MapProvider) -> ReconciliationJob {
        let cache = RosterCache::new(
            chrono::Duration::minutes(5),
            Arc::new(ManualClock::new(Utc::now())),
        );
        // Single attempt keeps failure-path tests from sleeping through backoff
        ReconciliationJob::new(store, Arc::new(provider), cache)
            .with_retry(RetryConfig { max_retries: 1, ..RetryConfig::default() })
    }

    /// Provider that fails a fixed number of calls before recovering
    struct FlakyProvider {
        failures_left: AtomicUsize,
        roster: Vec<ProviderRoster>,
    }

    #[async_trait::async_trait]
    impl RosterProvider for FlakyProvider {
        async fn league_rosters(&self, _id: &str) -> Result<Vec<ProviderRoster>> {
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(SyncError::Provider("connection reset".to_string()));
            }
            Ok(self.roster.clone())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_provider_failure_is_retried() {
        let store = Arc::new(MemoryStore::new());
        let (league, team) = seed_league(&store, "L1").await;
        sign(&store, &team, Some("x-dropped"), 20).await;

        let provider = FlakyProvider {
            failures_left: AtomicUsize::new(2),
            roster: vec![roster("1", &[])],
        };
        let cache = RosterCache::new(
            chrono::Duration::minutes(5),
            Arc::new(ManualClock::new(Utc::now())),
        );
        let job = ReconciliationJob::new(store.clone(), Arc::new(provider), cache);

        // Default policy allows three attempts; the third succeeds
        let report = job.run_league(&league).await.unwrap();
        assert_eq!(report.contracts_released, 1);
        assert!(report.errors.is_empty());
    }

    #[tokio::test]
    async fn dropped_player_is_released_with_dead_cap() {
        let store = Arc::new(MemoryStore::new());
        let (league, team) = seed_league(&store, "L1").await;
        let kept = sign(&store, &team, Some("x-kept"), 10).await;
        let dropped = sign(&store, &team, Some("x-dropped"), 20).await;

        let provider = MapProvider {
            rosters: HashMap::from([("L1".to_string(), vec![roster("1", &["x-kept"])])]),
            fail_leagues: HashSet::new(),
        };
        let job = job(store.clone(), provider);

        let report = job.run_league(&league).await.unwrap();
        assert_eq!(report.contracts_checked, 2);
        assert_eq!(report.contracts_released, 1);
        // 5yr/$20 released in year 2: 50% retention
        assert_eq!(report.dead_cap_total, Decimal::from(10));
        assert!(report.errors.is_empty());

        let released = store.contract(dropped.id).await.unwrap();
        assert_eq!(released.status, ContractStatus::Released);
        assert_eq!(released.release_reason.as_deref(), Some("dropped"));
        assert_eq!(released.dead_cap_hit, Some(Decimal::from(10)));

        let untouched = store.contract(kept.id).await.unwrap();
        assert_eq!(untouched.status, ContractStatus::Active);

        let txs = store
            .transactions_for_team(team.id, 2027, Some(TransactionKind::DeadMoney))
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].contract_id, Some(dropped.id));
    }

    #[tokio::test]
    async fn rerunning_against_unchanged_roster_is_a_no_op() {
        let store = Arc::new(MemoryStore::new());
        let (league, team) = seed_league(&store, "L1").await;
        sign(&store, &team, Some("x-kept"), 10).await;
        sign(&store, &team, Some("x-dropped"), 20).await;

        let provider = MapProvider {
            rosters: HashMap::from([("L1".to_string(), vec![roster("1", &["x-kept"])])]),
            fail_leagues: HashSet::new(),
        };
        let job = job(store.clone(), provider);

        let first = job.run_league(&league).await.unwrap();
        assert_eq!(first.contracts_released, 1);
        let tx_count = store.transaction_count().await;

        let second = job.run_league(&league).await.unwrap();
        assert_eq!(second.contracts_released, 0);
        assert!(second.errors.is_empty());
        assert_eq!(store.transaction_count().await, tx_count);
    }

    #[tokio::test]
    async fn unmapped_players_are_never_released() {
        let store = Arc::new(MemoryStore::new());
        let (league, team) = seed_league(&store, "L1").await;
        let unmapped = sign(&store, &team, None, 15).await;

        let provider = MapProvider {
            rosters: HashMap::from([("L1".to_string(), vec![roster("1", &[])])]),
            fail_leagues: HashSet::new(),
        };
        let job = job(store.clone(), provider);

        let report = job.run_league(&league).await.unwrap();
        assert_eq!(report.contracts_released, 0);
        assert_eq!(
            store.contract(unmapped.id).await.unwrap().status,
            ContractStatus::Active
        );
    }

    #[tokio::test]
    async fn provider_failure_in_one_league_does_not_block_others() {
        let store = Arc::new(MemoryStore::new());
        let (_bad_league, bad_team) = seed_league(&store, "L-bad").await;
        sign(&store, &bad_team, Some("a"), 10).await;
        let (_good_league, good_team) = seed_league(&store, "L-good").await;
        sign(&store, &good_team, Some("b"), 20).await;

        let provider = MapProvider {
            rosters: HashMap::from([("L-good".to_string(), vec![roster("1", &[])])]),
            fail_leagues: HashSet::from(["L-bad".to_string()]),
        };
        let job = job(store.clone(), provider);

        let reports = job.run_all().await;
        assert_eq!(reports.len(), 2);

        let bad = &reports[0];
        assert_eq!(bad.contracts_released, 0);
        assert_eq!(bad.errors.len(), 1);
        assert!(bad.errors[0].contract_id.is_none());

        let good = &reports[1];
        assert_eq!(good.contracts_released, 1);
        assert!(good.errors.is_empty());
    }

    #[tokio::test]
    async fn sync_history_is_only_written_when_something_released() {
        let store = Arc::new(MemoryStore::new());
        let (league, team) = seed_league(&store, "L1").await;
        sign(&store, &team, Some("x-kept"), 10).await;

        let provider = MapProvider {
            rosters: HashMap::from([(
                "L1".to_string(),
                vec![roster("1", &["x-kept"])],
            )]),
            fail_leagues: HashSet::new(),
        };
        let job = job(store.clone(), provider);

        job.run_league(&league).await.unwrap();
        assert!(store.sync_history().await.is_empty());
    }

    /// Store wrapper that rejects releases for one contract, to prove a
    /// single failure never stops the rest of the run.
    struct PoisonedStore {
        inner: Arc<MemoryStore>,
        poisoned_contract: RwLock<Option<i64>>,
    }

    #[async_trait::async_trait]
    impl LedgerStore for PoisonedStore {
        async fn league(&self, id: i64) -> cap_ledger::Result<League> {
            self.inner.league(id).await
        }
        async fn leagues(&self) -> cap_ledger::Result<Vec<League>> {
            self.inner.leagues().await
        }
        async fn team(&self, id: i64) -> cap_ledger::Result<Team> {
            self.inner.team(id).await
        }
        async fn teams_in_league(&self, id: i64) -> cap_ledger::Result<Vec<Team>> {
            self.inner.teams_in_league(id).await
        }
        async fn player(&self, id: i64) -> cap_ledger::Result<Player> {
            self.inner.player(id).await
        }
        async fn contract(&self, id: i64) -> cap_ledger::Result<Contract> {
            self.inner.contract(id).await
        }
        async fn active_contracts_for_team(&self, id: i64) -> cap_ledger::Result<Vec<Contract>> {
            self.inner.active_contracts_for_team(id).await
        }
        async fn active_contracts_in_league(&self, id: i64) -> cap_ledger::Result<Vec<Contract>> {
            self.inner.active_contracts_in_league(id).await
        }
        async fn adjustments_for_team(&self, id: i64) -> cap_ledger::Result<Vec<CapAdjustment>> {
            self.inner.adjustments_for_team(id).await
        }
        async fn transactions_for_team(
            &self,
            team_id: i64,
            season: i32,
            kind: Option<TransactionKind>,
        ) -> cap_ledger::Result<Vec<CapTransaction>> {
            self.inner.transactions_for_team(team_id, season, kind).await
        }
        async fn append_transaction(
            &self,
            tx: NewCapTransaction,
        ) -> cap_ledger::Result<CapTransaction> {
            self.inner.append_transaction(tx).await
        }
        async fn release_contract(
            &self,
            contract_id: i64,
            dead_cap: Decimal,
            reason: &str,
            season: i32,
        ) -> cap_ledger::Result<Contract> {
            if *self.poisoned_contract.read().await == Some(contract_id) {
                return Err(LedgerError::Validation("simulated write failure".to_string()));
            }
            self.inner.release_contract(contract_id, dead_cap, reason, season).await
        }
        async fn record_sync_history(&self, entry: SyncHistoryEntry) -> cap_ledger::Result<()> {
            self.inner.record_sync_history(entry).await
        }
    }

    #[tokio::test]
    async fn one_failed_release_does_not_stop_the_run() {
        let inner = Arc::new(MemoryStore::new());
        let (league, team) = seed_league(&inner, "L1").await;
        let poisoned = sign(&inner, &team, Some("x-1"), 10).await;
        let healthy = sign(&inner, &team, Some("x-2"), 20).await;

        let store = Arc::new(PoisonedStore {
            inner: inner.clone(),
            poisoned_contract: RwLock::new(Some(poisoned.id)),
        });
        let provider = MapProvider {
            rosters: HashMap::from([("L1".to_string(), vec![roster("1", &[])])]),
            fail_leagues: HashSet::new(),
        };
        let job = job(store, provider);

        let report = job.run_league(&league).await.unwrap();
        assert_eq!(report.contracts_released, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].contract_id, Some(poisoned.id));

        assert_eq!(
            inner.contract(poisoned.id).await.unwrap().status,
            ContractStatus::Active
        );
        assert_eq!(
            inner.contract(healthy.id).await.unwrap().status,
            ContractStatus::Released
        );
    }
}
