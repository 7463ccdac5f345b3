//! Cap engine facade
//!
//! Owns the storage seams and exposes the operations the rest of the
//! process (and the API layer above it) calls into.

use std::sync::Arc;

use cap_ledger::{
    cap_projection, cap_summary, validate_signing, CapSummary, LedgerStore, Result as LedgerResult,
    StatsSource,
};
use contract_valuation::{
    estimate, evaluate_contract, league_rankings, Estimate, EstimateRequest, Evaluation,
    RankedContract,
};
use roster_sync::{ReconciliationJob, RosterCache, RosterProvider, SyncReport};
use rust_decimal::Decimal;
use tracing::info;

/// Top-level handle over the ledger, valuation, and reconciliation seams.
pub struct CapEngine {
    store: Arc<dyn LedgerStore>,
    stats: Arc<dyn StatsSource>,
    job: Arc<ReconciliationJob>,
}

impl CapEngine {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        stats: Arc<dyn StatsSource>,
        provider: Arc<dyn RosterProvider>,
        cache: RosterCache,
    ) -> Self {
        let job = Arc::new(ReconciliationJob::new(Arc::clone(&store), provider, cache));
        Self { store, stats, job }
    }

    /// Reconciliation job handle, for handing to the scheduler.
    pub fn reconciliation_job(&self) -> Arc<ReconciliationJob> {
        Arc::clone(&self.job)
    }

    /// Cap position for one team in one season.
    pub async fn cap_summary(&self, team_id: i64, season: i32) -> LedgerResult<CapSummary> {
        cap_summary(self.store.as_ref(), team_id, season).await
    }

    /// Cap position for one team across every supported season.
    pub async fn cap_projection(&self, team_id: i64) -> LedgerResult<Vec<CapSummary>> {
        cap_projection(self.store.as_ref(), team_id).await
    }

    /// Reject a proposed salary that does not fit under the team's cap room.
    pub async fn validate_signing(
        &self,
        team_id: i64,
        season: i32,
        salary: Decimal,
    ) -> LedgerResult<()> {
        validate_signing(self.store.as_ref(), team_id, season, salary).await
    }

    /// Market-based salary estimate for a player profile.
    pub async fn estimate_contract(&self, request: &EstimateRequest) -> LedgerResult<Estimate> {
        estimate(self.store.as_ref(), self.stats.as_ref(), request).await
    }

    /// Value verdict for a single contract against its league market.
    pub async fn evaluate_contract(&self, contract_id: i64) -> LedgerResult<Evaluation> {
        evaluate_contract(self.store.as_ref(), self.stats.as_ref(), contract_id).await
    }

    /// Every scoreable active contract in a league, best value first.
    pub async fn league_rankings(&self, league_id: i64) -> LedgerResult<Vec<RankedContract>> {
        league_rankings(self.store.as_ref(), self.stats.as_ref(), league_id).await
    }

    /// Run roster reconciliation across all leagues immediately.
    pub async fn run_reconciliation(&self) -> Vec<SyncReport> {
        let reports = self.job.run_all().await;
        let released: usize = reports.iter().map(|r| r.contracts_released).sum();
        info!("Manual reconciliation finished: {} contracts released", released);
        reports
    }
}
