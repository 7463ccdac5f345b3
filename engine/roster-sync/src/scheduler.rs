//! Periodic scheduler for the reconciliation job
//!
//! One background tick every few minutes, with a per-run deadline so a hung
//! provider fetch can never block the next scheduled run.

use crate::job::ReconciliationJob;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{error, info};

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSchedulerConfig {
    /// Minutes between reconciliation runs
    pub interval_minutes: u64,
    /// Hard deadline for one full run across all leagues
    pub run_timeout_secs: u64,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self { interval_minutes: 5, run_timeout_secs: 120 }
    }
}

/// Drives [`ReconciliationJob`] on a fixed interval
pub struct SyncScheduler {
    config: SyncSchedulerConfig,
    job: Arc<ReconciliationJob>,
}

impl SyncScheduler {
    pub fn new(config: SyncSchedulerConfig, job: Arc<ReconciliationJob>) -> Self {
        Self { config, job }
    }

    /// Run until the task is dropped or aborted.
    pub async fn start(&self) {
        info!(
            "Starting roster sync scheduler: every {}m, {}s run deadline",
            self.config.interval_minutes, self.config.run_timeout_secs
        );

        let mut ticker = interval(Duration::from_secs(self.config.interval_minutes * 60));
        // A long run must not cause a burst of catch-up runs afterwards
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// One scheduled run with the configured deadline applied.
    pub async fn run_once(&self) {
        let deadline = Duration::from_secs(self.config.run_timeout_secs);
        match timeout(deadline, self.job.run_all()).await {
            Ok(reports) => {
                let released: usize = reports.iter().map(|r| r.contracts_released).sum();
                let errors: usize = reports.iter().map(|r| r.errors.len()).sum();
                info!(
                    "Sync run finished: {} leagues, {} released, {} errors",
                    reports.len(),
                    released,
                    errors
                );
            }
            Err(_) => {
                // Treat as a failed run and retry on the next tick
                error!("Sync run exceeded {:?} deadline, abandoning until next tick", deadline);
            }
        }
    }
}
