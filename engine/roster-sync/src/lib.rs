//! Roster reconciliation
//!
//! Periodically diffs the external roster provider against the ledger's
//! active contracts, auto-releases dropped players through the dead-cap
//! schedule, and posts the resulting transactions. The job never crashes
//! the host process; every failure is scoped to one league or one release.

pub mod cache;
mod error;
pub mod job;
pub mod provider;
pub mod scheduler;

pub use cache::{Clock, ManualClock, RosterCache, SystemClock};
pub use error::{Result, SyncError};
pub use job::{ReconciliationJob, ReleaseFailure, RetryConfig, SyncReport};
pub use provider::{ProviderRoster, RosterProvider, SleeperProvider, SleeperProviderConfig};
pub use scheduler::{SyncScheduler, SyncSchedulerConfig};
