//! Salary-cap ledger for a dynasty fantasy league.
//!
//! Owns the contract/adjustment/transaction data model, the dead-cap
//! retention schedule, and the cap aggregator that folds all three
//! sources into a single cap-room figure per team and season.

pub mod aggregator;
pub mod dead_cap;
mod error;
pub mod memory;
pub mod pg;
pub mod store;
pub mod types;

pub use aggregator::{cap_projection, cap_summary, validate_signing, CapSummary};
pub use dead_cap::dead_cap_for;
pub use error::{LedgerError, Result};
pub use memory::{MemoryStats, MemoryStore};
pub use pg::{PgStats, PgStore};
pub use store::{LedgerStore, NewCapTransaction, StatsSource, SyncHistoryEntry};
pub use types::{
    CapAdjustment, CapTransaction, Contract, ContractStatus, League, Player, PlayerSeasonStats,
    Position, Team, TransactionKind, SUPPORTED_SEASONS,
};
