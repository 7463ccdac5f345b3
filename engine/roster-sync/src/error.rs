//! Error types for roster reconciliation

use thiserror::Error;

/// Result type alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur during roster reconciliation
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Ledger error: {0}")]
    Ledger(#[from] cap_ledger::LedgerError),

    #[error("Roster provider error: {0}")]
    Provider(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("League {league_id} has no external roster mapping")]
    NoExternalMapping { league_id: i64 },
}
