//! Error types for the cap ledger

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type alias for ledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in the cap ledger
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Bad input that should never be retried (invalid contract terms, etc.)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity lookup failed
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// Release requested for a contract that is no longer active
    #[error("Contract {contract_id} is not active and cannot be released")]
    AlreadyReleased { contract_id: i64 },

    /// Signing would push the team past its cap
    #[error("Insufficient cap room: requires {required}, only {available} available")]
    InsufficientCapRoom { required: Decimal, available: Decimal },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
