//! Cap Engine Production Service Library
//!
//! Wires the ledger store, valuation engine, and roster reconciliation into
//! one process and exposes the query/command seams the API layer consumes.

pub mod config;
pub mod logging;
pub mod service;

pub use config::ServiceConfig;
pub use logging::initialize_logging;
pub use service::CapEngine;
