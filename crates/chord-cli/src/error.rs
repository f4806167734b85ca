//! CLI error types

use chord_ledger::LedgerError;
use chord_storage::StorageError;
use std::path::PathBuf;
use thiserror::Error;

/// CLI error type
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid amount or asset class id
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    /// Invalid hex string
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// No caller identity given
    #[error("No caller account: pass --caller or run `chord config --set-account <ADDRESS>`")]
    MissingCaller,

    /// No ledger has been deployed in the data directory
    #[error("No ledger deployed in {}", .0.display())]
    NotDeployed(PathBuf),

    /// A ledger is already deployed in the data directory
    #[error("A ledger is already deployed in {}", .0.display())]
    AlreadyDeployed(PathBuf),

    /// Ledger rejected the operation
    #[error("{0}")]
    Ledger(#[from] LedgerError),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),
}
