//! # chord-storage
//!
//! Balance store for the Chord ledger.
//!
//! This crate provides:
//! - [`LedgerReader`] / [`LedgerWriter`] access traits over balances,
//!   per-class supply and operator approvals
//! - [`MemoryStore`], the default in-process backend
//! - [`ChangeSet`] and [`PendingState`] for buffering one operation's writes
//!   until it is committed as a unit
//! - [`LedgerDb`], a RocksDB backend with atomic batched commits

#![warn(missing_docs)]
#![warn(clippy::all)]

mod db;
mod error;
mod state;
mod traits;

pub use db::{cf, Database, DbConfig, LedgerDb, ALL_CFS};
pub use error::{StorageError, StorageResult};
pub use state::{ChangeSet, MemoryStore, PendingState};
pub use traits::{LedgerReader, LedgerStore, LedgerWriter, State};
