//! # chord-ledger
//!
//! A single-writer multi-asset ledger.
//!
//! One [`Ledger`] tracks balances of many asset classes across many accounts:
//! - minting (single and batched) by the fixed owner
//! - transfers (single and batched) by the holder or an approved operator
//! - operator approval covering every asset class of an account
//! - a receiver acknowledgment handshake for programmable recipients
//!
//! Every mutating operation is atomic: it either commits all of its balance
//! writes and returns a [`Receipt`] with its events, or fails and leaves the
//! ledger exactly as it was.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod auth;
mod balances;
pub mod config;
pub mod error;
pub mod events;
mod ledger;
mod lock;
pub mod receiver;

pub use config::{create_address, LedgerConfig};
pub use error::{LedgerError, LedgerResult};
pub use events::{LedgerEvent, Log, Receipt};
pub use ledger::Ledger;
pub use receiver::{
    AcceptingReceiver, AccountKind, FailingReceiver, ReceiverError, RejectingReceiver,
    TokenReceiver, BATCH_RECEIVED_SELECTOR, RECEIVED_SELECTOR,
};

pub use chord_primitives::{Address, Quantity, TokenId, U256};
pub use chord_storage::{LedgerDb, LedgerStore, MemoryStore};
