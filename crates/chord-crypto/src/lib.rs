//! # chord-crypto
//!
//! Keccak-256 hashing and the two derived identifiers the ledger needs:
//! 4-byte function selectors (receiver acknowledgment signals) and 32-byte
//! event topics.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod hash;

pub use hash::{event_topic, keccak256, selector};
