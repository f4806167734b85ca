//! Command implementations

pub mod ledger;
pub mod query;

use chord_ledger::{
    AcceptingReceiver, AccountKind, FailingReceiver, Ledger, LedgerConfig, RejectingReceiver,
};
use chord_primitives::{parse_u256, Address, U256};
use chord_storage::LedgerDb;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::CliError;

/// Meta key holding the deployed `LedgerConfig`
const CONFIG_KEY: &str = "config";
/// Meta key holding registered receiver behaviors
const RECEIVERS_KEY: &str = "receivers";

/// Settings shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    /// Ledger data directory
    pub datadir: PathBuf,
    /// Caller identity, if known
    pub caller: Option<Address>,
    /// Output in JSON format
    pub json: bool,
}

impl Context {
    /// The caller identity or an error telling how to set one
    pub fn caller(&self) -> Result<Address, CliError> {
        self.caller.ok_or(CliError::MissingCaller)
    }
}

/// Behavior of a programmable recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Behavior {
    /// Acknowledges every incoming transfer
    Accept,
    /// Declines every incoming transfer
    Reject,
    /// Fails while handling the acknowledgment
    Fail,
    /// Has no receiver capability
    Incapable,
}

impl Behavior {
    fn account_kind(self) -> AccountKind {
        match self {
            Behavior::Accept => AccountKind::programmable(AcceptingReceiver),
            Behavior::Reject => AccountKind::programmable(RejectingReceiver),
            Behavior::Fail => AccountKind::programmable(FailingReceiver),
            Behavior::Incapable => AccountKind::incapable(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ReceiverEntry {
    address: Address,
    behavior: Behavior,
}

fn open_db(ctx: &Context) -> Result<LedgerDb, CliError> {
    std::fs::create_dir_all(&ctx.datadir)?;
    Ok(LedgerDb::open(&ctx.datadir)?)
}

/// Persist a new ledger configuration in the data directory
pub(crate) fn deploy_ledger(ctx: &Context, config: &LedgerConfig) -> Result<(), CliError> {
    let db = open_db(ctx)?;
    if db.get_meta(CONFIG_KEY)?.is_some() {
        return Err(CliError::AlreadyDeployed(ctx.datadir.clone()));
    }
    db.put_meta(CONFIG_KEY, &serde_json::to_vec(config)?)?;
    Ok(())
}

/// Open the deployed ledger, restoring registered receivers
pub(crate) fn open_ledger(ctx: &Context) -> Result<Ledger<LedgerDb>, CliError> {
    let db = open_db(ctx)?;
    let config: LedgerConfig = match db.get_meta(CONFIG_KEY)? {
        Some(bytes) => serde_json::from_slice(&bytes)?,
        None => return Err(CliError::NotDeployed(ctx.datadir.clone())),
    };
    let receivers = load_receivers(&db)?;

    let ledger = Ledger::with_store(config, db);
    for entry in receivers {
        ledger.register_account(entry.address, entry.behavior.account_kind())?;
    }
    Ok(ledger)
}

/// Fix the behavior of `address` and remember it for later invocations
pub(crate) fn register_receiver(
    ledger: &Ledger<LedgerDb>,
    address: Address,
    behavior: Behavior,
) -> Result<(), CliError> {
    ledger.register_account(address, behavior.account_kind())?;

    let store = ledger.store();
    let mut receivers = load_receivers(&store)?;
    receivers.push(ReceiverEntry { address, behavior });
    store.put_meta(RECEIVERS_KEY, &serde_json::to_vec(&receivers)?)?;
    tracing::info!(%address, ?behavior, "receiver registered");
    Ok(())
}

fn load_receivers(db: &LedgerDb) -> Result<Vec<ReceiverEntry>, CliError> {
    match db.get_meta(RECEIVERS_KEY)? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Ok(Vec::new()),
    }
}

// ==================== Argument parsing ====================

pub(crate) fn parse_address(s: &str) -> Result<Address, CliError> {
    Address::from_hex(s).map_err(|e| CliError::InvalidAddress(format!("{s}: {e}")))
}

pub(crate) fn parse_addresses(values: &[String]) -> Result<Vec<Address>, CliError> {
    values.iter().map(|s| parse_address(s)).collect()
}

pub(crate) fn parse_number(s: &str) -> Result<U256, CliError> {
    parse_u256(s).map_err(|e| CliError::InvalidNumber(e.to_string()))
}

pub(crate) fn parse_numbers(values: &[String]) -> Result<Vec<U256>, CliError> {
    values.iter().map(|s| parse_number(s)).collect()
}

pub(crate) fn parse_data(s: &str) -> Result<Vec<u8>, CliError> {
    let s = s.trim();
    let s = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(s).map_err(|e| CliError::InvalidHex(e.to_string()))
}
