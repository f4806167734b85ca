//! Query commands

use clap::Subcommand;
use serde_json::Value;

use super::{open_ledger, parse_address, parse_addresses, parse_number, parse_numbers, Context};
use crate::{output::Output, CliError};

/// Query subcommands
#[derive(Debug, Subcommand)]
pub enum QueryCommand {
    /// Query the balance of one account for one asset class
    Balance {
        /// Account address
        #[arg(long)]
        account: String,
        /// Asset class id
        #[arg(long)]
        id: String,
    },
    /// Query balances for paired accounts and asset classes
    BalanceBatch {
        /// Comma-separated account addresses
        #[arg(long, value_delimiter = ',')]
        accounts: Vec<String>,
        /// Comma-separated asset class ids, paired with accounts
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
    },
    /// Query whether an operator is approved for an account
    IsApproved {
        /// Holder account
        #[arg(long)]
        account: String,
        /// Operator account
        #[arg(long)]
        operator: String,
    },
    /// Query the metadata URI template
    Uri {
        /// Asset class id
        #[arg(long, default_value = "0")]
        id: String,
    },
    /// Query the circulating supply of an asset class
    TotalSupply {
        /// Asset class id
        #[arg(long)]
        id: String,
    },
}

impl QueryCommand {
    pub fn execute(self, ctx: &Context) -> Result<(), CliError> {
        match self {
            QueryCommand::Balance { account, id } => query_balance(ctx, &account, &id),
            QueryCommand::BalanceBatch { accounts, ids } => query_balance_batch(ctx, &accounts, &ids),
            QueryCommand::IsApproved { account, operator } => {
                query_is_approved(ctx, &account, &operator)
            }
            QueryCommand::Uri { id } => query_uri(ctx, &id),
            QueryCommand::TotalSupply { id } => query_total_supply(ctx, &id),
        }
    }
}

fn query_balance(ctx: &Context, account: &str, id: &str) -> Result<(), CliError> {
    let account = parse_address(account)?;
    let id = parse_number(id)?;
    let balance = open_ledger(ctx)?.balance_of(&account, &id)?;

    Output::new(ctx.json)
        .field("account", account)
        .field("id", id)
        .field("balance", balance)
        .message(format!("Balance: {balance}"))
        .print();

    Ok(())
}

fn query_balance_batch(ctx: &Context, accounts: &[String], ids: &[String]) -> Result<(), CliError> {
    let accounts = parse_addresses(accounts)?;
    let ids = parse_numbers(ids)?;
    let balances = open_ledger(ctx)?.balance_of_batch(&accounts, &ids)?;

    let mut out = Output::new(ctx.json).field_value(
        "balances",
        Value::Array(balances.iter().map(|b| Value::String(b.to_string())).collect()),
    );
    for ((account, id), balance) in accounts.iter().zip(&ids).zip(&balances) {
        out = out.message(format!("{account} [{id}]: {balance}"));
    }
    out.print();

    Ok(())
}

fn query_is_approved(ctx: &Context, account: &str, operator: &str) -> Result<(), CliError> {
    let account = parse_address(account)?;
    let operator = parse_address(operator)?;
    let approved = open_ledger(ctx)?.is_approved_for_all(&account, &operator)?;

    Output::new(ctx.json)
        .field("account", account)
        .field("operator", operator)
        .field_bool("approved", approved)
        .message(format!("Approved: {approved}"))
        .print();

    Ok(())
}

fn query_uri(ctx: &Context, id: &str) -> Result<(), CliError> {
    let id = parse_number(id)?;
    let ledger = open_ledger(ctx)?;
    let uri = ledger.uri(&id);

    Output::new(ctx.json)
        .field("id", id)
        .field("uri", uri)
        .message(uri)
        .print();

    Ok(())
}

fn query_total_supply(ctx: &Context, id: &str) -> Result<(), CliError> {
    let id = parse_number(id)?;
    let supply = open_ledger(ctx)?.total_supply(&id)?;

    Output::new(ctx.json)
        .field("id", id)
        .field("total_supply", supply)
        .message(format!("Total supply: {supply}"))
        .print();

    Ok(())
}
