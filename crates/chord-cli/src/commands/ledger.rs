//! Ledger-mutating commands

use chord_ledger::{LedgerConfig, Receipt};
use clap::Subcommand;

use super::{
    deploy_ledger, open_ledger, parse_address, parse_data, parse_number, parse_numbers,
    register_receiver, Behavior, Context,
};
use crate::{output::Output, CliError};

/// Ledger subcommands
#[derive(Debug, Subcommand)]
pub enum LedgerCommand {
    /// Create a ledger in the data directory
    Deploy {
        /// Owner account, the only one allowed to mint
        #[arg(long)]
        owner: String,
        /// Metadata URI template shared by all asset classes
        #[arg(long)]
        uri: String,
        /// Deployer nonce used to derive the ledger address
        #[arg(long, default_value_t = 0)]
        nonce: u64,
    },
    /// Mint one asset class (owner only)
    Mint {
        /// Recipient
        #[arg(long)]
        to: String,
        /// Asset class id
        #[arg(long)]
        id: String,
        /// Quantity to mint
        #[arg(long)]
        amount: String,
        /// Opaque payload forwarded to a programmable recipient (hex)
        #[arg(long, default_value = "0x")]
        data: String,
    },
    /// Mint several asset classes at once (owner only)
    MintBatch {
        /// Recipient
        #[arg(long)]
        to: String,
        /// Comma-separated asset class ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
        /// Comma-separated quantities, paired with ids
        #[arg(long, value_delimiter = ',')]
        amounts: Vec<String>,
        /// Opaque payload forwarded to a programmable recipient (hex)
        #[arg(long, default_value = "0x")]
        data: String,
    },
    /// Transfer one asset class
    Transfer {
        /// Holder to debit
        #[arg(long)]
        from: String,
        /// Recipient
        #[arg(long)]
        to: String,
        /// Asset class id
        #[arg(long)]
        id: String,
        /// Quantity to move
        #[arg(long)]
        amount: String,
        /// Opaque payload forwarded to a programmable recipient (hex)
        #[arg(long, default_value = "0x")]
        data: String,
    },
    /// Transfer several asset classes at once
    TransferBatch {
        /// Holder to debit
        #[arg(long)]
        from: String,
        /// Recipient
        #[arg(long)]
        to: String,
        /// Comma-separated asset class ids
        #[arg(long, value_delimiter = ',')]
        ids: Vec<String>,
        /// Comma-separated quantities, paired with ids
        #[arg(long, value_delimiter = ',')]
        amounts: Vec<String>,
        /// Opaque payload forwarded to a programmable recipient (hex)
        #[arg(long, default_value = "0x")]
        data: String,
    },
    /// Grant or revoke an operator for all of the caller's assets
    SetApproval {
        /// Operator account
        #[arg(long)]
        operator: String,
        /// true to grant, false to revoke
        #[arg(long, action = clap::ArgAction::Set)]
        approved: bool,
    },
    /// Mark an account as programmable with a fixed receiver behavior
    RegisterReceiver {
        /// Account to register
        #[arg(long)]
        address: String,
        /// How the account answers incoming transfers
        #[arg(long, value_enum)]
        behavior: Behavior,
    },
}

impl LedgerCommand {
    pub fn execute(self, ctx: &Context) -> Result<(), CliError> {
        match self {
            LedgerCommand::Deploy { owner, uri, nonce } => deploy(ctx, &owner, uri, nonce),
            LedgerCommand::Mint { to, id, amount, data } => {
                let caller = ctx.caller()?;
                let to = parse_address(&to)?;
                let id = parse_number(&id)?;
                let amount = parse_number(&amount)?;
                let data = parse_data(&data)?;
                let receipt = open_ledger(ctx)?.mint(caller, to, id, amount, &data)?;
                print_receipt(ctx, &receipt)
            }
            LedgerCommand::MintBatch { to, ids, amounts, data } => {
                let caller = ctx.caller()?;
                let to = parse_address(&to)?;
                let ids = parse_numbers(&ids)?;
                let amounts = parse_numbers(&amounts)?;
                let data = parse_data(&data)?;
                let receipt = open_ledger(ctx)?.mint_batch(caller, to, ids, amounts, &data)?;
                print_receipt(ctx, &receipt)
            }
            LedgerCommand::Transfer { from, to, id, amount, data } => {
                let caller = ctx.caller()?;
                let from = parse_address(&from)?;
                let to = parse_address(&to)?;
                let id = parse_number(&id)?;
                let amount = parse_number(&amount)?;
                let data = parse_data(&data)?;
                let receipt =
                    open_ledger(ctx)?.safe_transfer_from(caller, from, to, id, amount, &data)?;
                print_receipt(ctx, &receipt)
            }
            LedgerCommand::TransferBatch { from, to, ids, amounts, data } => {
                let caller = ctx.caller()?;
                let from = parse_address(&from)?;
                let to = parse_address(&to)?;
                let ids = parse_numbers(&ids)?;
                let amounts = parse_numbers(&amounts)?;
                let data = parse_data(&data)?;
                let receipt = open_ledger(ctx)?
                    .safe_batch_transfer_from(caller, from, to, ids, amounts, &data)?;
                print_receipt(ctx, &receipt)
            }
            LedgerCommand::SetApproval { operator, approved } => {
                let caller = ctx.caller()?;
                let operator = parse_address(&operator)?;
                let receipt = open_ledger(ctx)?.set_approval_for_all(caller, operator, approved)?;
                print_receipt(ctx, &receipt)
            }
            LedgerCommand::RegisterReceiver { address, behavior } => {
                let address = parse_address(&address)?;
                let ledger = open_ledger(ctx)?;
                register_receiver(&ledger, address, behavior)?;
                Output::new(ctx.json)
                    .field("address", address)
                    .field_value("behavior", serde_json::to_value(behavior)?)
                    .field_bool("success", true)
                    .message(format!("Registered {address} as a programmable account"))
                    .print();
                Ok(())
            }
        }
    }
}

fn deploy(ctx: &Context, owner: &str, uri: String, nonce: u64) -> Result<(), CliError> {
    let owner = parse_address(owner)?;
    let config = LedgerConfig::deploy(owner, uri, nonce);
    deploy_ledger(ctx, &config)?;
    tracing::info!(ledger = %config.address, %owner, "ledger deployed");

    Output::new(ctx.json)
        .field("address", config.address)
        .field("owner", config.owner)
        .field("uri", &config.uri)
        .field_bool("success", true)
        .message(format!("Ledger deployed at {}", config.address))
        .message(format!("Owner address: {}", config.owner))
        .message(format!("URI: {}", config.uri))
        .print();
    Ok(())
}

fn print_receipt(ctx: &Context, receipt: &Receipt) -> Result<(), CliError> {
    Output::new(ctx.json).receipt(receipt)?.print();
    Ok(())
}
