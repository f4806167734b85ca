//! # chord-cli
//!
//! Command-line interface for the Chord multi-asset ledger.
//!
//! ## Usage
//!
//! ```bash
//! # Deploy a ledger and mint
//! chord deploy --owner 0xaa.. --uri "https://cdn.example/{id}.json"
//! chord --caller 0xaa.. mint --to 0xaa.. --id 0 --amount 10
//! chord --caller 0xaa.. mint-batch --to 0xaa.. --ids 0,1,2 --amounts 1,2,3
//!
//! # Transfers and operators
//! chord --caller 0xaa.. transfer --from 0xaa.. --to 0xbb.. --id 0 --amount 1
//! chord --caller 0xaa.. set-approval --operator 0xcc.. --approved true
//!
//! # Queries
//! chord balance --account 0xbb.. --id 0
//! chord balance-batch --accounts 0xaa..,0xbb.. --ids 0,0
//! chord uri
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod config;
mod error;
mod output;

pub use config::Config;
pub use error::CliError;
pub use output::Output;

use commands::{parse_address, Context};

/// Chord ledger CLI
#[derive(Parser, Debug)]
#[command(name = "chord")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Ledger data directory
    #[arg(long, global = true)]
    datadir: Option<PathBuf>,

    /// Account issuing the call
    #[arg(long, global = true)]
    caller: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// CLI commands
#[derive(Debug, Subcommand)]
enum Commands {
    #[command(flatten)]
    Ledger(commands::ledger::LedgerCommand),
    #[command(flatten)]
    Query(commands::query::QueryCommand),
    /// Show or edit configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Set data directory
        #[arg(long)]
        set_datadir: Option<PathBuf>,
        /// Set default caller account
        #[arg(long)]
        set_account: Option<String>,
        /// Set default log level
        #[arg(long)]
        set_log_level: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let mut config = Config::load();

    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let json = cli.json;
    if let Err(e) = run(cli, &mut config) {
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "error": e.to_string(),
                    "success": false
                })
            );
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli, config: &mut Config) -> Result<(), CliError> {
    match cli.command {
        Commands::Ledger(cmd) => cmd.execute(&context(cli.datadir, cli.caller, cli.json, config)?),
        Commands::Query(cmd) => cmd.execute(&context(cli.datadir, cli.caller, cli.json, config)?),
        Commands::Config {
            show,
            set_datadir,
            set_account,
            set_log_level,
        } => handle_config(config, show, set_datadir, set_account, set_log_level, cli.json),
    }
}

/// Resolve the data directory and caller, flags first, then config
fn context(
    datadir: Option<PathBuf>,
    caller: Option<String>,
    json: bool,
    config: &Config,
) -> Result<Context, CliError> {
    let datadir = datadir
        .or_else(|| config.datadir())
        .ok_or_else(|| CliError::Config("Cannot determine data directory".to_string()))?;
    let caller = match caller {
        Some(caller) => Some(parse_address(&caller)?),
        None => config.account,
    };
    Ok(Context {
        datadir,
        caller,
        json,
    })
}

fn handle_config(
    config: &mut Config,
    show: bool,
    set_datadir: Option<PathBuf>,
    set_account: Option<String>,
    set_log_level: Option<String>,
    json: bool,
) -> Result<(), CliError> {
    let mut modified = false;

    if let Some(datadir) = set_datadir {
        config.datadir = Some(datadir);
        modified = true;
    }

    if let Some(account) = set_account {
        config.account = Some(parse_address(&account)?);
        modified = true;
    }

    if let Some(level) = set_log_level {
        config.log_level = level;
        modified = true;
    }

    if modified {
        config.save()?;
        Output::new(json)
            .field("status", "saved")
            .message("Configuration saved")
            .print();
    } else if show {
        let datadir = config
            .datadir()
            .map(|d| d.display().to_string())
            .unwrap_or_else(|| "<unset>".to_string());
        let account = config
            .account
            .map(|a| a.to_hex())
            .unwrap_or_else(|| "<unset>".to_string());
        Output::new(json)
            .field("datadir", &datadir)
            .field("account", &account)
            .field("log_level", &config.log_level)
            .message(format!("Data directory: {datadir}"))
            .message(format!("Account: {account}"))
            .message(format!("Log level: {}", config.log_level))
            .print();
    } else {
        Output::new(json)
            .message("Use --show to display config, or --set-datadir/--set-account/--set-log-level to modify")
            .print();
    }

    Ok(())
}
