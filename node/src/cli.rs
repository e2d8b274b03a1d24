//! # CLI Interface
//!
//! Defines the command-line argument structure for `custody-node` using
//! `clap` derive.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use custody_protocol::config::{parse_coins, DEFAULT_API_PORT, DEFAULT_METRICS_PORT};
use custody_protocol::{cell::boc, Address, Cell};

/// Custody relay host.
///
/// Deploys a balance manager from a JSON deployment config, derives its
/// addresses, encodes request bodies, and serves an HTTP emulator that
/// delivers messages to the persisted instance.
#[derive(Parser, Debug)]
#[command(
    name = "custody-node",
    about = "Balance manager host and emulator",
    version,
    propagate_version = true
)]
pub struct CustodyNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate a deployment config and persist the initial contract state.
    Init(InitArgs),
    /// Print the manager address and its holder account.
    Address(ConfigArgs),
    /// Derive the holder account of an owner for an asset.
    HolderAddress(HolderAddressArgs),
    /// Print the BoC hex of a request body.
    #[command(subcommand)]
    Encode(EncodeCommand),
    /// Serve the HTTP emulator.
    Run(RunArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Path to the deployment config (JSON).
    #[arg(long, short = 'c', env = "CUSTODY_CONFIG")]
    pub config: PathBuf,
}

/// Arguments for the `init` subcommand.
#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Data directory where contract state and transactions are stored.
    ///
    /// Created if it does not exist.
    #[arg(long, short = 'd', env = "CUSTODY_DATA_DIR", default_value = ".custody")]
    pub data_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct HolderAddressArgs {
    /// Owner of the holder account, in raw form (`wc:hex`).
    #[arg(long)]
    pub owner: Address,
    /// Issuer of the asset.
    #[arg(long)]
    pub issuer: Address,
    /// Holder account code as BoC hex.
    #[arg(long, value_parser = parse_cell)]
    pub template: Cell,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[arg(long, short = 'd', env = "CUSTODY_DATA_DIR", default_value = ".custody")]
    pub data_dir: PathBuf,

    /// Port for the HTTP emulator.
    #[arg(long, short = 'p', env = "CUSTODY_PORT", default_value_t = DEFAULT_API_PORT)]
    pub port: u16,

    /// Port for the Prometheus metrics endpoint.
    #[arg(long, env = "CUSTODY_METRICS_PORT", default_value_t = DEFAULT_METRICS_PORT)]
    pub metrics_port: u16,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, env = "CUSTODY_LOG_JSON")]
    pub log_json: bool,
}

/// Request bodies `encode` can produce. Native amounts are decimal coins
/// (`"0.05"`); jetton amounts are raw units.
#[derive(Subcommand, Debug)]
pub enum EncodeCommand {
    /// Withdraw the delegate asset.
    Withdraw {
        #[arg(long, default_value_t = 0)]
        query_id: u64,
        #[arg(long)]
        amount: u128,
        #[arg(long)]
        destination: Address,
        /// Forward this much to the destination with the notification.
        #[arg(long, value_parser = parse_coins_arg)]
        forward_ton_amount: Option<u128>,
    },
    /// Withdraw native currency.
    WithdrawTon {
        #[arg(long, default_value_t = 0)]
        query_id: u64,
        #[arg(long, value_parser = parse_coins_arg)]
        amount: u128,
        #[arg(long)]
        destination: Address,
    },
    /// Withdraw a named asset.
    WithdrawJetton {
        #[arg(long, default_value_t = 0)]
        query_id: u64,
        #[arg(long)]
        amount: u128,
        #[arg(long)]
        destination: Address,
        #[arg(long)]
        issuer: Address,
        #[arg(long, value_parser = parse_cell)]
        template: Cell,
        #[arg(long, value_parser = parse_coins_arg)]
        forward_ton_amount: Option<u128>,
    },
    /// Hand authority to a new owner.
    ChangeOwner {
        #[arg(long, default_value_t = 0)]
        query_id: u64,
        #[arg(long)]
        new_owner: Address,
    },
    /// Replace the delegate asset.
    ChangeJetton {
        #[arg(long, default_value_t = 0)]
        query_id: u64,
        #[arg(long)]
        issuer: Address,
        #[arg(long, value_parser = parse_cell)]
        template: Cell,
    },
}

fn parse_cell(s: &str) -> Result<Cell, String> {
    boc::from_hex(s).map_err(|e| e.to_string())
}

fn parse_coins_arg(s: &str) -> Result<u128, String> {
    parse_coins(s).ok_or_else(|| format!("invalid coin amount: {}", s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        CustodyNodeCli::command().debug_assert();
    }

    #[test]
    fn parses_encode_withdraw() {
        let dest = format!("0:{}", "11".repeat(32));
        let cli = CustodyNodeCli::try_parse_from([
            "custody-node",
            "encode",
            "withdraw",
            "--amount",
            "100",
            "--destination",
            &dest,
            "--forward-ton-amount",
            "0.05",
        ])
        .unwrap();

        match cli.command {
            Commands::Encode(EncodeCommand::Withdraw {
                amount,
                forward_ton_amount,
                query_id,
                ..
            }) => {
                assert_eq!(amount, 100);
                assert_eq!(query_id, 0);
                assert_eq!(forward_ton_amount, Some(50_000_000));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn rejects_bad_address() {
        let res = CustodyNodeCli::try_parse_from([
            "custody-node",
            "encode",
            "change-owner",
            "--new-owner",
            "not-an-address",
        ]);
        assert!(res.is_err());
    }
}
