// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Custody Node
//!
//! Entry point for the `custody-node` binary. Parses CLI arguments,
//! initializes logging and metrics, and either runs a one-shot command or
//! serves the HTTP emulator around the persisted balance manager.
//!
//! - `init`           validate a deployment and persist its initial state
//! - `address`        print the manager and holder addresses
//! - `holder-address` derive a holder account
//! - `encode`         print a request body as BoC hex
//! - `run`            serve the emulator and metrics
//! - `version`        print build version information

mod api;
mod cli;
mod config;
mod host;
mod logging;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use custody_contracts::{derive_holder_address, InboundRequest};
use custody_protocol::cell::boc;
use custody_protocol::config::{format_coins, workchain_name, PROTOCOL_VERSION};
use custody_protocol::ContractDb;

use cli::{Commands, CustodyNodeCli, EncodeCommand};
use config::DeploymentConfig;
use host::HostedManager;
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CustodyNodeCli::parse();

    match cli.command {
        Commands::Init(args) => init_node(args),
        Commands::Address(args) => print_addresses(&args.config),
        Commands::HolderAddress(args) => {
            let holder = derive_holder_address(&args.owner, &args.issuer, &args.template)
                .context("holder data does not fit a cell")?;
            println!("{}", holder);
            Ok(())
        }
        Commands::Encode(command) => encode_request(command),
        Commands::Run(args) => run_node(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn open_db(data_dir: &Path) -> Result<ContractDb> {
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    ContractDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))
}

/// Validates the deployment config and persists the initial contract state.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("custody_node=info", LogFormat::Pretty);

    let config = DeploymentConfig::load(&args.config.config)?;
    let db = open_db(&args.data_dir)?;
    let host = HostedManager::load_or_deploy(&db, config.initial_record()?)
        .context("failed to persist initial contract state")?;

    let record = host.record();
    println!("Manager initialized.");
    println!("  Data directory : {}", args.data_dir.display());
    println!("  Address        : {}", record.address);
    println!("  Balance        : {}", format_coins(record.balance));
    Ok(())
}

fn print_addresses(config_path: &Path) -> Result<()> {
    let config = DeploymentConfig::load(config_path)?;
    let manager = config.deploy()?;
    let holder = manager
        .holder_address()
        .map_err(|code| anyhow::anyhow!("cannot derive holder address: {}", code))?;

    println!(
        "manager  {} ({})",
        manager.address(),
        workchain_name(manager.address().workchain())
    );
    println!("holder   {}", holder);
    Ok(())
}

fn encode_request(command: EncodeCommand) -> Result<()> {
    let request = match command {
        EncodeCommand::Withdraw {
            query_id,
            amount,
            destination,
            forward_ton_amount: None,
        } => InboundRequest::WithdrawDelegatedAsset {
            query_id,
            amount,
            destination,
        },
        EncodeCommand::Withdraw {
            query_id,
            amount,
            destination,
            forward_ton_amount: Some(forward_ton_amount),
        } => InboundRequest::WithdrawDelegatedAssetWithFee {
            query_id,
            amount,
            destination,
            forward_ton_amount,
        },
        EncodeCommand::WithdrawTon {
            query_id,
            amount,
            destination,
        } => InboundRequest::WithdrawNativeCurrency {
            query_id,
            amount,
            destination,
        },
        EncodeCommand::WithdrawJetton {
            query_id,
            amount,
            destination,
            issuer,
            template,
            forward_ton_amount: None,
        } => InboundRequest::WithdrawNamedAsset {
            query_id,
            amount,
            destination,
            issuer,
            template,
        },
        EncodeCommand::WithdrawJetton {
            query_id,
            amount,
            destination,
            issuer,
            template,
            forward_ton_amount: Some(forward_ton_amount),
        } => InboundRequest::WithdrawNamedAssetWithFee {
            query_id,
            amount,
            destination,
            issuer,
            forward_ton_amount,
            template,
        },
        EncodeCommand::ChangeOwner {
            query_id,
            new_owner,
        } => InboundRequest::ChangeOwner {
            query_id,
            new_owner,
        },
        EncodeCommand::ChangeJetton {
            query_id,
            issuer,
            template,
        } => InboundRequest::ChangeDelegateAsset {
            query_id,
            issuer,
            template,
        },
    };

    let body = request
        .to_cell()
        .with_context(|| format!("{} request does not fit a cell", request.name()))?;
    println!("{}", boc::to_hex(&body));
    Ok(())
}

/// Serves the HTTP emulator and the metrics endpoint until shutdown.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    logging::init_logging(
        "custody_node=info,custody_contracts=info,tower_http=info",
        LogFormat::from_flag(args.log_json),
    );

    let config = DeploymentConfig::load(&args.config.config)?;
    let db = Arc::new(open_db(&args.data_dir)?);
    let host = HostedManager::load_or_deploy(&db, config.initial_record()?)
        .context("failed to load contract state")?;

    tracing::info!(
        port = args.port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        address = %host.record().address,
        "starting custody-node"
    );

    let node_metrics = Arc::new(NodeMetrics::new());
    node_metrics
        .native_balance
        .set(i64::try_from(host.record().balance).unwrap_or(i64::MAX));

    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            PROTOCOL_VERSION
        ),
        metrics: Arc::clone(&node_metrics),
        db: Arc::clone(&db),
        host: Arc::new(Mutex::new(host)),
    };

    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind API listener on {}", api_addr))?;
    tracing::info!("API server listening on {}", api_addr);

    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received");
        }
    }

    db.flush().context("failed to flush database")?;
    tracing::info!("custody-node stopped");
    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("custody-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol     {}", PROTOCOL_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
