//! Application entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

use solana_bulk_transfer::app::{
    Orchestrator, Shutdown, SlotTrigger, TransferWorker, pair_sources, shutdown_channel,
};
use solana_bulk_transfer::config::{
    BatchConfig, EngineSection, Network, SubscribeConfig, WalletsConfig, parse_sol_amount,
};
use solana_bulk_transfer::domain::{BatchReport, NetworkGateway, TransferIntent};
use solana_bulk_transfer::infra::{PubsubSlotSource, RpcNetworkGateway};
use solana_bulk_transfer::report::{TextReport, exit_code, render_json};

#[derive(Debug, Parser)]
#[command(name = "solana-bulk-transfer", version, about = "Send many SOL transfers concurrently")]
struct Cli {
    /// Print the report as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every transfer listed in a batch file
    Batch {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Send a fixed amount from each source key, pairing destinations by position
    Wallets {
        #[arg(short, long)]
        config: PathBuf,
        /// Amount in SOL, e.g. 0.001
        #[arg(long)]
        amount: String,
        /// mainnet-beta, testnet or devnet
        #[arg(long, default_value = "devnet")]
        network: String,
    },
    /// Send one transfer each time a new slot is observed
    Subscribe {
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,solana_rpc_client=warn"));

    // stdout carries the report
    let fmt_layer = if std::env::var("LOG_FORMAT").is_ok_and(|v| v == "json") {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

/// Build the gateway and probe it. An unreachable node is logged, not fatal:
/// each transfer reports its own connection failure.
async fn connect(rpc_url: &str, engine: &EngineSection) -> Arc<dyn NetworkGateway> {
    let gateway = RpcNetworkGateway::new(rpc_url, engine.gateway_config());
    match gateway.health_check().await {
        Ok(()) => info!("   ✓ RPC node reachable"),
        Err(e) => warn!(error = %e, "   ⚠ RPC health check failed, continuing"),
    }
    Arc::new(gateway)
}

async fn run_batch(
    gateway: Arc<dyn NetworkGateway>,
    engine: &EngineSection,
    intents: Vec<TransferIntent>,
    shutdown: Shutdown,
) -> BatchReport {
    let orchestrator = Orchestrator::new(gateway, &engine.worker_config());
    orchestrator.run_all(intents, shutdown).await
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    info!("🏗️  Solana Bulk Transfer v{}", env!("CARGO_PKG_VERSION"));

    let (trigger, shutdown) = shutdown_channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Cancelling in-flight transfers");
        trigger.trigger();
    });

    let report = match cli.command {
        Command::Batch { config } => {
            let config = BatchConfig::load(&config)
                .with_context(|| format!("Failed to load batch config {}", config.display()))?;
            info!(transfers = config.transfers.len(), rpc_url = %config.rpc_url, "📦 Batch mode");
            let gateway = connect(&config.rpc_url, &config.engine).await;
            let engine = config.engine.clone();
            run_batch(gateway, &engine, config.into_intents(), shutdown).await
        }
        Command::Wallets {
            config,
            amount,
            network,
        } => {
            let lamports = parse_sol_amount(&amount).context("Invalid --amount")?;
            let rpc_url = Network::from_name(&network).rpc_url();
            let config = WalletsConfig::load(&config)
                .with_context(|| format!("Failed to load wallets config {}", config.display()))?;
            info!(
                sources = config.from_private_keys.len(),
                destinations = config.to_addresses.len(),
                lamports,
                rpc_url = %rpc_url,
                "📦 Wallets mode"
            );
            let gateway = connect(rpc_url, &config.engine).await;
            let intents = pair_sources(config.from_private_keys, &config.to_addresses, lamports)
                .context("Failed to pair sources with destinations")?;
            run_batch(gateway, &config.engine, intents, shutdown).await
        }
        Command::Subscribe { config } => {
            let config = SubscribeConfig::load(&config).with_context(|| {
                format!("Failed to load subscribe config {}", config.display())
            })?;
            let ws_url = config.websocket_url();
            info!(ws_url = %ws_url, max_transfers = ?config.max_transfers, "📡 Subscribe mode");
            let gateway = connect(&config.rpc_url, &config.engine).await;
            let worker = Arc::new(TransferWorker::new(gateway, config.engine.worker_config()));
            let intent = Arc::new(TransferIntent::new(
                config.private_key,
                config.recipient_address,
                config.amount,
            ));
            SlotTrigger::new(
                Arc::new(PubsubSlotSource::new(ws_url)),
                worker,
                config.max_transfers,
            )
            .run(intent, shutdown)
            .await
            .context("Slot subscription failed")?
        }
    };

    if cli.json {
        println!("{}", render_json(&report)?);
    } else {
        println!("{}", TextReport(&report));
    }

    Ok(ExitCode::from(exit_code(&report)))
}
