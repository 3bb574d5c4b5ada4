mod config;
mod domain;
mod infrastructure;
mod report;
mod stages;
mod telemetry;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use crate::config::{Config, EndpointConfig};
use crate::infrastructure::ethereum::ProviderConfig;
use crate::report::Report;
use crate::stages::Stage;

#[derive(Debug, Parser)]
#[command(
    name = "ethprobe",
    version,
    about = "ethprobe: query a block, send a transfer and poke a counter contract over JSON-RPC"
)]
struct Args {
    /// Config file (defaults to $ETHPROBE_CONFIG or ~/.config/ethprobe/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// HTTP JSON-RPC endpoint (e.g. https://1rpc.io/sepolia)
    #[arg(long, global = true)]
    rpc: Option<String>,

    /// WebSocket endpoint (e.g. wss://...)
    #[arg(long, global = true)]
    ws: Option<String>,

    /// IPC path (e.g. ~/.ethereum/geth.ipc). Unix only.
    #[arg(long, global = true)]
    ipc: Option<PathBuf>,

    /// Block number for the block query
    #[arg(long, global = true)]
    block_number: Option<u64>,

    /// Sign the transfer without broadcasting it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Log filter (e.g. debug, ethprobe=trace). Falls back to RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<StageCommand>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum StageCommand {
    /// Run every stage in order (default)
    All,
    /// Fetch a block and print hash, timestamp and transactions
    Block,
    /// Sign and broadcast a value transfer
    Transfer,
    /// Call add() on the counter contract and read the count back
    Counter,
}

impl StageCommand {
    fn stages(self) -> Vec<Stage> {
        match self {
            StageCommand::All => Stage::ALL.to_vec(),
            StageCommand::Block => vec![Stage::Block],
            StageCommand::Transfer => vec![Stage::Transfer],
            StageCommand::Counter => vec![Stage::Counter],
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();
    telemetry::init(args.log_level.as_deref())?;

    let mut config = config::load(args.config.as_deref())?;
    apply_args(&mut config, &args)?;

    let selected = args.command.unwrap_or(StageCommand::All).stages();
    let mut failed = 0usize;
    for stage in selected {
        info!(%stage, "running stage");
        match stages::run_stage(stage, &config).await {
            Ok(outcome) => println!("{}", Report::from(&outcome)),
            Err(err) => {
                error!(%stage, "{err}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        error!(failed, "some stages failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Command line flags override the config file
fn apply_args(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(endpoint) = endpoint_from_args(args)? {
        config.endpoint = match endpoint {
            ProviderConfig::Http(url) => EndpointConfig {
                rpc: Some(url),
                ..Default::default()
            },
            ProviderConfig::WebSocket(url) => EndpointConfig {
                ws: Some(url),
                ..Default::default()
            },
            #[cfg(unix)]
            ProviderConfig::Ipc(path) => EndpointConfig {
                ipc: Some(path.to_string_lossy().to_string()),
                ..Default::default()
            },
        };
    }
    if let Some(number) = args.block_number {
        config.block.number = number;
    }
    if args.dry_run {
        config.transfer.dry_run = true;
    }
    Ok(())
}

fn endpoint_from_args(args: &Args) -> Result<Option<ProviderConfig>> {
    if let Some(ipc) = args.ipc.clone() {
        return config::ipc_config(ipc).map(Some);
    }
    if let Some(ws) = args.ws.clone() {
        return Ok(Some(ProviderConfig::WebSocket(ws)));
    }
    Ok(args.rpc.clone().map(ProviderConfig::Http))
}
