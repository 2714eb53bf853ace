use anyhow::Result;
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use vigil_core::unix_now;
use vigil_instantsend::InMemoryRoster;
use vigil_node::{Node, NodeConfig};
use vigil_telemetry::{init_logging, LogSink};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Vigil operator sync and instant-lock node", long_about = None)]
struct Cli {
    /// TOML configuration file; VIGIL__* environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the node heartbeat until interrupted
    Run,

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = NodeConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: NodeConfig) -> Result<()> {
    init_logging(&config.log_level);
    info!("🚀 Starting Vigil node on {}", config.network);

    let roster = Arc::new(InMemoryRoster::new());
    let node = Node::new(config.clone(), roster, Arc::new(LogSink), unix_now())?;

    let mut heartbeat = tokio::time::interval(Duration::from_millis(config.heartbeat_millis.max(1)));
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = heartbeat.tick() => {
                if let Err(e) = node.heartbeat(unix_now()) {
                    error!("❌ Heartbeat failed: {}", e);
                }
            }
        }
    }

    let status = node.status();
    info!(
        "Stopped at {} ({:.0}%), {} locks completed",
        status.asset,
        status.progress * 100.0,
        status.completed_locks
    );
    Ok(())
}
