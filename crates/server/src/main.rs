//! petchain node: serves the ledger over HTTP.

mod error;
mod peer;
mod routes;

use anyhow::{Context, Result};
use clap::Parser;
use peer::HttpPeerClient;
use petchain_chain::{NodeConfig, NodeState};
use routes::{build_router, AppState};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const PEER_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "petchain-node")]
#[command(about = "Pet registry node with proof-of-work consensus")]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides the config
    #[arg(short, long)]
    bind: Option<String>,

    /// Leading hex zeros required of block hashes
    #[arg(short, long)]
    difficulty: Option<u32>,

    /// Identifier credited by mining rewards
    #[arg(long)]
    node_id: Option<String>,

    /// Directory for the sled database; in-memory when unset
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Peer to register at startup (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,
}

impl Args {
    fn load_config(&self) -> Result<NodeConfig> {
        let mut config = match &self.config {
            Some(path) => NodeConfig::from_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => NodeConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(difficulty) = self.difficulty {
            config.ledger.difficulty = difficulty;
        }
        if let Some(node_id) = &self.node_id {
            config.node_id = node_id.clone();
        }
        if let Some(data_dir) = &self.data_dir {
            config.data_dir = Some(data_dir.clone());
        }
        config.peers.extend(self.peers.iter().cloned());

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "petchain=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(Args::parse()).await {
        tracing::error!("Server error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.load_config()?;
    let addr: SocketAddr = config.bind.parse().context("Invalid bind address")?;

    let node = Arc::new(NodeState::from_config(&config).context("Failed to open ledger")?);
    let peers = HttpPeerClient::new(PEER_TIMEOUT)?;
    let app = build_router(AppState::new(Arc::clone(&node), peers));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(node_id = %node.node_id(), %addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Arc::clone(&node)))
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal(node: Arc<NodeState>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("shutting down");
    node.cancel_mining();
}
