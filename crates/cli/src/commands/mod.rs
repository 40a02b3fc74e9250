//! CLI commands module.

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use petchain_chain::{NodeConfig, NodeState, SubmitReceipt};
use petchain_core::{Keypair, Transaction};
use std::fs;
use std::path::Path;

mod chain;
mod init;
mod key;
mod mine;
mod pet;

pub const CONFIG_FILE: &str = "config.json";
/// Pending transactions carried between invocations.
pub const PENDING_FILE: &str = "pending.json";

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new node directory
    Init(init::InitArgs),
    /// Key management
    Key(key::KeyArgs),
    /// Pet registry operations
    Pet(pet::PetArgs),
    /// Mine pending transactions into a block
    Mine(mine::MineArgs),
    /// Chain inspection and exchange
    Chain(chain::ChainArgs),
    /// Show node statistics
    Stats(mine::StatsArgs),
}

pub fn run(cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Init(args) => init::run(args),
        Commands::Key(args) => key::run(args),
        Commands::Pet(args) => pet::run(args),
        Commands::Mine(args) => mine::run(args),
        Commands::Chain(args) => chain::run(args),
        Commands::Stats(args) => mine::stats(args),
    }
}

pub(crate) fn load_config(data_dir: &Path) -> Result<NodeConfig> {
    let mut config = NodeConfig::from_file(data_dir.join(CONFIG_FILE))
        .context("Failed to read config.json. Did you run 'petchain init'?")?;
    config.data_dir = Some(data_dir.to_path_buf());
    Ok(config)
}

/// Open the node stored under `data_dir` and restore its pending pool.
pub(crate) fn open_node(data_dir: &Path) -> Result<NodeState> {
    let config = load_config(data_dir)?;
    let node = NodeState::from_config(&config).context("Failed to open ledger")?;

    let pending_file = data_dir.join(PENDING_FILE);
    if pending_file.exists() {
        let contents = fs::read_to_string(&pending_file)?;
        let pending: Vec<Transaction> =
            serde_json::from_str(&contents).context("Corrupt pending.json")?;
        for tx in pending {
            let pet_id = tx.pet_id.clone();
            if let Err(e) = node.submit_transaction(tx) {
                eprintln!(
                    "{}  Dropped pending transaction for {}: {}",
                    "!".yellow().bold(),
                    pet_id,
                    e
                );
            }
        }
    }
    Ok(node)
}

pub(crate) fn save_pending(node: &NodeState, data_dir: &Path) -> Result<()> {
    let pending = node.pending_transactions()?;
    fs::write(
        data_dir.join(PENDING_FILE),
        serde_json::to_string_pretty(&pending)?,
    )?;
    Ok(())
}

pub(crate) fn load_keypair(data_dir: &Path, name: &str) -> Result<Keypair> {
    let key_file = data_dir.join("keys").join(format!("{}.json", name));
    if !key_file.exists() {
        bail!(
            "Key file not found: {}. Use 'petchain key new' to create one.",
            key_file.display()
        );
    }

    let contents = fs::read_to_string(&key_file)?;
    let json: serde_json::Value = serde_json::from_str(&contents)?;
    let private_key_hex = json
        .get("private_key")
        .and_then(|v| v.as_str())
        .context("Missing private_key in key file")?;

    Keypair::from_private_hex(private_key_hex).context("Invalid private key")
}

pub(crate) fn print_receipt(receipt: &SubmitReceipt) {
    println!(
        "{}  Transaction accepted: {}",
        "✓".green().bold(),
        receipt.tx_hash.to_hex().bright_yellow()
    );
    println!(
        "    Pending: {}  (expected in block {})",
        receipt.pending_count.to_string().bright_cyan(),
        receipt.expected_block.to_string().bright_cyan()
    );
}

/// Render a millisecond timestamp as UTC.
pub(crate) fn format_timestamp(millis: u64) -> String {
    i64::try_from(millis)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| millis.to_string())
}
