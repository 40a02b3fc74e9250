//! Initialize node directory command.

use super::CONFIG_FILE;
use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;
use petchain_chain::{LedgerConfig, NodeConfig, NodeState};
use std::fs;
use std::path::PathBuf;

#[derive(Args)]
pub struct InitArgs {
    /// Directory to store node data
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Leading hex zeros required of block hashes
    #[arg(long, default_value = "2")]
    difficulty: u32,

    /// Node identifier credited by mining rewards (random if omitted)
    #[arg(long)]
    node_id: Option<String>,

    /// HTTP listen address for petchain-node
    #[arg(long, default_value = "127.0.0.1:5001")]
    bind: String,
}

pub fn run(args: InitArgs) -> Result<()> {
    println!("{}", "Initializing petchain...".bold().cyan());
    println!();

    let config_file = args.data_dir.join(CONFIG_FILE);
    if config_file.exists() {
        bail!("{} already exists", config_file.display());
    }

    fs::create_dir_all(&args.data_dir)
        .with_context(|| format!("Failed to create data directory: {:?}", args.data_dir))?;
    println!("{}  Created data directory", "✓".green().bold());

    let mut config = NodeConfig {
        ledger: LedgerConfig::with_difficulty(args.difficulty),
        data_dir: Some(args.data_dir.clone()),
        bind: args.bind,
        ..NodeConfig::default()
    };
    if let Some(node_id) = args.node_id {
        config.node_id = node_id;
    }
    config.validate().context("Invalid configuration")?;

    let node = NodeState::from_config(&config).context("Failed to open storage")?;
    let genesis = node.get_chain()?.remove(0);

    println!("{}  Created genesis block", "✓".green().bold());
    println!("    Hash: {}", genesis.hash.to_hex().bright_yellow());
    println!("    Height: {}", "0".bright_cyan());

    config.save(&config_file)?;
    println!(
        "{}  Saved config to: {}",
        "✓".green().bold(),
        config_file.display().to_string().bright_black()
    );

    println!();
    println!("{}", "Node initialized successfully!".green().bold());
    println!("  Node ID:    {}", config.node_id.bright_yellow());
    println!("  Difficulty: {}", config.ledger.difficulty.to_string().bright_cyan());
    println!();
    println!("Next steps:");
    println!("  • Use {} to create an owner key", "petchain key new".bright_cyan());
    println!("  • Use {} to register a pet", "petchain pet register".bright_cyan());
    println!("  • Use {} to confirm pending events", "petchain mine".bright_cyan());

    Ok(())
}
