//! Mining and statistics commands.

use super::{format_timestamp, open_node, save_pending};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

#[derive(Args)]
pub struct MineArgs {
    /// Directory to store node data
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,
}

pub fn run(args: MineArgs) -> Result<()> {
    let node = open_node(&args.data_dir)?;
    let pending = node.pending_transactions()?.len();

    println!(
        "{} {} pending transaction(s)...",
        "Mining".bold().cyan(),
        pending.to_string().bright_cyan()
    );

    let block = node.mine()?;
    save_pending(&node, &args.data_dir)?;

    println!();
    println!("{}  New block forged", "✓".green().bold());
    println!("    Index:        {}", block.index.to_string().bright_cyan());
    println!("    Hash:         {}", block.hash.to_hex().bright_yellow());
    println!("    Previous:     {}", block.previous_hash.to_hex().bright_black());
    println!("    Nonce:        {}", block.nonce);
    println!("    Transactions: {}", block.transaction_count);
    println!("    Timestamp:    {}", format_timestamp(block.timestamp));
    println!();

    Ok(())
}

#[derive(Args)]
pub struct StatsArgs {
    /// Directory to store node data
    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,
}

pub fn stats(args: StatsArgs) -> Result<()> {
    let node = open_node(&args.data_dir)?;
    let stats = node.get_stats()?;

    println!();
    println!("{}", "Node Statistics:".bold().cyan());
    println!();
    println!("  Node ID:        {}", stats.node_id.bright_yellow());
    println!("  Chain Length:   {}", stats.chain_length.to_string().bright_cyan());
    println!("  Difficulty:     {}", stats.difficulty);
    println!("  Mining Reward:  {}", stats.mining_reward);
    println!("  Pending:        {}", stats.pending_count);
    println!("  Transactions:   {}", stats.total_transactions);
    println!("  Known Nodes:    {}", stats.node_count);
    println!();
    println!("  Pets:           {}", stats.pet_count.to_string().bright_cyan());
    println!("    Active:       {}", stats.active_count.to_string().green());
    println!("    Lost:         {}", stats.lost_count.to_string().red());
    println!("    Found:        {}", stats.found_count.to_string().cyan());
    println!("  Vet Records:    {}", stats.vet_record_count);
    println!();

    Ok(())
}
