//! Chain inspection and exchange commands.

use super::{format_timestamp, load_config, open_node, save_pending};
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use petchain_consensus::ChainValidator;
use petchain_core::Block;
use petchain_storage::{ChainStore, Storage};
use std::fs;
use std::path::PathBuf;

#[derive(Args)]
pub struct ChainArgs {
    /// Directory to store node data
    #[arg(short, long, default_value = "./data", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: ChainCommand,
}

#[derive(Subcommand)]
enum ChainCommand {
    /// List recent blocks
    List {
        /// Number of blocks to show
        #[arg(short = 'n', long, default_value = "10")]
        count: usize,
    },
    /// Show a block by index
    Show { index: u64 },
    /// Verify the stored chain
    Verify,
    /// Export the chain as JSON
    Export { file: PathBuf },
    /// Adopt a chain exported from another node if it is longer and valid
    Import { file: PathBuf },
}

pub fn run(args: ChainArgs) -> Result<()> {
    let data_dir = args.data_dir;
    match args.command {
        ChainCommand::List { count } => {
            let chain = open_node(&data_dir)?.get_chain()?;

            println!();
            println!("{}", "Blocks:".bold().cyan());
            println!();
            for block in chain.iter().rev().take(count) {
                println!(
                    "  {}  {}  {} tx  {}",
                    format!("#{:<5}", block.index).bright_cyan(),
                    block.hash.to_hex()[..16].bright_yellow(),
                    block.tx_count(),
                    format_timestamp(block.timestamp).bright_black()
                );
            }
            println!();
            Ok(())
        }
        ChainCommand::Show { index } => {
            let chain = open_node(&data_dir)?.get_chain()?;
            let block = usize::try_from(index)
                .ok()
                .and_then(|i| chain.get(i))
                .with_context(|| format!("Block {} not found", index))?;
            println!("{}", serde_json::to_string_pretty(block)?);
            Ok(())
        }
        ChainCommand::Verify => {
            // Read storage directly so a broken chain can still be reported.
            let config = load_config(&data_dir)?;
            let storage = Storage::open(data_dir.join("chain")).context("Failed to open storage")?;
            let chain = ChainStore::new(&storage).load_chain()?;
            if chain.is_empty() {
                bail!("Chain is not initialized");
            }

            match ChainValidator::validate(&chain, config.ledger.difficulty) {
                Ok(()) => {
                    println!(
                        "{}  Chain valid: {} blocks",
                        "✓".green().bold(),
                        chain.len().to_string().bright_cyan()
                    );
                    Ok(())
                }
                Err(e) => {
                    println!("{}  Chain invalid: {}", "✗".red().bold(), e);
                    bail!("verification failed")
                }
            }
        }
        ChainCommand::Export { file } => {
            let chain = open_node(&data_dir)?.get_chain()?;
            fs::write(&file, serde_json::to_string_pretty(&chain)?)
                .with_context(|| format!("Failed to write {}", file.display()))?;
            println!(
                "{}  Exported {} blocks to {}",
                "✓".green().bold(),
                chain.len(),
                file.display().to_string().bright_black()
            );
            Ok(())
        }
        ChainCommand::Import { file } => {
            let contents = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let chain: Vec<Block> = serde_json::from_str(&contents).context("Invalid chain JSON")?;

            let node = open_node(&data_dir)?;
            let length = chain.len();
            if node.import_chain(chain)? {
                save_pending(&node, &data_dir)?;
                println!(
                    "{}  Replaced local chain ({} blocks)",
                    "✓".green().bold(),
                    length.to_string().bright_cyan()
                );
            } else {
                println!(
                    "{}",
                    "Local chain kept: imported chain is not longer.".yellow()
                );
            }
            Ok(())
        }
    }
}
